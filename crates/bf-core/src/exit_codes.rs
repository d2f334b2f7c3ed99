//! Exit codes for the bf-core CLI.
//!
//! Exit codes communicate operation outcome without requiring output
//! parsing. Ranges:
//! - 0-9: Success/operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

/// Exit codes for bf-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success: every requested operation completed.
    Clean = 0,

    /// Partial failure: some profiles launched or stopped, others failed.
    PartialFail = 3,

    /// Invalid arguments or malformed profile JSON.
    ArgsError = 10,

    /// Configuration or profile error (no executable, bad config file,
    /// unreadable profile file).
    ConfigError = 11,

    /// Internal error.
    InternalError = 20,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Terminate the process with this code.
    pub fn exit(self) -> ! {
        std::process::exit(self.code())
    }
}
