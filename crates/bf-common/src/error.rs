//! Error types for Browser Fleet.
//!
//! Structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Failures are recovered at the orchestrator boundary and returned as
//! structured outcomes; none crash the orchestrator itself. A crash of a
//! *managed* browser process is an expected steady-state event, not an
//! error: it surfaces as a registry state transition, never through this
//! type.

use thiserror::Error;

/// Result type alias for Browser Fleet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration and profile validation errors.
    Config,
    /// Working-directory sandbox errors.
    Sandbox,
    /// Process launch and termination errors.
    Launch,
    /// File I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Sandbox => write!(f, "sandbox"),
            ErrorCategory::Launch => write!(f, "launch"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Unified error type for Browser Fleet.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    // Sandbox errors (20-29)
    #[error("sandbox violation for profile '{profile_id}': {path} escapes the base data directory")]
    SandboxViolation { profile_id: String, path: String },

    // Launch/termination errors (30-39)
    #[error("failed to start process for profile '{profile_id}': {reason}")]
    SpawnFailed { profile_id: String, reason: String },

    #[error("process for profile '{profile_id}' (pid {pid}) survived termination escalation")]
    TerminationTimeout { profile_id: String, pid: u32 },

    #[error("orchestrator is shutting down; launches are rejected")]
    ShuttingDown,

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Error codes are grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Sandbox errors
    /// - 30-39: Launch/termination errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidProfile(_) => 11,
            Error::SandboxViolation { .. } => 20,
            Error::SpawnFailed { .. } => 30,
            Error::TerminationTimeout { .. } => 31,
            Error::ShuttingDown => 32,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidProfile(_) => ErrorCategory::Config,
            Error::SandboxViolation { .. } => ErrorCategory::Sandbox,
            Error::SpawnFailed { .. }
            | Error::TerminationTimeout { .. }
            | Error::ShuttingDown => ErrorCategory::Launch,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Fix the config or profile and retry
            Error::Config(_) => true,
            Error::InvalidProfile(_) => true,
            // A crafted id will not become safe on retry
            Error::SandboxViolation { .. } => false,
            // Transient: bad flags, missing executable, resource pressure
            Error::SpawnFailed { .. } => true,
            // Retry with a longer window or wait for the process to die
            Error::TerminationTimeout { .. } => true,
            Error::ShuttingDown => false,
            Error::Io(_) => true,
            Error::Json(_) => true,
            Error::UnsupportedPlatform(_) => false,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidProfile(_) => "Invalid Profile",
            Error::SandboxViolation { .. } => "Sandbox Violation",
            Error::SpawnFailed { .. } => "Launch Failed",
            Error::TerminationTimeout { .. } => "Termination Timeout",
            Error::ShuttingDown => "Shutting Down",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
            Error::UnsupportedPlatform(_) => "Unsupported Platform",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Set a browser executable in config.toml or pass --browser, then retry."
            }
            Error::InvalidProfile(_) => {
                "Ensure the profile JSON has a non-empty id and name."
            }
            Error::SandboxViolation { .. } => {
                "The profile id resolves outside the data directory. Rename the profile id."
            }
            Error::SpawnFailed { .. } => {
                "Check that the executable exists and accepts the generated flags. Re-run with BF_LOG=debug to see the full command line."
            }
            Error::TerminationTimeout { .. } => {
                "The process ignored SIGTERM and SIGKILL (likely D-state). It remains tracked; retry stop once it becomes killable."
            }
            Error::ShuttingDown => {
                "Fleet shutdown is in progress. Restart the orchestrator to launch again."
            }
            Error::Io(_) => {
                "Check disk space and permissions on the data directory, then retry."
            }
            Error::Json(_) => {
                "The profile file is not valid JSON. Check syntax with 'jq .' or re-export it."
            }
            Error::UnsupportedPlatform(_) => {
                "Process signaling requires a unix platform. See README for supported platforms."
            }
        }
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
