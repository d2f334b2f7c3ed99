//! Signal delivery and liveness polling for managed processes.
//!
//! Thin unix layer under the lifecycle controller:
//! - SIGTERM/SIGKILL delivery with errno mapping
//! - Existence checks via signal 0 (EPERM counts as alive)
//! - Bounded, non-busy waits for process exit
//!
//! Non-unix builds fail with `UnsupportedPlatform`; the orchestrator has
//! no fallback termination path there.

use bf_common::{Error, Result};
use std::time::{Duration, Instant};

/// Outcome of a bounded wait for process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process is gone (or was never observable).
    Exited,
    /// The process was still alive when the window closed.
    TimedOut,
}

/// Send a signal to a process.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: i32) -> Result<()> {
    let result = unsafe { libc::kill(pid as i32, signal) };
    if result == 0 {
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        // Already gone; exactly what a terminate wants
        Some(libc::ESRCH) => Ok(()),
        _ => Err(Error::Io(err)),
    }
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _signal: i32) -> Result<()> {
    Err(Error::UnsupportedPlatform(
        "signal delivery is only supported on unix".to_string(),
    ))
}

/// Check if a process exists.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    let result = unsafe { libc::kill(pid as i32, 0) };
    if result == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    // EPERM means the process exists but we can't signal it
    err.raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_exists(_pid: u32) -> bool {
    false
}

/// Wait for a process to disappear, polling at `poll_interval`, for at
/// most `timeout`. Never blocks past the window.
pub fn wait_for_exit(pid: u32, timeout: Duration, poll_interval: Duration) -> WaitOutcome {
    let start = Instant::now();
    loop {
        if !process_exists(pid) {
            return WaitOutcome::Exited;
        }
        if start.elapsed() >= timeout {
            return WaitOutcome::TimedOut;
        }
        std::thread::sleep(poll_interval.min(timeout.saturating_sub(start.elapsed())));
    }
}

/// `SIGTERM` value for unix targets (stub constant elsewhere so callers
/// can compile unconditionally).
#[cfg(unix)]
pub const SIGTERM: i32 = libc::SIGTERM;
#[cfg(unix)]
pub const SIGKILL: i32 = libc::SIGKILL;

#[cfg(not(unix))]
pub const SIGTERM: i32 = 15;
#[cfg(not(unix))]
pub const SIGKILL: i32 = 9;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn process_exists_for_self() {
        assert!(process_exists(std::process::id()));
    }

    #[test]
    fn process_not_exists_for_invalid() {
        // Very high PID unlikely to exist
        assert!(!process_exists(999_999_999));
    }

    #[test]
    fn signal_to_dead_pid_is_ok() {
        assert!(send_signal(999_999_999, SIGTERM).is_ok());
    }

    #[test]
    fn wait_observes_termination() {
        let mut child = Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id();

        send_signal(pid, SIGKILL).unwrap();
        // Reap so the zombie disappears and the wait can observe it
        let _ = child.wait();

        let outcome = wait_for_exit(pid, Duration::from_secs(2), Duration::from_millis(10));
        assert_eq!(outcome, WaitOutcome::Exited);
    }

    #[test]
    fn wait_times_out_on_live_process() {
        let mut child = Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("failed to spawn sleep");

        let outcome = wait_for_exit(
            child.id(),
            Duration::from_millis(100),
            Duration::from_millis(10),
        );
        assert_eq!(outcome, WaitOutcome::TimedOut);

        let _ = child.kill();
        let _ = child.wait();
    }
}
