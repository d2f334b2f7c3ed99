//! Per-process exit monitoring.
//!
//! One watcher thread per running browser, started as a side effect of a
//! successful launch. The watcher blocks in `Child::wait()` (which also
//! reaps the process), then removes the registry record and notifies the
//! observer. Cleanup runs on every path, so a crash, an explicit stop,
//! and orchestrator shutdown all converge on the same bookkeeping.
//!
//! Registry removal is idempotent with `stop()`'s removal: whichever side
//! wins, the other becomes a no-op. The observer is notified exactly once
//! per process.

use crate::registry::ProcessRegistry;
use bf_common::ProfileId;
use std::process::Child;
use std::sync::Arc;
use tracing::{info, warn};

/// Seam to the presentation collaborator.
///
/// Implementations flip the profile's active flag (and whatever else the
/// UI needs) when a managed process terminates. Called from the monitor
/// thread; implementations must be cheap and must not block.
pub trait ExitObserver: Send + Sync {
    /// A managed process terminated. `exit_code` is `None` when the
    /// process was killed by a signal.
    fn on_exit(&self, profile_id: &ProfileId, exit_code: Option<i32>);
}

/// Default observer: termination is only reflected in the registry.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ExitObserver for NoopObserver {
    fn on_exit(&self, _profile_id: &ProfileId, _exit_code: Option<i32>) {}
}

/// Spawn the watcher thread for a freshly launched process.
///
/// The thread is detached; it lives exactly as long as the process it
/// watches. A managed process exiting on its own is expected steady
/// state, not an orchestrator error.
pub fn spawn_exit_monitor(
    registry: Arc<ProcessRegistry>,
    observer: Arc<dyn ExitObserver>,
    profile_id: ProfileId,
    mut child: Child,
) {
    let pid = child.id();
    std::thread::Builder::new()
        .name(format!("bf-monitor-{profile_id}"))
        .spawn(move || {
            let exit_code = match child.wait() {
                Ok(status) => {
                    info!(
                        profile_id = %profile_id,
                        pid,
                        code = ?status.code(),
                        "browser process exited"
                    );
                    status.code()
                }
                Err(err) => {
                    // wait() failing means we lost visibility, not that
                    // the process is alive; clean up regardless
                    warn!(profile_id = %profile_id, pid, error = %err, "wait on browser process failed");
                    None
                }
            };

            registry.remove(&profile_id);
            observer.on_exit(&profile_id, exit_code);
        })
        // Thread spawn only fails under resource exhaustion; the record
        // would leak until the next stop, so surface it loudly
        .map(|_| ())
        .unwrap_or_else(|err| {
            warn!(pid, error = %err, "failed to spawn exit monitor thread");
        });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registry::ProcessRecord;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::process::Command;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    struct CountingObserver {
        exits: AtomicUsize,
        last_code: std::sync::Mutex<Option<Option<i32>>>,
    }

    impl CountingObserver {
        fn new() -> Self {
            CountingObserver {
                exits: AtomicUsize::new(0),
                last_code: std::sync::Mutex::new(None),
            }
        }
    }

    impl ExitObserver for CountingObserver {
        fn on_exit(&self, _profile_id: &ProfileId, exit_code: Option<i32>) {
            self.exits.fetch_add(1, Ordering::SeqCst);
            *self.last_code.lock().unwrap() = Some(exit_code);
        }
    }

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn monitor_removes_record_and_reports_exit_code() {
        let registry = Arc::new(ProcessRegistry::new());
        let observer = Arc::new(CountingObserver::new());
        let profile_id = ProfileId::from("alpha");

        let child = Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .expect("spawn sh");
        registry.try_insert(ProcessRecord {
            profile_id: profile_id.clone(),
            pid: child.id(),
            data_dir: PathBuf::from("/tmp/x"),
            started_at: Utc::now(),
        });

        let sink: Arc<dyn ExitObserver> = observer.clone();
        spawn_exit_monitor(Arc::clone(&registry), sink, profile_id.clone(), child);

        assert!(wait_until(Duration::from_secs(5), || registry.count() == 0));
        assert!(wait_until(Duration::from_secs(1), || {
            observer.exits.load(Ordering::SeqCst) == 1
        }));
        assert_eq!(*observer.last_code.lock().unwrap(), Some(Some(7)));
    }

    #[test]
    fn monitor_reports_signal_death_without_code() {
        let registry = Arc::new(ProcessRegistry::new());
        let observer = Arc::new(CountingObserver::new());
        let profile_id = ProfileId::from("bravo");

        let child = Command::new("sleep").arg("60").spawn().expect("spawn sleep");
        let pid = child.id();
        registry.try_insert(ProcessRecord {
            profile_id: profile_id.clone(),
            pid,
            data_dir: PathBuf::from("/tmp/x"),
            started_at: Utc::now(),
        });

        let sink: Arc<dyn ExitObserver> = observer.clone();
        spawn_exit_monitor(Arc::clone(&registry), sink, profile_id, child);

        // Simulate a crash from outside the orchestrator
        crate::signal::send_signal(pid, crate::signal::SIGKILL).unwrap();

        assert!(wait_until(Duration::from_secs(5), || registry.count() == 0));
        assert!(wait_until(Duration::from_secs(1), || {
            observer.exits.load(Ordering::SeqCst) == 1
        }));
        assert_eq!(*observer.last_code.lock().unwrap(), Some(None));
    }
}
