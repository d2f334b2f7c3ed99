//! Process lifecycle controller.
//!
//! Drives the per-profile state machine:
//!
//! ```text
//! NotRunning -> Starting -> Running -> Stopping -> NotRunning
//!                              \-> Crashed -> NotRunning
//! ```
//!
//! State is derived from registry membership plus a short-lived in-flight
//! launch marker; nothing is persisted. A fresh orchestrator starts with
//! an empty registry; no process outlives its own supervision.
//!
//! Serialization is strictly per profile: the registry's atomic
//! insert/remove plus the in-flight marker are the only coordination
//! points, so launches and stops for different profiles never block on
//! each other's spawns or timeout waits.

use crate::command::{self, SkippedAttribute};
use crate::config::{FleetConfig, TimeoutConfig};
use crate::monitor::{spawn_exit_monitor, ExitObserver, NoopObserver};
use crate::registry::{ProcessRecord, ProcessRegistry};
use crate::sandbox;
use crate::signal::{self, WaitOutcome, SIGKILL, SIGTERM};
use bf_common::{BrowserProfile, Error, LaunchAttributes, ProfileId, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a launch request.
#[derive(Debug, Clone)]
pub enum LaunchOutcome {
    /// A new process was spawned and confirmed alive past the grace
    /// period. `skipped` lists attributes that could not be expressed as
    /// command-line flags.
    Launched {
        pid: u32,
        skipped: Vec<SkippedAttribute>,
    },
    /// A process for this profile already exists (or a concurrent launch
    /// is in flight). Idempotent success, not an error.
    AlreadyRunning,
}

impl LaunchOutcome {
    pub fn launched(&self) -> bool {
        matches!(self, LaunchOutcome::Launched { .. })
    }
}

/// The fleet orchestrator.
///
/// Safe to share across threads behind an `Arc`; every operation takes
/// `&self`.
pub struct Orchestrator {
    pub(crate) registry: Arc<ProcessRegistry>,
    pub(crate) observer: Arc<dyn ExitObserver>,
    pub(crate) timeouts: TimeoutConfig,
    pub(crate) shutting_down: AtomicBool,
    base_data_dir: PathBuf,
    default_executable: RwLock<Option<PathBuf>>,
    in_flight: Mutex<HashSet<ProfileId>>,
}

impl Orchestrator {
    /// Build an orchestrator from config, creating the base data root.
    pub fn new(config: FleetConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Build with a presentation-collaborator observer for exit events.
    pub fn with_observer(config: FleetConfig, observer: Arc<dyn ExitObserver>) -> Result<Self> {
        let base_data_dir = config.resolved_data_dir();
        std::fs::create_dir_all(&base_data_dir)?;

        Ok(Orchestrator {
            registry: Arc::new(ProcessRegistry::new()),
            observer,
            timeouts: config.timeouts,
            shutting_down: AtomicBool::new(false),
            base_data_dir,
            default_executable: RwLock::new(config.browser_path),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Set the default browser executable used when a profile carries no
    /// override. The path must exist, be a regular file, and be
    /// executable.
    pub fn set_default_executable(&self, path: PathBuf) -> Result<()> {
        let meta = std::fs::metadata(&path)
            .map_err(|_| Error::Config(format!("invalid browser executable: {}", path.display())))?;
        if !meta.is_file() || !is_executable(&meta) {
            return Err(Error::Config(format!(
                "invalid browser executable: {}",
                path.display()
            )));
        }
        info!(path = %path.display(), "default browser executable updated");
        *self.default_executable.write().expect("executable lock") = Some(path);
        Ok(())
    }

    /// Launch a browser process for a profile.
    ///
    /// Returns [`LaunchOutcome::AlreadyRunning`] without spawning when a
    /// process for this profile exists. Failures are returned as
    /// structured errors and never leave a registry record behind.
    pub fn launch(&self, profile: &BrowserProfile) -> Result<LaunchOutcome> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if !profile.id.is_valid() {
            return Err(Error::InvalidProfile("profile id cannot be empty".into()));
        }
        if profile.name.trim().is_empty() {
            return Err(Error::InvalidProfile("profile name cannot be empty".into()));
        }

        let _guard = match self.begin_launch(&profile.id) {
            Some(guard) => guard,
            None => {
                debug!(profile_id = %profile.id, "profile is already running");
                return Ok(LaunchOutcome::AlreadyRunning);
            }
        };

        // Snapshot now; caller mutation of the profile can no longer
        // affect this launch
        let attrs = LaunchAttributes::from(profile);
        self.launch_inner(&profile.id, &profile.name, &attrs)
    }

    fn launch_inner(
        &self,
        profile_id: &ProfileId,
        name: &str,
        attrs: &LaunchAttributes,
    ) -> Result<LaunchOutcome> {
        let executable = match attrs.executable_override.clone().or_else(|| {
            self.default_executable
                .read()
                .expect("executable lock")
                .clone()
        }) {
            Some(path) => path,
            None => {
                return Err(Error::Config(
                    "no browser executable configured and profile carries no override".into(),
                ))
            }
        };

        let data_dir = sandbox::prepare(&self.base_data_dir, profile_id)?;
        let built = command::build(&executable, attrs, &data_dir);
        for skipped in &built.skipped {
            info!(profile_id = %profile_id, attribute = %skipped, "{}", skipped.reason());
        }
        debug!(profile_id = %profile_id, command = %built.display(), "launch command");

        let mut child = Command::new(&built.argv[0])
            .args(&built.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| Error::SpawnFailed {
                profile_id: profile_id.to_string(),
                reason: err.to_string(),
            })?;
        let pid = child.id();

        // Startup grace: catch executables that exit immediately due to
        // invalid flags before declaring success. Aborts early when
        // fleet shutdown begins so the deadline holds.
        let grace_start = Instant::now();
        while grace_start.elapsed() < self.timeouts.grace_period() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    warn!(
                        profile_id = %profile_id,
                        pid,
                        code = ?status.code(),
                        "browser exited during startup grace period"
                    );
                    return Err(Error::SpawnFailed {
                        profile_id: profile_id.to_string(),
                        reason: match status.code() {
                            Some(code) => {
                                format!("process exited with code {code} during startup")
                            }
                            None => "process was killed during startup".to_string(),
                        },
                    });
                }
                Ok(None) => {}
                Err(err) => return Err(Error::Io(err)),
            }
            if self.shutting_down.load(Ordering::SeqCst) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::ShuttingDown);
            }
            std::thread::sleep(self.timeouts.poll_interval());
        }

        let inserted = self.registry.try_insert(ProcessRecord {
            profile_id: profile_id.clone(),
            pid,
            data_dir,
            started_at: Utc::now(),
        });
        if !inserted {
            // Unreachable while the in-flight guard is held; if the
            // invariant is ever violated, prefer killing the newcomer
            // over tracking two processes for one profile
            warn!(profile_id = %profile_id, pid, "registry already held a record; killing duplicate");
            let _ = child.kill();
            let _ = child.wait();
            return Ok(LaunchOutcome::AlreadyRunning);
        }

        spawn_exit_monitor(
            Arc::clone(&self.registry),
            Arc::clone(&self.observer),
            profile_id.clone(),
            child,
        );

        info!(profile_id = %profile_id, name, pid, "browser launched");
        Ok(LaunchOutcome::Launched {
            pid,
            skipped: built.skipped,
        })
    }

    /// Stop the browser process for a profile.
    ///
    /// No-op success when nothing is running. On success the process is
    /// confirmed gone and the registry record removed before returning.
    /// [`Error::TerminationTimeout`] leaves the record in place; a live
    /// process is never silently dropped from tracking.
    pub fn stop(&self, profile_id: &ProfileId) -> Result<()> {
        self.stop_with_timeouts(
            profile_id,
            self.timeouts.term_timeout(),
            self.timeouts.kill_timeout(),
        )
        .map(|_| ())
    }

    /// Escalating stop with explicit windows. Returns whether the
    /// graceful stage sufficed (used by fleet shutdown reporting).
    pub(crate) fn stop_with_timeouts(
        &self,
        profile_id: &ProfileId,
        term_timeout: std::time::Duration,
        kill_timeout: std::time::Duration,
    ) -> Result<bool> {
        escalate_stop(
            &self.registry,
            profile_id,
            term_timeout,
            kill_timeout,
            self.timeouts.poll_interval(),
        )
    }

    /// Whether a live process is tracked for this profile.
    pub fn is_running(&self, profile_id: &ProfileId) -> bool {
        match self.registry.get(profile_id) {
            Some(record) => signal::process_exists(record.pid),
            None => false,
        }
    }

    pub fn running_count(&self) -> usize {
        self.registry.count()
    }

    pub fn running_ids(&self) -> std::collections::BTreeSet<ProfileId> {
        self.registry.snapshot_ids()
    }

    /// Acquire the per-profile launch slot. `None` means a record exists
    /// or another launch for the same id is in flight.
    fn begin_launch(&self, profile_id: &ProfileId) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().expect("in-flight lock");
        if self.registry.contains(profile_id) || !in_flight.insert(profile_id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            orchestrator: self,
            profile_id: profile_id.clone(),
        })
    }
}

/// SIGTERM, wait, then SIGKILL, wait. The registry record is removed as
/// soon as the process is confirmed gone; a process that survives both
/// windows keeps its record so the fleet view never claims a live
/// process is gone.
pub(crate) fn escalate_stop(
    registry: &ProcessRegistry,
    profile_id: &ProfileId,
    term_timeout: std::time::Duration,
    kill_timeout: std::time::Duration,
    poll: std::time::Duration,
) -> Result<bool> {
    let record = match registry.get(profile_id) {
        Some(record) => record,
        None => {
            debug!(profile_id = %profile_id, "stop requested but profile is not running");
            return Ok(true);
        }
    };
    let pid = record.pid;

    info!(profile_id = %profile_id, pid, "stopping browser");
    signal::send_signal(pid, SIGTERM)?;
    if signal::wait_for_exit(pid, term_timeout, poll) == WaitOutcome::Exited {
        registry.remove(profile_id);
        info!(profile_id = %profile_id, pid, "browser stopped gracefully");
        return Ok(true);
    }

    warn!(profile_id = %profile_id, pid, "graceful termination timed out; escalating to SIGKILL");
    signal::send_signal(pid, SIGKILL)?;
    if signal::wait_for_exit(pid, kill_timeout, poll) == WaitOutcome::Exited {
        registry.remove(profile_id);
        return Ok(false);
    }

    Err(Error::TerminationTimeout {
        profile_id: profile_id.to_string(),
        pid,
    })
}

fn is_executable(meta: &std::fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        true
    }
}

/// Releases the in-flight launch marker on every exit path.
struct InFlightGuard<'a> {
    orchestrator: &'a Orchestrator,
    profile_id: ProfileId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator
            .in_flight
            .lock()
            .expect("in-flight lock")
            .remove(&self.profile_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn orchestrator(tmp: &TempDir) -> Orchestrator {
        let config = FleetConfig {
            base_data_dir: Some(tmp.path().join("data")),
            ..Default::default()
        };
        Orchestrator::new(config).unwrap()
    }

    #[test]
    fn launch_without_executable_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        let profile = BrowserProfile::new("Alpha");
        let err = orch.launch(&profile).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(orch.running_count(), 0);
    }

    #[test]
    fn launch_rejects_blank_name() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        let profile = BrowserProfile::new("  ");
        assert!(matches!(
            orch.launch(&profile).unwrap_err(),
            Error::InvalidProfile(_)
        ));
    }

    #[test]
    fn stop_on_unknown_profile_is_success() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        assert!(orch.stop(&ProfileId::from("ghost")).is_ok());
        assert!(!orch.is_running(&ProfileId::from("ghost")));
    }

    #[test]
    fn launch_after_shutdown_flag_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        orch.shutting_down.store(true, Ordering::SeqCst);
        let profile = BrowserProfile::new("Alpha");
        assert!(matches!(
            orch.launch(&profile).unwrap_err(),
            Error::ShuttingDown
        ));
    }

    #[test]
    fn set_default_executable_rejects_missing_path() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        let err = orch
            .set_default_executable(PathBuf::from("/nonexistent/browser"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[cfg(unix)]
    #[test]
    fn set_default_executable_rejects_non_executable_file() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        let path = tmp.path().join("not-a-browser");
        std::fs::write(&path, "plain file").unwrap();
        assert!(orch.set_default_executable(path).is_err());
    }

    #[test]
    fn in_flight_guard_releases_the_slot() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(&tmp);
        let id = ProfileId::from("alpha");
        {
            let guard = orch.begin_launch(&id);
            assert!(guard.is_some());
            // Second acquisition while held must fail
            assert!(orch.begin_launch(&id).is_none());
        }
        assert!(orch.begin_launch(&id).is_some());
    }
}
