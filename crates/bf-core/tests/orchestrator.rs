//! End-to-end lifecycle tests against real child processes.
//!
//! Browsers are stand-ins: small shell scripts that accept the generated
//! flags and either stay alive, exit immediately, or ignore SIGTERM.

#![cfg(unix)]

use bf_common::{BrowserProfile, Error, ProfileId};
use bf_core::config::{FleetConfig, TimeoutConfig};
use bf_core::lifecycle::{LaunchOutcome, Orchestrator};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Write an executable script that plays the role of the browser.
fn fake_browser(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

fn fast_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        grace_period_ms: 300,
        term_timeout_ms: 2_000,
        kill_timeout_ms: 2_000,
        poll_interval_ms: 20,
        shutdown_term_ms: 1_000,
        shutdown_kill_ms: 1_000,
        shutdown_overall_ms: 5_000,
    }
}

fn orchestrator(tmp: &TempDir, browser: PathBuf, timeouts: TimeoutConfig) -> Arc<Orchestrator> {
    let config = FleetConfig {
        browser_path: Some(browser),
        base_data_dir: Some(tmp.path().join("data")),
        timeouts,
    };
    Arc::new(Orchestrator::new(config).expect("orchestrator"))
}

fn profile(id: &str) -> BrowserProfile {
    let mut profile = BrowserProfile::new(id.to_uppercase());
    profile.id = ProfileId::from(id);
    profile
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn launch_then_stop_full_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "browser.sh", "exec sleep 60");
    let orch = orchestrator(&tmp, browser, fast_timeouts());
    let alpha = profile("alpha");

    let outcome = orch.launch(&alpha).unwrap();
    let pid = match outcome {
        LaunchOutcome::Launched { pid, .. } => pid,
        other => panic!("expected launch, got {other:?}"),
    };

    assert!(orch.is_running(&alpha.id));
    assert_eq!(orch.running_count(), 1);
    assert!(orch.running_ids().contains(&alpha.id));
    // Working directory exists under the base root
    assert!(tmp.path().join("data").join("alpha").is_dir());

    orch.stop(&alpha.id).unwrap();
    assert!(!orch.is_running(&alpha.id));
    assert_eq!(orch.running_count(), 0);
    // The OS process is really gone, not just untracked
    assert!(wait_until(Duration::from_secs(2), || {
        (unsafe { libc::kill(pid as i32, 0) }) != 0
    }));
}

#[test]
fn second_launch_reports_already_running() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "browser.sh", "exec sleep 60");
    let orch = orchestrator(&tmp, browser, fast_timeouts());
    let alpha = profile("alpha");

    assert!(orch.launch(&alpha).unwrap().launched());
    assert!(matches!(
        orch.launch(&alpha).unwrap(),
        LaunchOutcome::AlreadyRunning
    ));
    assert_eq!(orch.running_count(), 1);

    orch.stop(&alpha.id).unwrap();
}

#[test]
fn immediate_exit_is_reported_as_spawn_failure() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "broken.sh", "exit 7");
    let orch = orchestrator(&tmp, browser, fast_timeouts());
    let alpha = profile("alpha");

    let err = orch.launch(&alpha).unwrap_err();
    match err {
        Error::SpawnFailed { reason, .. } => assert!(reason.contains('7'), "reason: {reason}"),
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
    // No record left behind; relaunch is possible
    assert_eq!(orch.running_count(), 0);
    assert!(!orch.is_running(&alpha.id));
}

#[test]
fn external_kill_is_detected_without_caller_action() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "browser.sh", "exec sleep 60");
    let orch = orchestrator(&tmp, browser, fast_timeouts());
    let alpha = profile("alpha");

    let pid = match orch.launch(&alpha).unwrap() {
        LaunchOutcome::Launched { pid, .. } => pid,
        other => panic!("expected launch, got {other:?}"),
    };

    // Simulate a browser crash from outside the orchestrator
    unsafe { libc::kill(pid as i32, libc::SIGKILL) };

    assert!(wait_until(Duration::from_secs(5), || {
        !orch.is_running(&alpha.id) && orch.running_count() == 0
    }));
}

#[test]
fn stop_escalates_past_sigterm_ignorers() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "stubborn.sh", "trap '' TERM\nsleep 60 &\nwait");
    let timeouts = TimeoutConfig {
        term_timeout_ms: 300,
        ..fast_timeouts()
    };
    let orch = orchestrator(&tmp, browser, timeouts);
    let alpha = profile("alpha");

    assert!(orch.launch(&alpha).unwrap().launched());
    orch.stop(&alpha.id).unwrap();
    assert!(!orch.is_running(&alpha.id));
    assert_eq!(orch.running_count(), 0);
}

#[test]
fn concurrent_launches_admit_exactly_one() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "browser.sh", "exec sleep 60");
    let orch = orchestrator(&tmp, browser, fast_timeouts());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orch = Arc::clone(&orch);
            std::thread::spawn(move || orch.launch(&profile("alpha")).unwrap().launched())
        })
        .collect();
    let launched = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|launched| *launched)
        .count();

    assert_eq!(launched, 1);
    assert_eq!(orch.running_count(), 1);
    orch.stop(&ProfileId::from("alpha")).unwrap();
}

#[test]
fn distinct_profiles_launch_in_parallel() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "browser.sh", "exec sleep 60");
    let orch = orchestrator(&tmp, browser, fast_timeouts());

    let handles: Vec<_> = ["alpha", "bravo", "charlie"]
        .into_iter()
        .map(|id| {
            let orch = Arc::clone(&orch);
            std::thread::spawn(move || orch.launch(&profile(id)).unwrap().launched())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(orch.running_count(), 3);

    let report = orch.shutdown_all(Duration::from_secs(5));
    assert!(report.all_confirmed());
    assert_eq!(orch.running_count(), 0);
}

#[test]
fn fleet_shutdown_returns_within_deadline_and_force_kills() {
    let tmp = TempDir::new().unwrap();
    // Every browser ignores SIGTERM and the per-profile graceful window
    // is far longer than the overall deadline
    let browser = fake_browser(tmp.path(), "stubborn.sh", "trap '' TERM\nsleep 60 &\nwait");
    let timeouts = TimeoutConfig {
        shutdown_term_ms: 30_000,
        shutdown_overall_ms: 30_000,
        ..fast_timeouts()
    };
    let orch = orchestrator(&tmp, browser, timeouts);

    let ids = ["p1", "p2", "p3", "p4", "p5"];
    for id in ids {
        assert!(orch.launch(&profile(id)).unwrap().launched());
    }

    let deadline = Duration::from_secs(1);
    let started = Instant::now();
    let report = orch.shutdown_all(deadline);
    let elapsed = started.elapsed();

    assert!(
        elapsed < deadline + Duration::from_secs(2),
        "shutdown took {elapsed:?}"
    );
    assert!(!report.completed_within_deadline);
    assert_eq!(report.entries.len(), ids.len());

    // Force-kill drains the fleet shortly after return
    assert!(wait_until(Duration::from_secs(5), || orch.running_count() == 0));
}

#[test]
fn launches_are_rejected_during_shutdown() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "browser.sh", "exec sleep 60");
    let orch = orchestrator(&tmp, browser, fast_timeouts());

    assert!(orch.launch(&profile("alpha")).unwrap().launched());
    let report = orch.shutdown_all(Duration::from_secs(5));
    assert!(report.all_confirmed());

    assert!(matches!(
        orch.launch(&profile("bravo")).unwrap_err(),
        Error::ShuttingDown
    ));
}

#[test]
fn working_directory_persists_across_restart() {
    let tmp = TempDir::new().unwrap();
    let browser = fake_browser(tmp.path(), "browser.sh", "exec sleep 60");
    let orch = orchestrator(&tmp, browser, fast_timeouts());
    let alpha = profile("alpha");

    assert!(orch.launch(&alpha).unwrap().launched());
    let marker = tmp.path().join("data").join("alpha").join("Cookies");
    std::fs::write(&marker, "state").unwrap();
    orch.stop(&alpha.id).unwrap();

    assert!(orch.launch(&alpha).unwrap().launched());
    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "state");
    orch.stop(&alpha.id).unwrap();
}
