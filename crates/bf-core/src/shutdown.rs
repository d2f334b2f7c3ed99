//! Fleet-wide shutdown coordination.
//!
//! Stops every tracked process in parallel under one overall deadline.
//! Each profile gets the normal escalation with the (shorter) shutdown
//! timeouts; anything not confirmed stopped when the deadline lands is
//! force-killed as a last resort without further waiting. The report
//! never claims success for a process that was not confirmed gone.

use crate::lifecycle::{escalate_stop, Orchestrator};
use crate::signal::{self, SIGKILL};
use bf_common::ProfileId;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Per-profile shutdown result.
#[derive(Debug, Clone)]
pub struct ShutdownEntry {
    pub profile_id: ProfileId,
    /// Graceful termination sufficed (no SIGKILL needed).
    pub graceful: bool,
    /// The process was confirmed gone before return.
    pub confirmed: bool,
}

/// Aggregate report from [`Orchestrator::shutdown_all`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub entries: Vec<ShutdownEntry>,
    pub completed_within_deadline: bool,
}

impl ShutdownReport {
    pub fn all_confirmed(&self) -> bool {
        self.entries.iter().all(|entry| entry.confirmed)
    }
}

impl Orchestrator {
    /// Stop all tracked processes in parallel, bounded by
    /// `overall_deadline`.
    ///
    /// Also flips the shutdown flag: subsequent launches are rejected and
    /// in-flight grace waits abort, so the deadline holds even when
    /// individual processes are unresponsive. Idempotent; with an empty
    /// registry this is a cheap no-op.
    pub fn shutdown_all(&self, overall_deadline: Duration) -> ShutdownReport {
        self.shutting_down.store(true, Ordering::SeqCst);

        let ids = self.registry.snapshot_ids();
        if ids.is_empty() {
            return ShutdownReport {
                entries: Vec::new(),
                completed_within_deadline: true,
            };
        }

        info!(count = ids.len(), "shutting down fleet");
        let started = Instant::now();
        let (tx, rx) = mpsc::channel::<ShutdownEntry>();

        for profile_id in &ids {
            let registry = Arc::clone(&self.registry);
            let profile_id = profile_id.clone();
            let tx = tx.clone();
            let term = self.timeouts.shutdown_term();
            let kill = self.timeouts.shutdown_kill();
            let poll = self.timeouts.poll_interval();
            std::thread::Builder::new()
                .name(format!("bf-stop-{profile_id}"))
                .spawn(move || {
                    let entry = match escalate_stop(&registry, &profile_id, term, kill, poll) {
                        Ok(graceful) => ShutdownEntry {
                            profile_id,
                            graceful,
                            confirmed: true,
                        },
                        Err(err) => {
                            warn!(profile_id = %profile_id, error = %err, "profile did not stop cleanly");
                            ShutdownEntry {
                                profile_id,
                                graceful: false,
                                confirmed: false,
                            }
                        }
                    };
                    // Receiver may already have hit the deadline
                    let _ = tx.send(entry);
                })
                .map(|_| ())
                .unwrap_or_else(|err| {
                    warn!(error = %err, "failed to spawn stopper thread");
                });
        }
        drop(tx);

        let mut entries: Vec<ShutdownEntry> = Vec::with_capacity(ids.len());
        let mut completed_within_deadline = true;
        loop {
            if entries.len() == ids.len() {
                break;
            }
            let remaining = overall_deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                completed_within_deadline = false;
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(entry) => entries.push(entry),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    completed_within_deadline = false;
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        // Deadline exhausted: force-kill stragglers without waiting
        let reported: std::collections::BTreeSet<_> =
            entries.iter().map(|entry| entry.profile_id.clone()).collect();
        for profile_id in ids.iter().filter(|id| !reported.contains(id)) {
            if let Some(record) = self.registry.get(profile_id) {
                warn!(profile_id = %profile_id, pid = record.pid, "deadline reached; force-killing");
                let _ = signal::send_signal(record.pid, SIGKILL);
            }
            entries.push(ShutdownEntry {
                profile_id: profile_id.clone(),
                graceful: false,
                confirmed: false,
            });
        }

        info!(
            confirmed = entries.iter().filter(|entry| entry.confirmed).count(),
            total = entries.len(),
            "fleet shutdown finished"
        );
        ShutdownReport {
            entries,
            completed_within_deadline,
        }
    }

    /// Shutdown with the configured overall deadline.
    pub fn shutdown(&self) -> ShutdownReport {
        self.shutdown_all(self.timeouts.shutdown_overall())
    }
}
