//! Browser Fleet Core Library
//!
//! This library provides the process lifecycle orchestrator for a fleet of
//! isolated browser instances:
//! - Per-profile working-directory sandboxing
//! - Deterministic command-line construction from profile attributes
//! - Concurrency-safe process registry (at most one live process per profile)
//! - Launch/stop lifecycle with timeout-escalation termination
//! - Per-process exit monitoring and fleet-wide shutdown
//!
//! The binary entry point is in `main.rs`.

pub mod command;
pub mod config;
pub mod exit_codes;
pub mod lifecycle;
pub mod logging;
pub mod monitor;
pub mod registry;
pub mod sandbox;
pub mod shutdown;
pub mod signal;

pub use command::{build, BuiltCommand, SkippedAttribute};
pub use config::{FleetConfig, TimeoutConfig};
pub use lifecycle::{LaunchOutcome, Orchestrator};
pub use monitor::{ExitObserver, NoopObserver};
pub use registry::{ProcessRecord, ProcessRegistry};
pub use shutdown::{ShutdownEntry, ShutdownReport};
