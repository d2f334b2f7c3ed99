//! Browser Fleet Core - Process Lifecycle Orchestrator
//!
//! The main entry point for bf-core, handling:
//! - Launching isolated browser instances from profile JSON files
//! - Supervising the fleet until it drains or SIGINT arrives
//! - Printing the constructed command line for a profile (dry run)

use bf_common::{format_error_human, BrowserProfile, Error};
use bf_core::config::FleetConfig;
use bf_core::exit_codes::ExitCode;
use bf_core::lifecycle::{LaunchOutcome, Orchestrator};
use bf_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use bf_core::{command, sandbox};
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Browser Fleet Core - isolated browser process orchestration
#[derive(Parser)]
#[command(name = "bf-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to config.toml (default: XDG config dir)
    #[arg(long, global = true, env = "BF_CONFIG")]
    config: Option<PathBuf>,

    /// Default browser executable (overrides config)
    #[arg(long, global = true, env = "BF_BROWSER")]
    browser: Option<PathBuf>,

    /// Base directory for per-profile data (overrides config)
    #[arg(long, global = true, env = "BF_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format (human, json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch browsers for one or more profile JSON files and supervise
    /// the fleet until it drains or SIGINT arrives
    Launch {
        /// Profile JSON files
        #[arg(required = true)]
        profiles: Vec<PathBuf>,
    },

    /// Print the command line that would be used for a profile, without
    /// spawning anything
    Argv {
        /// Profile JSON file
        profile: PathBuf,
    },
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn handle_sigint(_sig: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_sigint_handler() {
    let handler = handle_sigint as extern "C" fn(i32) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

#[cfg(not(unix))]
fn install_sigint_handler() {}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env(
        cli.global.log_level,
        cli.global.log_format,
    ));

    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            let use_color = std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(&err, use_color));
            match err {
                Error::Config(_) | Error::InvalidProfile(_) => ExitCode::ConfigError,
                Error::Json(_) => ExitCode::ArgsError,
                _ => ExitCode::InternalError,
            }
        }
    };
    code.exit();
}

fn run(cli: &Cli) -> Result<ExitCode, Error> {
    let (mut config, config_path) = FleetConfig::load(cli.global.config.as_deref())
        .map_err(|err| Error::Config(err.to_string()))?;
    if let Some(path) = &config_path {
        info!(path = %path.display(), "loaded config");
    }
    if let Some(browser) = &cli.global.browser {
        config.browser_path = Some(browser.clone());
    }
    if let Some(data_dir) = &cli.global.data_dir {
        config.base_data_dir = Some(data_dir.clone());
    }

    match &cli.command {
        Commands::Launch { profiles } => cmd_launch(config, profiles),
        Commands::Argv { profile } => cmd_argv(config, profile),
    }
}

fn load_profile(path: &Path) -> Result<BrowserProfile, Error> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        Error::InvalidProfile(format!("cannot read profile file {}: {err}", path.display()))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn cmd_launch(config: FleetConfig, profile_paths: &[PathBuf]) -> Result<ExitCode, Error> {
    install_sigint_handler();
    let orchestrator = Arc::new(Orchestrator::new(config)?);

    let mut launched = 0usize;
    let mut failed = 0usize;
    for path in profile_paths {
        let profile = match load_profile(path) {
            Ok(profile) => profile,
            Err(err) => {
                eprintln!("{}: {err}", path.display());
                failed += 1;
                continue;
            }
        };
        match orchestrator.launch(&profile) {
            Ok(LaunchOutcome::Launched { pid, skipped }) => {
                println!("launched '{}' (pid {pid})", profile.name);
                for attribute in skipped {
                    println!("  note: {} not applied: {}", attribute, attribute.reason());
                }
                launched += 1;
            }
            Ok(LaunchOutcome::AlreadyRunning) => {
                println!("'{}' is already running", profile.name);
            }
            Err(err) => {
                let use_color = std::io::stderr().is_terminal();
                eprintln!("{}", format_error_human(&err, use_color));
                failed += 1;
            }
        }
    }

    if launched == 0 {
        return Ok(if failed > 0 {
            ExitCode::PartialFail
        } else {
            ExitCode::Clean
        });
    }

    // Supervise until every browser is closed or shutdown is requested
    info!(running = orchestrator.running_count(), "supervising fleet");
    while orchestrator.running_count() > 0 && !SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    let report = orchestrator.shutdown();
    if !report.all_confirmed() {
        return Ok(ExitCode::PartialFail);
    }
    Ok(if failed > 0 {
        ExitCode::PartialFail
    } else {
        ExitCode::Clean
    })
}

fn cmd_argv(config: FleetConfig, profile_path: &Path) -> Result<ExitCode, Error> {
    let profile = load_profile(profile_path)?;
    let attrs = bf_common::LaunchAttributes::from(&profile);

    let executable = attrs
        .executable_override
        .clone()
        .or(config.browser_path.clone())
        .ok_or_else(|| {
            Error::Config("no browser executable configured and profile carries no override".into())
        })?;

    let data_dir = sandbox::prepare(&config.resolved_data_dir(), &profile.id)?;
    let built = command::build(&executable, &attrs, &data_dir);
    for token in &built.argv {
        println!("{token}");
    }
    for attribute in &built.skipped {
        eprintln!("note: {} not applied: {}", attribute, attribute.reason());
    }
    Ok(ExitCode::Clean)
}
