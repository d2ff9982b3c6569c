//! slotprov - Entry Point
//!
//! Installs the WB slots monitoring bot on an Ubuntu host and registers it as
//! a systemd service.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;

use slotprov::app::options::PipelineOptions;
use slotprov::app::run::{run, RunOutcome};
use slotprov::config::collector::StdioPrompter;
use slotprov::deploy::prereq::{ensure_privileged, PrerequisiteChecker};
use slotprov::deploy::service::ServiceStatus;
use slotprov::host::Host;
use slotprov::logs::{init_logging, LogLevel, LogOptions};
use slotprov::storage::target::DeploymentTarget;
use slotprov::utils::{effective_uid, version_info, HostFacts};

use tracing::{error, info};

const USAGE: &str = "\
Usage: slotprov [OPTIONS]

Options:
  --phase=1|2              Run only phase 1 (host, source, venv) or phase 2
                           (configuration, service). Default: both
  --identity=dedicated|<account>
                           Run the service as the dedicated account (default)
                           or an existing one such as root
  --config=<record.json>   Read the configuration from a file instead of
                           prompting
  --target=<target.json>   Override install root, account and unit names
  --log-level=<level>      trace, debug, info, warn or error
  --version                Print build information
  --help                   Print this help";

const KNOWN_FLAGS: &[&str] = &[
    "phase",
    "identity",
    "config",
    "target",
    "log-level",
    "version",
    "help",
];

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = run_cli().await;
    std::process::exit(code);
}

async fn run_cli() -> i32 {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        } else {
            print_error(&format!("Unexpected argument: {}", arg));
            eprintln!("{}", USAGE);
            return 1;
        }
    }

    if let Some(unknown) = cli_args.keys().find(|k| !KNOWN_FLAGS.contains(&k.as_str())) {
        print_error(&format!("Unknown option: --{}", unknown));
        eprintln!("{}", USAGE);
        return 1;
    }

    if cli_args.contains_key("help") {
        println!("{}", USAGE);
        return 0;
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => {
                print_error(&e.to_string());
                return 1;
            }
        }
        return 0;
    }

    let options = match build_options(&cli_args) {
        Ok(options) => options,
        Err(e) => {
            print_error(&format!("{:#}", e));
            eprintln!("{}", USAGE);
            return 1;
        }
    };

    if let Err(e) = ensure_privileged(effective_uid()) {
        print_error(&e.to_string());
        return 1;
    }

    // Initialize logging; the guard flushes the log file on exit
    let _guard = match init_logging(options.log.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let target = match load_target(cli_args.get("target")).await {
        Ok(target) => target,
        Err(e) => {
            error!("{:#}", e);
            print_error(&format!("{:#}", e));
            return 1;
        }
    };

    let facts = HostFacts::collect();
    PrerequisiteChecker::new(&target).check_host(&facts);
    println!("{}", "WB slots bot installer".bold());
    println!("Host:          {}", facts.describe());
    println!("Install root:  {}", target.install_root.display());
    println!("Mode:          {:?}", options.run_mode);
    println!();

    info!("Running with options: {:?}", options);
    let host = Host::system();
    let mut prompter = StdioPrompter;
    let outcome = match run(&options, &target, &host, &mut prompter).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            print_error(&e.to_string());
            return 1;
        }
    };

    report(&outcome, &target);
    outcome.exit_code()
}

fn build_options(cli_args: &HashMap<String, String>) -> anyhow::Result<PipelineOptions> {
    let mut options = PipelineOptions::default();

    if let Some(phase) = cli_args.get("phase") {
        options.run_mode = phase
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid --phase")?;
    }
    if let Some(identity) = cli_args.get("identity") {
        options.identity = identity
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid --identity")?;
    }
    if let Some(level) = cli_args.get("log-level") {
        let log_level: LogLevel = level
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid --log-level")?;
        options.log = LogOptions {
            log_level,
            ..Default::default()
        };
    }
    if let Some(path) = cli_args.get("config") {
        options.record_file = Some(PathBuf::from(path));
    }
    options.working_dir = env::current_dir().context("Unable to read the working directory")?;

    Ok(options)
}

async fn load_target(path: Option<&String>) -> anyhow::Result<DeploymentTarget> {
    match path {
        Some(path) => DeploymentTarget::load(Path::new(path))
            .await
            .with_context(|| format!("Unable to load target file {}", path)),
        None => Ok(DeploymentTarget::default()),
    }
}

fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}

fn report(outcome: &RunOutcome, target: &DeploymentTarget) {
    let finished = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let unit = target.unit();

    match outcome {
        RunOutcome::Completed { warnings, service } => {
            for warning in warnings {
                println!("{} {}", "[WARN]".yellow().bold(), warning);
            }
            match service {
                ServiceStatus::Active => {
                    println!("{} {} is running", "[OK]".green().bold(), unit)
                }
                ServiceStatus::Inactive { hint } => println!(
                    "{} {} is not active yet. Inspect with: {}",
                    "[WARN]".yellow().bold(),
                    unit,
                    hint
                ),
            }
            println!();
            println!("Installation finished at {}", finished);
            println!("Useful commands:");
            println!("  systemctl status {}", unit);
            println!("  systemctl restart {}", unit);
            println!("  journalctl -u {} -f", unit);
        }
        RunOutcome::PhaseOneComplete => {
            println!("{} Phase 1 finished at {}", "[OK]".green().bold(), finished);
            println!("Next steps:");
            println!(
                "  1. Upload the Google service account key to {}",
                target.credentials_file().path().display()
            );
            println!("  2. Run: sudo slotprov --phase=2");
        }
        RunOutcome::Cancelled => {
            println!("Installation cancelled. Nothing was changed.");
        }
        RunOutcome::RolledBack {
            stage,
            error,
            tree_removed,
        } => {
            let stage = stage.map(|s| s.to_string()).unwrap_or_else(|| "setup".to_string());
            print_error(&format!("Stage {} failed: {}", stage, error));
            let fate = if *tree_removed {
                format!("{} was removed", target.install_root.display())
            } else {
                format!("{} was kept", target.install_root.display())
            };
            eprintln!(
                "{} Service unit {} removed, {}",
                "[ROLLBACK]".red().bold(),
                unit,
                fate
            );
        }
    }
}
