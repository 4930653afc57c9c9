//! updater-host - command line host for the updater core
//!
//! Usage:
//!   updater-host [OPTIONS] <check|apply|cleanup|version|platform>
//!
//! `apply` checks first, downloads and verifies the release, then prints the
//! path of the verified artifact. Installing it is left to the caller.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use updater_core::config::{ConfigStore, ConfigStoreConfig, UpdaterConfig};
use updater_core::logging::{LogLevel, LoggingConfig, LoggingSystem};
use updater_core::update::UpdateProgressCallback;
use updater_core::{App, UpdateStatus};

/// Subcommands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Check,
    Apply,
    Cleanup,
    Version,
    Platform,
}

/// Command line arguments
struct Args {
    command: Command,
    /// Configuration file; the platform default when absent
    config_path: Option<PathBuf>,
    endpoint: Option<String>,
    channel: Option<String>,
    scratch_dir: Option<PathBuf>,
    /// Print results as JSON
    json: bool,
    /// Enable verbose logging
    verbose: bool,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let mut command = None;
        let mut config_path = None;
        let mut endpoint = None;
        let mut channel = None;
        let mut scratch_dir = None;
        let mut json = false;
        let mut verbose = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config_path = Some(PathBuf::from(
                        args.next().ok_or("--config requires a path")?,
                    ));
                }
                "--endpoint" | "-e" => {
                    endpoint = Some(args.next().ok_or("--endpoint requires a URL")?);
                }
                "--channel" => {
                    channel = Some(args.next().ok_or("--channel requires a name")?);
                }
                "--scratch-dir" | "-s" => {
                    scratch_dir = Some(PathBuf::from(
                        args.next().ok_or("--scratch-dir requires a path")?,
                    ));
                }
                "--json" | "-j" => {
                    json = true;
                }
                "--verbose" | "-v" => {
                    verbose = true;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "check" | "apply" | "cleanup" | "version" | "platform" if command.is_none() => {
                    command = Some(match arg.as_str() {
                        "check" => Command::Check,
                        "apply" => Command::Apply,
                        "cleanup" => Command::Cleanup,
                        "version" => Command::Version,
                        _ => Command::Platform,
                    });
                }
                _ => {
                    return Err(format!("Unknown argument: {}", arg));
                }
            }
        }

        let command = command.ok_or("a command is required")?;

        Ok(Self {
            command,
            config_path,
            endpoint,
            channel,
            scratch_dir,
            json,
            verbose,
        })
    }
}

fn print_help() {
    println!(
        r#"updater-host - check for, download and verify application updates

USAGE:
    updater-host [OPTIONS] <COMMAND>

COMMANDS:
    check       Ask the release endpoint whether a newer version exists
    apply       Check, then download and verify the newer version
    cleanup     Remove leftover partial downloads from the scratch directory
    version     Print the version of this build
    platform    Print the platform string sent to the release endpoint

OPTIONS:
    -c, --config <PATH>        Configuration file (default: platform config dir)
    -e, --endpoint <URL>       Override the manifest endpoint
        --channel <NAME>       Override the release channel
    -s, --scratch-dir <PATH>   Override the download directory
    -j, --json                 Print results as JSON
    -v, --verbose              Enable verbose logging
    -h, --help                 Print this help message

ENVIRONMENT:
    RUST_LOG                   Overrides the log filter
"#
    );
}

fn init_logging(verbose: bool) -> Option<LoggingSystem> {
    let config = if verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::new().with_level(LogLevel::Warn).with_target(false)
    };

    match LoggingSystem::init(config) {
        Ok(system) => Some(system),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    }
}

async fn load_config(args: &Args) -> anyhow::Result<UpdaterConfig> {
    let settings = match &args.config_path {
        Some(path) => ConfigStoreConfig {
            config_path: path.clone(),
            create_default: false,
        },
        None => ConfigStoreConfig::default(),
    };

    let store = ConfigStore::new(settings)
        .await
        .context("failed to load updater configuration")?;
    let mut config = store.get().await;

    // Command line overrides apply to this run only
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(channel) = &args.channel {
        config.channel = channel.clone();
    }
    if let Some(dir) = &args.scratch_dir {
        config.scratch_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;

    Ok(config)
}

fn print_progress_callback(json: bool) -> UpdateProgressCallback {
    Arc::new(move |progress| {
        if json {
            if let Ok(line) = serde_json::to_string(&progress) {
                eprintln!("{}", line);
            }
        } else {
            eprintln!("[{:>3}%] {}: {}", progress.progress, progress.status, progress.message);
        }
    })
}

async fn run(args: Args) -> anyhow::Result<bool> {
    match args.command {
        Command::Version => {
            println!("{}", updater_core::core::current_version());
            return Ok(true);
        }
        Command::Platform => {
            println!("{}", updater_core::core::platform_info());
            return Ok(true);
        }
        _ => {}
    }

    let config = load_config(&args).await?;
    let app = App::with_progress_callback(&config, print_progress_callback(args.json))?;

    let succeeded = match args.command {
        Command::Check => {
            let info = app.check_for_update().await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else if info.available {
                println!("Update available: {} -> {}", info.current_version, info.latest_version);
                if !info.release_notes.is_empty() {
                    println!("\n{}", info.release_notes);
                }
            } else {
                println!("Up to date ({})", info.current_version);
            }
            true
        }
        Command::Apply => {
            let info = app.check_for_update().await;
            if !info.available {
                println!("Up to date ({})", info.current_version);
                return Ok(true);
            }

            let outcome = app.apply_update().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.message);
            }

            match (outcome.status, app.ready_artifact()) {
                (UpdateStatus::Ready, Some(artifact)) => {
                    if !args.json {
                        println!("Verified {} artifact: {}", artifact.mode, artifact.path.display());
                        println!("Restart required to finish the update.");
                    }
                    true
                }
                (UpdateStatus::Ready, None) => bail!("update reported ready without an artifact"),
                _ => false,
            }
        }
        Command::Cleanup => {
            let removed = app.cleanup().await?;
            println!("Removed {} partial download(s) from {}", removed, config.scratch_dir.display());
            true
        }
        Command::Version | Command::Platform => true,
    };

    Ok(succeeded)
}

#[tokio::main]
async fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(2);
        }
    };

    let _logging = init_logging(args.verbose);

    match run(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("updater-host failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
