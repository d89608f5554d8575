use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use pseudoroot::modules::daemon::Daemon;
use pseudoroot::modules::sequencer::MountSequence;
use pseudoroot::modules::service::Service;
use pseudoroot::modules::tree::TreeMaintenance;
use pseudoroot::modules::v4root::{AnchorStatus, BuildReport};
use pseudoroot::{Config, CreateStatus, ExportRegistry, PseudoRootManager, TeardownReport};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true, env = "PSEUDOROOT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the pseudo tree is built under
    #[arg(long, global = true, env = "PSEUDOROOT_DIR")]
    root: Option<PathBuf>,

    /// Don't build a pseudo root at all
    #[arg(long, global = true)]
    disable: bool,

    /// Create and remove directories with mkdir/rmdir helpers
    #[arg(long, global = true)]
    helper: bool,

    /// Seconds before a helper is killed (0 waits forever)
    #[arg(long, global = true, value_name = "SECS", requires = "helper")]
    helper_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the order exports would be mounted in
    Plan {
        /// JSON export file
        #[arg(short, long)]
        exports: PathBuf,
    },
    /// Build the pseudo root
    Create {
        /// JSON export file
        #[arg(short, long)]
        exports: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Tear the pseudo root down
    #[command(alias = "umountall")]
    Destroy,
    /// Build the pseudo root and keep it in sync until stopped
    Serve {
        /// JSON export file, reloaded on SIGHUP
        #[arg(short, long)]
        exports: PathBuf,
        /// Detach into the background
        #[arg(short, long)]
        daemon: bool,
        /// PID file written in daemon mode
        #[arg(long, default_value = "/run/pseudoroot.pid")]
        pid_file: PathBuf,
    },
}

#[derive(Serialize)]
struct OutcomeSummary {
    position: usize,
    export: PathBuf,
    target: PathBuf,
    mounted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum CreateSummary {
    Disabled,
    Aborted {
        error: String,
    },
    Built {
        anchor: String,
        exports: Vec<OutcomeSummary>,
    },
}

fn anchor_text(anchor: &AnchorStatus) -> String {
    match anchor {
        AnchorStatus::AlreadyMounted => "already mounted".to_string(),
        AnchorStatus::Mounted => "mounted".to_string(),
        AnchorStatus::Failed(e) => e.to_string(),
    }
}

fn summarize(status: &CreateStatus) -> CreateSummary {
    match status {
        CreateStatus::Disabled => CreateSummary::Disabled,
        CreateStatus::Aborted(e) => CreateSummary::Aborted {
            error: e.to_string(),
        },
        CreateStatus::Built(BuildReport { anchor, outcomes }) => CreateSummary::Built {
            anchor: anchor_text(anchor),
            exports: outcomes
                .iter()
                .map(|o| OutcomeSummary {
                    position: o.position,
                    export: o.export_path.clone(),
                    target: o.target.clone(),
                    mounted: o.result.is_ok(),
                    error: o.result.as_ref().err().map(ToString::to_string),
                })
                .collect(),
        },
    }
}

fn print_summary(summary: &CreateSummary) {
    match summary {
        CreateSummary::Disabled => println!("Pseudo root disabled"),
        CreateSummary::Aborted { error } => println!("Pseudo root not built: {}", error),
        CreateSummary::Built { anchor, exports } => {
            println!("Anchor: {}", anchor);
            for export in exports {
                match &export.error {
                    None => println!(
                        "  [{}] {} -> {}",
                        export.position,
                        export.export.display(),
                        export.target.display()
                    ),
                    Some(error) => println!(
                        "  [{}] {} FAILED: {}",
                        export.position,
                        export.export.display(),
                        error
                    ),
                }
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if cli.disable {
        config.enabled = false;
    }
    if cli.helper {
        config.tree = TreeMaintenance::helper();
    }
    if let (Some(secs), TreeMaintenance::Helper { timeout_secs, .. }) =
        (cli.helper_timeout, &mut config.tree)
    {
        *timeout_secs = (secs > 0).then_some(secs);
    }

    config.validate()?;
    Ok(config)
}

fn load_exports(path: &Path) -> Result<ExportRegistry> {
    ExportRegistry::load(path)
        .with_context(|| format!("Failed to load exports from {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_env("PSEUDOROOT_LOG")
        .init();

    let config = load_config(&cli)?;
    info!("Pseudo root at {}", config.root.display());

    match &cli.command {
        Commands::Plan { exports } => {
            let registry = load_exports(exports)?;
            let manager = PseudoRootManager::system(&config);
            for record in MountSequence::from_registry(&registry) {
                println!(
                    "{}: {} -> {}",
                    record.position,
                    record.export.path.display(),
                    manager.target_for(&record.export.path).display()
                );
            }
        }
        Commands::Create { exports, json } => {
            let registry = load_exports(exports)?;
            let manager = PseudoRootManager::system(&config);
            let summary = summarize(&manager.create(&registry));
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Destroy => {
            let manager = PseudoRootManager::system(&config);
            match manager.destroy() {
                TeardownReport::NotPresent => println!("Nothing to tear down"),
                TeardownReport::Performed { detach, removal } => {
                    if let Err(e) = detach {
                        println!("Detach failed: {}", e);
                    }
                    if let Err(e) = removal {
                        println!("Removal failed: {}", e);
                    }
                    println!("Pseudo root {} torn down", config.root.display());
                }
            }
        }
        Commands::Serve {
            exports,
            daemon,
            pid_file,
        } => {
            let daemon = daemon.then(|| Daemon::new(pid_file, "/"));
            if let Some(daemon) = &daemon {
                daemon.start()?;
            }

            let service = Service::new(PseudoRootManager::system(&config), exports);
            let result = service.run();

            if let Some(daemon) = &daemon {
                daemon.remove_pid_file();
            }
            result?;
        }
    }

    Ok(())
}
