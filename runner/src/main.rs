mod config;
mod executors;
mod invocation;
mod submit;

use clap::{Parser, Subcommand};
use config::BatchConfig;
use executors::{Executors, LocalExecutor, ScheduledExecutor};
use std::{fs, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Batch launcher for the wind farm layout optimization study
#[derive(Parser)]
#[command(name = "wec-runner")]
#[command(about = "Submit and launch array-job optimization runs", version)]
struct Cli {
    /// Path to the batch config
    #[arg(short, long, default_value = "batch.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one array task: read the index from the environment and invoke the program
    Launch,
    /// Run the whole index set on a local thread pool, without a scheduler
    RunLocal,
    /// Render the sbatch submission script
    Script {
        /// Write the script to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render the submission script and hand it to sbatch
    Submit,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match BatchConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {e}", cli.config.display());
            exit(1);
        }
    };

    if config.preflight_checks() {
        error!("Batch config failed preflight checks, nothing was launched");
        exit(1);
    }

    let code = match cli.command {
        Commands::Launch => run(Executors::Scheduled(ScheduledExecutor::load(config))),
        Commands::RunLocal => run(Executors::Local(LocalExecutor::load(config))),
        Commands::Script { output } => {
            let script = submit::render_script(&config, &cli.config);

            match output {
                Some(path) => match fs::write(&path, script) {
                    Ok(()) => 0,
                    Err(e) => {
                        error!("Failed to write script to {}: {e}", path.display());
                        1
                    }
                },
                None => {
                    print!("{script}");
                    0
                }
            }
        }
        Commands::Submit => match submit::submit(&config, &cli.config) {
            Ok(code) => code,
            Err(e) => {
                error!("Failed to submit batch: {e}");
                1
            }
        },
    };

    exit(code);
}

fn run(mut executor: Executors) -> i32 {
    match executor.execute() {
        Ok(code) => code,
        Err(e) => {
            error!("Failed to execute: {e}");
            1
        }
    }
}
