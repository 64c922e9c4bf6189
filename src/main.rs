mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vademecum::config::Config;
use vademecum::error::{ErrorCategory, ScrapeErrorTrait};
use vademecum::models::RunSummary;

/// Exit code after an operator interrupt (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

/// Exit code for configuration errors
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(
    name = "vademecum",
    version,
    about = "Scraper for the ANMAT public drug registry lookup",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every organization of the list and append the listings
    Run {
        /// Organization list (CSV, name in the third column)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show the browser window
        #[arg(long, default_value = "false")]
        headed: bool,

        /// Pause after each search and page turn, in seconds
        #[arg(long)]
        delay: Option<f64>,

        /// Skip organizations before this exact name
        #[arg(long)]
        resume_from: Option<String>,

        /// Stop after this many organizations
        #[arg(long)]
        max_organizations: Option<usize>,

        /// Write a checkpoint file at the end of the run
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Resume a run from its checkpoint file
    Resume {
        /// Checkpoint file path
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Override max organizations
        #[arg(long)]
        max_organizations: Option<usize>,
    },

    /// Print the organization list with indices
    Organizations {
        /// Organization list (CSV, name in the third column)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose);

    tracing::info!("vademecum starting");

    let result: Result<Option<RunSummary>> = match cli.command {
        Commands::Run {
            input,
            output,
            headed,
            delay,
            resume_from,
            max_organizations,
            checkpoint,
        } => {
            if let Some(input) = input {
                config.scraper.input_path = input;
            }
            if let Some(output) = output {
                config.scraper.output_path = output;
            }
            if headed {
                config.browser.headless = false;
            }
            if let Some(delay) = delay {
                config.scraper.inter_request_delay_secs = delay;
            }
            if resume_from.is_some() {
                config.scraper.resume_from = resume_from;
            }
            if max_organizations.is_some() {
                config.scraper.max_organizations = max_organizations;
            }
            if checkpoint.is_some() {
                config.scraper.checkpoint_path = checkpoint;
            }

            tracing::info!(
                input = %config.scraper.input_path.display(),
                output = %config.scraper.output_path.display(),
                headless = config.browser.headless,
                resume_from = ?config.scraper.resume_from,
                max_organizations = ?config.scraper.max_organizations,
                "Starting run command"
            );
            commands::run(config).await.map(Some)
        }

        Commands::Resume {
            checkpoint,
            max_organizations,
        } => {
            tracing::info!(
                checkpoint = %checkpoint.display(),
                max_organizations = ?max_organizations,
                "Starting resume command"
            );
            commands::resume(config, &checkpoint, max_organizations).await
        }

        Commands::Organizations { input } => {
            let input = input.unwrap_or(config.scraper.input_path);
            commands::organizations(&input).map(|()| None)
        }
    };

    match result {
        Ok(Some(summary)) if summary.interrupted => {
            tracing::warn!("vademecum interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Ok(_) => {
            tracing::info!("vademecum completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "vademecum failed");
            eprintln!("Error: {e:?}");
            if is_config_error(&e) {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// File first, then `VADEMECUM_*` variables; CLI flags are applied later
fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn is_config_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<vademecum::Error>()
        .is_some_and(|e| e.category() == ErrorCategory::Config)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("vademecum=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("vademecum={level},warn"))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vademecum=info,warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
