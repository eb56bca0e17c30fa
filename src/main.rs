//! logtally - count classified lines across rotated log files.
//!
//! Each invocation resumes from a durable position that survives log
//! rotation, reads every line appended since, classifies it into counters,
//! and atomically commits the new counters together with the new position.
//!
//!   logtally config                      # Create ~/.logtally/config.toml
//!   logtally run                         # One pass over the configured logs
//!   logtally run --file a.1 --file a     # Override the file set
//!   logtally show --format json          # Print the committed state

mod application;
mod cli;
mod domain;
mod infrastructure;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{format_report, format_state, OutputFormat, StateView, TallyService};
use cli::{Cli, Commands};
use domain::AppConfig;
use infrastructure::{ensure_config_exists, load_config, StateStore};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let format = cli
        .output_format()
        .map_err(|e| domain::AppError::Config { message: e })?;

    match cli.command {
        Commands::Run {
            files,
            no_recover,
            skip_history,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(state) = cli.state {
                config.state_file = Some(state);
            }
            if !files.is_empty() {
                config.files = files;
            }
            if no_recover {
                config.recover_lost_position = false;
            }
            if skip_history {
                config.skip_history = true;
            }
            cmd_run(&config, format)?;
        }
        Commands::Show => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(state) = cli.state {
                config.state_file = Some(state);
            }
            cmd_show(&config, format)?;
        }
        Commands::Config => {
            cmd_config(cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Run one tally pass.
fn cmd_run(config: &AppConfig, format: OutputFormat) -> domain::Result<()> {
    let service = TallyService::new(config)?;
    let report = service.run()?;

    let output = format_report(&report, format).map_err(json_error)?;
    println!("{output}");

    Ok(())
}

/// Show the committed state.
fn cmd_show(config: &AppConfig, format: OutputFormat) -> domain::Result<()> {
    let store = StateStore::new(config.state_file_path());
    let state = store.load()?;

    let view = StateView {
        state_file: store.path(),
        committed_at: store.last_modified()?,
        state: state.as_ref(),
    };

    let output = format_state(&view, format).map_err(json_error)?;
    println!("{output}");

    Ok(())
}

/// Create the default configuration file.
fn cmd_config(path: Option<&std::path::Path>) -> domain::Result<()> {
    let (path, created) = ensure_config_exists(path)?;

    if created {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("{}", path.display());
    }

    Ok(())
}

fn json_error(err: serde_json::Error) -> domain::AppError {
    domain::AppError::Config {
        message: format!("Failed to render JSON: {err}"),
    }
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
