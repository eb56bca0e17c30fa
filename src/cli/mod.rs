//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;

/// logtally - count classified lines across rotated log files.
///
/// Typically run from cron: each `run` continues exactly where the previous
/// one stopped, even if the logs were rotated in between.
#[derive(Parser, Debug)]
#[command(name = "logtally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format: text, json, or table.
    #[arg(short, long, default_value = "text", global = true)]
    pub format: String,

    /// Configuration file (default: ~/.logtally/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State file, overriding the configuration.
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read everything appended since the last run and commit new counters.
    Run {
        /// Log file, oldest first; repeat to replace the configured file set.
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Resume from the end of the newest file when the position is lost.
        #[arg(long)]
        no_recover: bool,

        /// Start at the end of the newest file when no state exists yet.
        #[arg(long)]
        skip_history: bool,
    },

    /// Show the committed counters and position.
    Show,

    /// Create the default configuration file if missing and print its path.
    Config,
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_files() {
        let cli = Cli::parse_from([
            "logtally",
            "-vv",
            "run",
            "--file",
            "/var/log/mail.log.1",
            "--file",
            "/var/log/mail.log",
            "--no-recover",
        ]);

        assert_eq!(cli.verbose, 2);
        let Commands::Run {
            files, no_recover, ..
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(files.len(), 2);
        assert!(no_recover);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["logtally", "show", "--format", "json", "--state", "/tmp/s"]);
        assert!(matches!(cli.output_format(), Ok(OutputFormat::Json)));
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/s")));
    }
}
