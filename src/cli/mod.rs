//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{OpsCommand, RunCommand, ValidateCommand};

/// Configuration-driven data pipeline runner
#[derive(Debug, Parser, Clone)]
#[command(name = "datapipe")]
#[command(author = "Datapipe Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Run YAML-defined data pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// List registered operations
    Ops(OpsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from(["datapipe", "run", "--file", "pipeline.yml"]).unwrap();
        assert!(matches!(cli.command, Command::Run(_)));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_verbose_flag() {
        let cli =
            Cli::try_parse_from(["datapipe", "validate", "--file", "p.yml", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["datapipe"]).is_err());
    }
}
