//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Initial input value (a plain string unless --input-json is set)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Parse --input as JSON instead of plain text
    #[arg(long)]
    pub input_json: bool,

    /// Write the final output as pretty JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Base directory for relative file storage locations
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// SQLite database path for database storage (defaults to the user data dir)
    #[cfg(feature = "sqlite")]
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Hide the step progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output the parsed configuration in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered operations
#[derive(Debug, Args, Clone)]
pub struct OpsCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
