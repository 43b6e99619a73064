use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, default_value = "human")]
    pub output: crate::cli::output::OutputFormat,

    /// Element backend to search (overrides the config file)
    #[arg(long)]
    pub backend: Option<String>,

    /// Element tree file (JSON or YAML) for the memory backend
    #[arg(long, value_name = "FILE")]
    pub tree: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
