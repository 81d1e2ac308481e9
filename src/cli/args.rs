use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(version, about = "Personal notes backend: HTML notes with derived plaintext/Markdown")]
pub struct Cli {
    /// Path to a JSON configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Path to the data directory (overrides the configuration file)
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Watch the notes directory for external edits
    #[clap(long)]
    pub watch: bool,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the notekeep application
    #[clap(subcommand)]
    pub command: Commands,
}
