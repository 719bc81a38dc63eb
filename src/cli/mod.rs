//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Discord bot that hands out bias roles.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "fanman")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short = 'c', long = "config-file", default_value = "config.yml")]
    pub config_file: PathBuf,

    /// Also log debug output to stdout
    #[arg(short, long)]
    pub debug: bool,
}
