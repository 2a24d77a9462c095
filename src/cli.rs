use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Inspect, evaluate and normalize filter tree documents
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "FILTER_TREE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Filter document to load (overrides `default_document` from the config)
    #[arg(short = 'f', long, global = true)]
    pub filters: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// When to use terminal colors
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the filter tree as a grid
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Evaluate rows against the filter tree
    Check {
        /// JSON array of objects, or one JSON object per line
        #[arg(short, long)]
        rows: PathBuf,

        /// List rejected rows instead of accepted ones
        #[arg(long)]
        rejected: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Rewrite the filter document in canonical form
    Fmt {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
