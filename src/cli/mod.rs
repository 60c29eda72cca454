//! Operator tool for firehose configs
//!
//! Provides offline subcommands:
//! - `firehose-orchestrator render` - Synthesize a manifest into an orchestrator resource
//! - `firehose-orchestrator diff` - Structural diff of two resource specs
//! - `firehose-orchestrator slug` - Print the slug derived from a title

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

#[derive(Parser, Debug)]
#[command(name = "firehose-orchestrator")]
#[command(about = "Render and inspect Firehose deployments")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to settings file (default: ~/.firehose/config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before settings
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize a firehose manifest and print the orchestrator resource
    Render(RenderArgs),

    /// Show the structural diff between two spec files
    Diff(DiffArgs),

    /// Print the slug of a title
    Slug(SlugArgs),
}

/// Arguments for the render command
#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Path to the firehose manifest (JSON or YAML)
    pub file: PathBuf,

    /// Project slug (default: the manifest's project)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Output as JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the diff command
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Old spec (JSON or YAML)
    pub old: PathBuf,

    /// New spec (JSON or YAML)
    pub new: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SlugArgs {
    pub title: String,
}
