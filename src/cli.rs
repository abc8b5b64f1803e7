use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Parser, Serialize)]
#[command(name = "ladder", about = "Ranked ladder for a roster of friends")]
pub struct Cli {
    /// Local YAML settings file, merged before environment variables
    #[arg(long, default_value = "ladder.yaml")]
    #[serde(skip)]
    pub config: PathBuf,
    /// Maximum number of in-flight upstream requests
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Durable cache connection string (redis://...)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    /// Directory used for the file-backed local cache
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[command(subcommand)]
    #[serde(skip)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the current ranking snapshot
    Ranking,
    /// Print champion and duo insights for one player
    Player { name: String, tag: String },
    /// Keep the ranking warm on a schedule until interrupted
    Watch,
}
