use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use engine_logging::LogDestination;

/// Crawl ArcGIS REST catalogs into a versioned SQLite catalog.
#[derive(Parser, Debug)]
#[command(name = "cataloger", version, about)]
pub struct CliArgs {
    /// Configuration file holding the server list
    #[arg(long, default_value = "cataloger.ron")]
    pub config: PathBuf,

    /// Database path (overrides the configuration file)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Crawl every server due for a crawl
    Crawl,
    /// Sample record counts for every server due for a count pass
    Count,
    /// Crawl, then sample counts
    All,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}
