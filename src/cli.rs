use clap::{Parser, Subcommand};
use imgload_fetch::CachePolicy;
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "imgload", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Override the configured cache policy
    #[arg(short, long, global = true, value_name = "none|memory|disk")]
    pub policy: Option<CachePolicy>,
    /// Increase log verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load images concurrently and report their dimensions
    Fetch {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<Url>,
    },
    /// Empty every cache tier selected by the policy
    Clear,
    /// List the entries of the disk cache
    List,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
