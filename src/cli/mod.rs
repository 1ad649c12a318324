pub mod config;
pub mod paths;
pub mod profile;
pub mod promises;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sbpledge")]
#[command(author, version, about = "OpenBSD-style pledge() for macOS via Seatbelt")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "SBPLEDGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show seatbelt availability and engine configuration
    Status,

    /// List known promises and whether they can be enforced
    Promises(promises::PromisesArgs),

    /// Print the compiled SBPL profile for a promise string
    Profile(profile::ProfileArgs),

    /// Pledge a child process and check enforcement
    Test(test::TestArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Show resolved XDG directory paths
    Paths,
}
