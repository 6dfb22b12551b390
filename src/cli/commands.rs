use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `rewoo-engine` - dependency-driven plan execution.
#[derive(Parser, Debug)]
#[command(name = "rewoo-engine")]
#[command(version)]
#[command(about = "Validate and dry-run ReWOO execution plans.", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default lookup
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a plan file and print its execution layers
    Check {
        /// Path to a plan in JSON form
        plan: PathBuf,
    },

    /// Execute a plan against an echo invoker and print the result
    DryRun {
        /// Path to a plan in JSON form
        plan: PathBuf,

        /// Text available to steps as `{{input}}`
        #[arg(short, long, default_value = "")]
        input: String,
    },

    /// Print the effective configuration as TOML
    Config,
}
