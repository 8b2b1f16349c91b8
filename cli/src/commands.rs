use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "easyscan")]
#[command(about = "Operator tools for easyscan requests and transfer staging", long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "EASYSCAN_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate the configuration file and print a summary
    CheckConfig,
    /// List the most recent scan requests
    Recent {
        #[arg(short, long, default_value_t = 20)]
        limit: u64,
    },
    /// Count scan requests created between two dates (inclusive)
    Stats {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Stage and send an existing scan request again
    Resend { id: i64 },
    /// Inspect or clear the local staging directory
    Staging {
        #[command(subcommand)]
        command: StagingCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum StagingCommand {
    /// List files in the staging directory and count requests awaiting resend
    List,
    /// Remove staged files, count files first
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
