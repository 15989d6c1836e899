//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Diagnostics for browser download synchronization.
///
/// Checks that a browser's DevTools endpoint can report download events,
/// relocates files the way a finished download is archived, and shows the
/// effective configuration.
#[derive(Parser, Debug)]
#[command(name = "cdp-download")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Check that a DevTools endpoint supports download events
    Probe {
        /// Remote debugging endpoint, e.g. http://127.0.0.1:9222
        endpoint: String,
    },

    /// Move a file into a fresh archive folder and print its new path
    Archive {
        /// File to relocate
        file: PathBuf,

        /// Archive root (defaults to the configured one)
        #[arg(long, value_name = "DIR")]
        archive_root: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}
