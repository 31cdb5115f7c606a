//! CLI command definitions using clap.
//!
//! - run: drive classify → dispatch → verify cycles against the test command
//! - classify: classify a saved failure list and show the plan, without dispatching
//! - domains: show the signature registry

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dispatchr - failure-driven specialist dispatch
#[derive(Parser, Debug)]
#[command(name = "dispatchr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run dispatch cycles until the tests pass or the cycle budget is spent
    Run {
        /// Override engine.max-cycles
        #[arg(long)]
        max_cycles: Option<u32>,

        /// Override engine.max-concurrency
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Append each cycle report as a JSON line to this file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Classify a JSON failure list and print the resulting plan
    Classify {
        /// File holding a JSON array of failures
        file: PathBuf,
    },

    /// List registered domains, their precedence and location overlaps
    Domains,
}
