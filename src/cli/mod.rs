//! CLI module for dispatchr - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
