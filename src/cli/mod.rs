//! CLI module for kaizen - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
