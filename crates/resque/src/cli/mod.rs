//! Command-line interface for resque.
//!
//! This module provides the CLI structure for the `resque` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BookCommand, ConfigCommand, DonorCommand, FilterArgs, ListCommand, LocateCommand,
    OutputFormat, RegisterCommand,
};

use crate::logging::Verbosity;

/// resque - Ambulance booking and blood donor registry
///
/// Composes ambulance booking messages for a dispatch desk and keeps a local
/// registry of blood donors.
#[derive(Debug, Parser)]
#[command(name = "resque")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compose an ambulance booking and print its dispatch link
    Book(BookCommand),

    /// Look up a pickup address from device coordinates
    Locate(LocateCommand),

    /// Manage the blood donor registry
    #[command(subcommand)]
    Donor(DonorCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
