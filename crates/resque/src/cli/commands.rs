//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::booking::BookingForm;
use crate::donor::DonorForm;
use crate::geo::{Coordinates, DeviceLocation};
use crate::query::DonorQuery;

/// Book command arguments.
#[derive(Debug, Args)]
pub struct BookCommand {
    /// Patient name
    #[arg(short, long)]
    pub name: String,

    /// Contact phone with country code
    #[arg(short, long)]
    pub phone: String,

    /// Pickup address
    #[arg(long)]
    pub pickup: String,

    /// Kind of emergency
    #[arg(short, long)]
    pub emergency: Option<String>,

    /// Requested pickup time
    #[arg(short, long)]
    pub time: Option<String>,

    /// Extra notes for the crew
    #[arg(long)]
    pub notes: Option<String>,

    /// Address previously found by `resque locate`, if it was used
    #[arg(long, value_name = "ADDRESS")]
    pub resolved: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl BookCommand {
    /// The form these arguments describe.
    #[must_use]
    pub fn form(&self) -> BookingForm {
        BookingForm {
            patient_name: self.name.clone(),
            phone: self.phone.clone(),
            pickup: self.pickup.clone(),
            emergency_type: self.emergency.clone().unwrap_or_default(),
            pickup_time: self.time.clone().unwrap_or_default(),
            notes: self.notes.clone().unwrap_or_default(),
        }
    }
}

/// Locate command arguments.
#[derive(Debug, Args)]
pub struct LocateCommand {
    /// Device latitude
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Device longitude
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Behave as a device without location support
    #[arg(long, conflicts_with_all = ["lat", "lon", "denied"])]
    pub unavailable: bool,

    /// Behave as if the location permission was refused
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    pub denied: bool,

    /// Override the configured lookup deadline
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

impl LocateCommand {
    /// The simulated device, or `None` when no position source was given.
    #[must_use]
    pub fn device(&self) -> Option<DeviceLocation> {
        if self.unavailable {
            return Some(DeviceLocation::Unavailable);
        }
        if self.denied {
            return Some(DeviceLocation::Denied);
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(DeviceLocation::Fixed(Coordinates::new(lat, lon))),
            _ => None,
        }
    }
}

/// Donor registry commands.
#[derive(Debug, Subcommand)]
pub enum DonorCommand {
    /// Register a new blood donor
    Register(RegisterCommand),

    /// List donors, newest first
    List(ListCommand),

    /// Show registry statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Re-print the list whenever another process changes the registry
    Watch(FilterArgs),
}

/// Register command arguments.
#[derive(Debug, Args)]
pub struct RegisterCommand {
    /// Donor name
    #[arg(short, long)]
    pub name: String,

    /// Contact phone with country code
    #[arg(short, long)]
    pub phone: String,

    /// Blood group (A+, A-, B+, B-, AB+, AB-, O+, O-)
    #[arg(short, long, default_value = "", allow_hyphen_values = true)]
    pub blood_group: String,

    /// City
    #[arg(long)]
    pub city: String,

    /// Notes such as availability
    #[arg(long, default_value = "")]
    pub notes: String,
}

impl RegisterCommand {
    /// The form these arguments describe.
    #[must_use]
    pub fn form(&self) -> DonorForm {
        DonorForm {
            name: self.name.clone(),
            phone: self.phone.clone(),
            blood_group: self.blood_group.clone(),
            city: self.city.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Donor search filters.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Case-insensitive text to find in donor names
    #[arg(short, long)]
    pub search: Option<String>,

    /// Exact blood group
    #[arg(short, long, allow_hyphen_values = true)]
    pub blood_group: Option<String>,
}

impl FilterArgs {
    /// The query these filters describe.
    #[must_use]
    pub fn query(&self) -> DonorQuery {
        DonorQuery {
            text: self.search.clone(),
            blood_group: self.blood_group.clone(),
        }
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Search filters
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Plain,
    /// Table format
    #[default]
    Table,
    /// JSON output
    Json,
}
