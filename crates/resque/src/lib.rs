//! `resque` - Ambulance booking composer and blood donor registry
//!
//! This library validates and composes emergency ambulance bookings into a
//! messaging deep link, resolves pickup addresses from device coordinates,
//! and keeps an append-only registry of blood donors shared by every context
//! that opens the same store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod booking;
pub mod cli;
pub mod config;
pub mod donor;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod logging;
pub mod query;
pub mod registry;
pub mod storage;
pub mod validate;

pub use booking::{
    BookingComposer, BookingFlow, BookingForm, BookingRequest, BookingState, ComposedBooking,
};
pub use config::Config;
pub use donor::{BloodGroup, DonorForm, DonorRecord, IdGenerator, SequenceIds, UuidIds};
pub use error::{Error, Result};
pub use geo::{GeoError, GeoResolver, NominatimGeocoder};
pub use handlers::Command;
pub use logging::init_logging;
pub use query::DonorQuery;
pub use registry::{Registry, RegistryStats, RegistryWatch};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use validate::{Field, ValidationReport};
