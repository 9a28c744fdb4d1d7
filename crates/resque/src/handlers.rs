//! Front-end event handlers.
//!
//! Each handler takes typed input and returns the [`Command`]s a front end
//! should carry out. Handlers never fail: every error becomes a status line
//! or inline field errors.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::booking::{BookingComposer, BookingForm};
use crate::donor::{DonorForm, DonorRecord, IdGenerator};
use crate::error::Error;
use crate::geo::GeoResolver;
use crate::query::DonorQuery;
use crate::registry::Registry;
use crate::storage::{KeyValueStore, StorageEvent};
use crate::validate::ValidationReport;

/// Shown when a booking has field errors.
pub const STATUS_FIX_BOOKING: &str = "Fix errors before sending.";
/// Shown when the dispatch link is opened.
pub const STATUS_OPENING: &str = "Opening dispatch chat… press Send to complete booking.";
/// Shown while a location lookup runs.
pub const STATUS_LOCATING: &str = "Finding your location…";
/// Shown when a lookup pre-filled the pickup.
pub const STATUS_LOCATED: &str = "Location found. Confirm address before sending.";
/// Shown when a donor form has field errors.
pub const STATUS_FIX_DONOR: &str = "Fix errors before saving.";
/// Shown after a donor is saved.
pub const STATUS_DONOR_SAVED: &str = "Donor registered. Thank you!";
/// Shown when saving a donor failed but may succeed on retry.
pub const STATUS_SAVE_RETRY: &str = "Could not save donor. Please try again.";
/// Shown when a search has no matches.
pub const STATUS_NO_RESULTS: &str = "No donors match your search.";

/// An effect requested by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a URI in the platform handler.
    OpenUri(String),
    /// Show the composed dispatch message.
    ShowMessage(String),
    /// Replace the status line.
    ShowStatus {
        /// Text to show; empty clears the line.
        message: String,
        /// Whether to style the line as an error.
        is_error: bool,
    },
    /// Show inline errors; fields absent from the report are cleared.
    ShowFieldErrors(ValidationReport),
    /// Re-render the donor list.
    RenderDonors(Vec<DonorRecord>),
    /// Put an address into the pickup field for the user to confirm.
    PrefillPickup(String),
    /// Reset the donor registration form.
    ClearDonorForm,
}

impl Command {
    /// An informational status line.
    pub fn status(message: impl Into<String>) -> Self {
        Self::ShowStatus {
            message: message.into(),
            is_error: false,
        }
    }

    /// An error status line.
    pub fn error(message: impl Into<String>) -> Self {
        Self::ShowStatus {
            message: message.into(),
            is_error: true,
        }
    }
}

/// Booking form submitted.
///
/// `resolved` is the last address a location lookup produced, if any.
#[must_use]
pub fn on_booking_submit(
    composer: &BookingComposer,
    form: &BookingForm,
    resolved: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<Command> {
    match composer.compose(form, resolved, now) {
        Ok(booking) => vec![
            Command::ShowFieldErrors(ValidationReport::default()),
            Command::ShowMessage(booking.message),
            Command::OpenUri(booking.dispatch_uri),
            Command::status(STATUS_OPENING),
        ],
        Err(report) => vec![
            Command::ShowFieldErrors(report),
            Command::error(STATUS_FIX_BOOKING),
        ],
    }
}

/// Status to show when a location lookup starts.
#[must_use]
pub fn on_locate_started() -> Command {
    Command::status(STATUS_LOCATING)
}

/// "Use my location" pressed.
pub async fn on_locate(resolver: &GeoResolver, timeout: Duration) -> Vec<Command> {
    match resolver.resolve_address(timeout).await {
        Ok(address) => vec![
            Command::PrefillPickup(address),
            Command::status(STATUS_LOCATED),
        ],
        Err(e) => vec![Command::error(e.status_message())],
    }
}

/// Donor registration form submitted.
pub fn on_donor_submit<S: KeyValueStore>(
    registry: &Registry<S>,
    form: &DonorForm,
    ids: &dyn IdGenerator,
    now: DateTime<Utc>,
) -> Vec<Command> {
    match registry.register(form, ids, now) {
        Ok(_) => vec![
            Command::ShowFieldErrors(ValidationReport::default()),
            Command::ClearDonorForm,
            Command::RenderDonors(registry.list()),
            Command::status(STATUS_DONOR_SAVED),
        ],
        Err(Error::Validation(report)) => vec![
            Command::ShowFieldErrors(report),
            Command::error(STATUS_FIX_DONOR),
        ],
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "Donor registration failed");
            vec![Command::error(STATUS_SAVE_RETRY)]
        }
        Err(e) => {
            warn!(error = %e, "Donor registration failed");
            vec![Command::error(format!("Could not save donor: {e}"))]
        }
    }
}

/// Search box or blood group filter changed.
pub fn on_donor_search<S: KeyValueStore>(
    registry: &Registry<S>,
    query: &DonorQuery,
) -> Vec<Command> {
    let donors = registry.search(query);
    if donors.is_empty() && !query.is_unconstrained() {
        vec![
            Command::RenderDonors(donors),
            Command::status(STATUS_NO_RESULTS),
        ]
    } else {
        vec![Command::RenderDonors(donors), Command::status("")]
    }
}

/// Another context wrote to storage.
///
/// Re-renders with the current query when the registry key was touched.
pub fn on_storage_event<S: KeyValueStore>(
    registry: &Registry<S>,
    event: &StorageEvent,
    query: &DonorQuery,
) -> Vec<Command> {
    if !event.concerns(registry.key()) {
        debug!(key = ?event.key, "Ignoring unrelated storage change");
        return Vec::new();
    }
    vec![Command::RenderDonors(registry.search(query))]
}
