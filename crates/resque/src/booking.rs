//! Ambulance booking composition.
//!
//! A submitted [`BookingForm`] is validated, turned into a [`BookingRequest`]
//! and rendered into a fixed-layout message plus a messaging deep link.
//! Composition is pure; opening the link is left to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::validate::{normalize_phone, validate_booking, ValidationReport};

const DEFAULT_EMERGENCY: &str = "Not specified";
const DEFAULT_PICKUP_TIME: &str = "ASAP";
const DEFAULT_NOTES: &str = "None";

/// Raw booking form input, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingForm {
    /// Patient name.
    pub patient_name: String,
    /// Contact phone with country code.
    pub phone: String,
    /// Pickup address.
    pub pickup: String,
    /// Kind of emergency, optional.
    pub emergency_type: String,
    /// Requested pickup time, optional.
    pub pickup_time: String,
    /// Free-form notes, optional.
    pub notes: String,
}

/// A validated booking. Built per submission and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Patient name, trimmed.
    pub name: String,
    /// Contact phone with whitespace stripped.
    pub phone: String,
    /// Pickup address exactly as confirmed on the form, trimmed.
    pub pickup_address: String,
    /// Emergency type or `"Not specified"`.
    pub emergency_type: String,
    /// Pickup time or `"ASAP"`.
    pub pickup_time: String,
    /// Notes or `"None"`.
    pub notes: String,
    /// Whether the pickup matches the address found by location lookup.
    pub location_assisted: bool,
    /// When the request was composed.
    pub composed_at: DateTime<Utc>,
}

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

impl BookingRequest {
    /// Build a request from a form that already passed validation.
    ///
    /// `resolved` is the address pre-filled by location lookup, if any. It
    /// never replaces the form's pickup.
    #[must_use]
    pub fn from_form(form: &BookingForm, resolved: Option<&str>, at: DateTime<Utc>) -> Self {
        let pickup_address = form.pickup.trim().to_string();
        let location_assisted = resolved.is_some_and(|r| r.trim() == pickup_address);

        Self {
            name: form.patient_name.trim().to_string(),
            phone: normalize_phone(&form.phone),
            pickup_address,
            emergency_type: or_default(&form.emergency_type, DEFAULT_EMERGENCY),
            pickup_time: or_default(&form.pickup_time, DEFAULT_PICKUP_TIME),
            notes: or_default(&form.notes, DEFAULT_NOTES),
            location_assisted,
            composed_at: at,
        }
    }
}

/// A booking ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedBooking {
    /// The request the message was rendered from.
    pub request: BookingRequest,
    /// Message text, one field per line.
    pub message: String,
    /// Deep link that opens the message addressed to dispatch.
    pub dispatch_uri: String,
}

/// Renders booking requests for a dispatch destination.
#[derive(Debug, Clone)]
pub struct BookingComposer {
    base_url: String,
    destination: String,
    title: String,
}

impl BookingComposer {
    /// Create a composer for the configured destination.
    #[must_use]
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            destination: config.destination.clone(),
            title: config.title.clone(),
        }
    }

    /// Render the message text for `request`.
    #[must_use]
    pub fn message(&self, request: &BookingRequest) -> String {
        format!(
            "{title}\n\
             Patient: {name}\n\
             Contact: {phone}\n\
             Pickup: {pickup}\n\
             Emergency: {emergency}\n\
             Pickup Time: {time}\n\
             Notes: {notes}\n\
             Sent at: {sent}",
            title = self.title,
            name = request.name,
            phone = request.phone,
            pickup = request.pickup_address,
            emergency = request.emergency_type,
            time = request.pickup_time,
            notes = request.notes,
            sent = request.composed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }

    /// Deep link carrying `message` to the dispatch destination.
    #[must_use]
    pub fn dispatch_uri(&self, message: &str) -> String {
        format!(
            "{}/{}?text={}",
            self.base_url,
            self.destination,
            urlencoding::encode(message)
        )
    }

    /// Render an already validated request.
    #[must_use]
    pub fn render(&self, request: BookingRequest) -> ComposedBooking {
        let message = self.message(&request);
        let dispatch_uri = self.dispatch_uri(&message);
        ComposedBooking {
            request,
            message,
            dispatch_uri,
        }
    }

    /// Validate `form` and compose the booking.
    ///
    /// # Errors
    ///
    /// Returns the validation report when any field fails; no link is built.
    pub fn compose(
        &self,
        form: &BookingForm,
        resolved: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<ComposedBooking, ValidationReport> {
        let report = validate_booking(form);
        if !report.is_ok() {
            debug!(errors = report.len(), "Booking form rejected");
            return Err(report);
        }
        Ok(self.render(BookingRequest::from_form(form, resolved, at)))
    }
}

/// Where a booking submission stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BookingState {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// Fields are being checked.
    Validating,
    /// The last submission failed validation.
    Invalid(ValidationReport),
    /// A validated request is being rendered.
    Composing,
    /// The last submission produced a dispatch link.
    Dispatched(ComposedBooking),
}

impl BookingState {
    /// Whether a new submission may start from this state.
    #[must_use]
    pub fn accepts_submit(&self) -> bool {
        matches!(self, Self::Idle | Self::Invalid(_) | Self::Dispatched(_))
    }
}

/// Drives one booking form through its states.
#[derive(Debug, Clone)]
pub struct BookingFlow {
    composer: BookingComposer,
    state: BookingState,
}

impl BookingFlow {
    /// Start idle.
    #[must_use]
    pub fn new(composer: BookingComposer) -> Self {
        Self {
            composer,
            state: BookingState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &BookingState {
        &self.state
    }

    /// Submit the form, ending in [`BookingState::Invalid`] or
    /// [`BookingState::Dispatched`].
    ///
    /// Every submission re-validates all fields, so a previously invalid
    /// form can be corrected and resubmitted.
    pub fn submit(
        &mut self,
        form: &BookingForm,
        resolved: Option<&str>,
        at: DateTime<Utc>,
    ) -> &BookingState {
        self.state = match self.composer.compose(form, resolved, at) {
            Ok(composed) => {
                info!(
                    location_assisted = composed.request.location_assisted,
                    "Booking composed"
                );
                BookingState::Dispatched(composed)
            }
            Err(report) => BookingState::Invalid(report),
        };
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Field;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 14, 30, 5).unwrap()
    }

    fn form() -> BookingForm {
        BookingForm {
            patient_name: "Jane Doe".to_string(),
            phone: "+91 98765 43210".to_string(),
            pickup: "12 Elm Street".to_string(),
            ..Default::default()
        }
    }

    fn composer() -> BookingComposer {
        BookingComposer::new(&DispatchConfig::default())
    }

    #[test]
    fn test_valid_booking_is_composed() {
        let booking = composer().compose(&form(), None, at()).unwrap();

        assert!(booking.message.contains("Contact: +919876543210"));
        assert!(booking
            .dispatch_uri
            .starts_with("https://wa.me/919999999999?text="));
    }

    #[test]
    fn test_message_layout_and_defaults() {
        let booking = composer().compose(&form(), None, at()).unwrap();
        let lines: Vec<&str> = booking.message.lines().collect();

        assert_eq!(
            lines,
            vec![
                "RESQuE Ambulance Booking",
                "Patient: Jane Doe",
                "Contact: +919876543210",
                "Pickup: 12 Elm Street",
                "Emergency: Not specified",
                "Pickup Time: ASAP",
                "Notes: None",
                "Sent at: 2024-06-01 14:30:05 UTC",
            ]
        );
    }

    #[test]
    fn test_optional_fields_are_used_when_present() {
        let form = BookingForm {
            emergency_type: " Cardiac ".to_string(),
            pickup_time: "18:00".to_string(),
            notes: "Gate 2".to_string(),
            ..form()
        };
        let booking = composer().compose(&form, None, at()).unwrap();

        assert!(booking.message.contains("Emergency: Cardiac\n"));
        assert!(booking.message.contains("Pickup Time: 18:00\n"));
        assert!(booking.message.contains("Notes: Gate 2\n"));
    }

    #[test]
    fn test_dispatch_uri_is_percent_encoded() {
        let booking = composer().compose(&form(), None, at()).unwrap();
        let (_, query) = booking.dispatch_uri.split_once("?text=").unwrap();

        assert!(!query.contains(' '));
        assert!(!query.contains('\n'));
        assert!(query.contains("%0A"));
        assert_eq!(urlencoding::decode(query).unwrap(), booking.message);
    }

    #[test]
    fn test_short_name_is_rejected() {
        let form = BookingForm {
            patient_name: "A".to_string(),
            ..form()
        };
        let report = composer().compose(&form, None, at()).unwrap_err();

        assert_eq!(report.len(), 1);
        assert_eq!(report.get(Field::PatientName), Some("Enter a valid name."));
    }

    #[test]
    fn test_resolved_address_never_overrides_pickup() {
        let booking = composer()
            .compose(&form(), Some("MG Road, Bengaluru"), at())
            .unwrap();

        assert!(booking.message.contains("Pickup: 12 Elm Street\n"));
        assert!(!booking.request.location_assisted);
    }

    #[test]
    fn test_confirmed_resolved_address_marks_assisted() {
        let form = BookingForm {
            pickup: "MG Road, Bengaluru".to_string(),
            ..form()
        };
        let booking = composer()
            .compose(&form, Some("MG Road, Bengaluru"), at())
            .unwrap();
        assert!(booking.request.location_assisted);
    }

    #[test]
    fn test_custom_destination_and_base() {
        let config = DispatchConfig {
            base_url: "https://example.test/send/".to_string(),
            destination: "15550001111".to_string(),
            title: "Dispatch".to_string(),
        };
        let booking = BookingComposer::new(&config)
            .compose(&form(), None, at())
            .unwrap();

        assert!(booking
            .dispatch_uri
            .starts_with("https://example.test/send/15550001111?text="));
        assert!(booking.message.starts_with("Dispatch\n"));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = BookingRequest::from_form(&form(), None, at());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["pickupAddress"], "12 Elm Street");
        assert_eq!(json["locationAssisted"], false);
        assert_eq!(json["pickupTime"], "ASAP");
    }

    #[test]
    fn test_flow_invalid_then_corrected() {
        let mut flow = BookingFlow::new(composer());
        assert_eq!(flow.state(), &BookingState::Idle);

        let bad = BookingForm {
            pickup: "Elm".to_string(),
            ..form()
        };
        let state = flow.submit(&bad, None, at());
        assert!(matches!(state, BookingState::Invalid(r) if r.get(Field::Pickup).is_some()));
        assert!(flow.state().accepts_submit());

        let state = flow.submit(&form(), None, at());
        assert!(matches!(state, BookingState::Dispatched(b) if b.request.name == "Jane Doe"));
        assert!(flow.state().accepts_submit());
    }

    #[test]
    fn test_flow_matches_composer_output() {
        let composer = composer();
        let mut flow = BookingFlow::new(composer.clone());
        let expected = composer.compose(&form(), Some("12 Elm Street"), at()).unwrap();

        let state = flow.submit(&form(), Some("12 Elm Street"), at());
        assert_eq!(state, &BookingState::Dispatched(expected));

        let bad = BookingForm {
            phone: "12".to_string(),
            ..form()
        };
        let report = composer.compose(&bad, None, at()).unwrap_err();
        assert_eq!(flow.submit(&bad, None, at()), &BookingState::Invalid(report));
    }

    #[test]
    fn test_intermediate_states_do_not_accept_submit() {
        assert!(!BookingState::Validating.accepts_submit());
        assert!(!BookingState::Composing.accepts_submit());
    }
}
