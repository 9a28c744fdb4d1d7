//! Pickup address lookup.
//!
//! [`GeoResolver`] asks a [`LocationProvider`] for the device position, then a
//! [`ReverseGeocoder`] for a readable address. The whole lookup runs under one
//! deadline. When it expires the in-flight lookup is dropped, so a response
//! arriving afterwards can never change the result the caller already has.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GeocoderConfig;
use crate::error::{Error, Result};

/// Why an address could not be resolved.
///
/// Every kind is recoverable: the user types the address instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    /// The device has no location capability.
    #[error("device location is unavailable")]
    Unavailable,

    /// The user refused the location permission.
    #[error("location permission denied")]
    Denied,

    /// The reverse-geocoding request failed or returned an unusable body.
    #[error("reverse geocoding failed: {0}")]
    Network(String),

    /// The lookup did not finish in time.
    #[error("location lookup timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
}

impl GeoError {
    /// Status line shown to the user for this failure.
    #[must_use]
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Unavailable => "Your device doesn't support location.",
            Self::Denied => "Location permission denied. Type address manually.",
            Self::Network(_) => "Could not detect exact address. Please enter manually.",
            Self::Timeout(_) => "Location lookup timed out. Type address manually.",
        }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Source of the device position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Get the current position.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Unavailable`] or [`GeoError::Denied`].
    async fn current_position(&self) -> std::result::Result<Coordinates, GeoError>;
}

/// Converts coordinates into a human-readable address.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Look up the display address for `at`.
    ///
    /// `Ok(None)` means the service answered without a readable address.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Network`] on transport, status or decoding failure.
    async fn reverse(&self, at: Coordinates) -> std::result::Result<Option<String>, GeoError>;
}

/// A location provider with a fixed outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceLocation {
    /// The device reports these coordinates.
    Fixed(Coordinates),
    /// The device has no location sensor.
    Unavailable,
    /// The user denies the permission prompt.
    Denied,
}

#[async_trait]
impl LocationProvider for DeviceLocation {
    async fn current_position(&self) -> std::result::Result<Coordinates, GeoError> {
        match self {
            Self::Fixed(at) => Ok(*at),
            Self::Unavailable => Err(GeoError::Unavailable),
            Self::Denied => Err(GeoError::Denied),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Reverse geocoder speaking the Nominatim `/reverse` JSON API.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl NominatimGeocoder {
    /// Create a geocoder for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the endpoint is not a URL or the
    /// HTTP client cannot be built.
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let endpoint =
            reqwest::Url::parse(&config.endpoint).map_err(|e| Error::ConfigValidation {
                message: format!("invalid geocoder endpoint '{}': {e}", config.endpoint),
            })?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigValidation {
                message: format!("cannot build HTTP client: {e}"),
            })?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, at: Coordinates) -> std::result::Result<Option<String>, GeoError> {
        debug!(lat = at.latitude, lon = at.longitude, "Reverse geocoding");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", at.latitude.to_string()),
                ("lon", at.longitude.to_string()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| GeoError::Network(e.to_string()))?;

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| GeoError::Network(e.to_string()))?;

        Ok(body.display_name)
    }
}

/// Resolves the device position to a pickup address.
#[derive(Clone)]
pub struct GeoResolver {
    location: Arc<dyn LocationProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl fmt::Debug for GeoResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoResolver").finish_non_exhaustive()
    }
}

impl GeoResolver {
    /// Create a resolver from its two collaborators.
    #[must_use]
    pub fn new(location: Arc<dyn LocationProvider>, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self { location, geocoder }
    }

    /// Resolve the current position to an address within `timeout`.
    ///
    /// Falls back to `"<lat>, <lon>"` when the geocoder has no readable
    /// address for the position.
    ///
    /// # Errors
    ///
    /// Returns the [`GeoError`] of the failing step, or
    /// [`GeoError::Timeout`] when the deadline passes first.
    pub async fn resolve_address(&self, timeout: Duration) -> std::result::Result<String, GeoError> {
        if let Ok(result) = tokio::time::timeout(timeout, self.lookup()).await {
            match &result {
                Ok(address) => info!(address = %address, "Resolved pickup address"),
                Err(e) => warn!(error = %e, "Address lookup failed"),
            }
            result
        } else {
            warn!(timeout_ms = %timeout.as_millis(), "Address lookup timed out");
            Err(GeoError::Timeout(timeout))
        }
    }

    async fn lookup(&self) -> std::result::Result<String, GeoError> {
        let at = self.location.current_position().await?;
        let address = self.geocoder.reverse(at).await?;

        Ok(address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| at.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    const BANGALORE: Coordinates = Coordinates {
        latitude: 12.9716,
        longitude: 77.5946,
    };

    /// Answers after `delay`, counting lookups that ran to completion.
    struct SlowGeocoder {
        delay: Duration,
        answer: Option<String>,
        completed: AtomicUsize,
    }

    impl SlowGeocoder {
        fn new(delay: Duration, answer: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                delay,
                answer: answer.map(String::from),
                completed: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReverseGeocoder for SlowGeocoder {
        async fn reverse(&self, _at: Coordinates) -> std::result::Result<Option<String>, GeoError> {
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct FailingGeocoder;

    #[async_trait]
    impl ReverseGeocoder for FailingGeocoder {
        async fn reverse(&self, _at: Coordinates) -> std::result::Result<Option<String>, GeoError> {
            Err(GeoError::Network("HTTP status server error (503)".to_string()))
        }
    }

    /// Delivers the position from a detached task, the way a platform
    /// callback would, and records whether anyone was still listening.
    struct CallbackLocation {
        delay: Duration,
        delivered: Arc<AtomicBool>,
    }

    #[async_trait]
    impl LocationProvider for CallbackLocation {
        async fn current_position(&self) -> std::result::Result<Coordinates, GeoError> {
            let (tx, rx) = oneshot::channel();
            let delay = self.delay;
            let delivered = Arc::clone(&self.delivered);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                delivered.store(tx.send(BANGALORE).is_ok(), Ordering::SeqCst);
            });
            rx.await.map_err(|_| GeoError::Unavailable)
        }
    }

    fn build(location: DeviceLocation, geocoder: Arc<dyn ReverseGeocoder>) -> GeoResolver {
        GeoResolver::new(Arc::new(location), geocoder)
    }

    #[test]
    fn test_coordinates_display() {
        assert_eq!(BANGALORE.to_string(), "12.9716, 77.5946");
        assert_eq!(Coordinates::new(-1.5, 0.0).to_string(), "-1.5, 0");
    }

    #[test]
    fn test_status_messages_are_distinct() {
        let errors = [
            GeoError::Unavailable,
            GeoError::Denied,
            GeoError::Network("x".to_string()),
            GeoError::Timeout(Duration::from_secs(10)),
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in &errors[i + 1..] {
                assert_ne!(a.status_message(), b.status_message());
            }
        }
    }

    #[tokio::test]
    async fn test_resolves_display_name() {
        let geocoder = SlowGeocoder::new(Duration::ZERO, Some("MG Road, Bengaluru"));
        let resolver = build(DeviceLocation::Fixed(BANGALORE), geocoder);

        let address = resolver.resolve_address(Duration::from_secs(10)).await;
        assert_eq!(address.unwrap(), "MG Road, Bengaluru");
    }

    #[tokio::test]
    async fn test_missing_display_name_falls_back_to_coordinates() {
        for answer in [None, Some("  ")] {
            let resolver = build(
                DeviceLocation::Fixed(BANGALORE),
                SlowGeocoder::new(Duration::ZERO, answer),
            );
            let address = resolver.resolve_address(Duration::from_secs(10)).await;
            assert_eq!(address.unwrap(), "12.9716, 77.5946");
        }
    }

    #[tokio::test]
    async fn test_unavailable_and_denied_are_distinct() {
        let geocoder = SlowGeocoder::new(Duration::ZERO, Some("unused"));

        let unavailable = build(DeviceLocation::Unavailable, geocoder.clone());
        assert_eq!(
            unavailable.resolve_address(Duration::from_secs(1)).await,
            Err(GeoError::Unavailable)
        );

        let denied = build(DeviceLocation::Denied, geocoder.clone());
        assert_eq!(
            denied.resolve_address(Duration::from_secs(1)).await,
            Err(GeoError::Denied)
        );

        assert_eq!(geocoder.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_network_failure() {
        let resolver = build(DeviceLocation::Fixed(BANGALORE), Arc::new(FailingGeocoder));
        let err = resolver
            .resolve_address(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GeoError::Network(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_geocoder_times_out_and_late_answer_is_ignored() {
        crate::logging::init_test_logging();
        let geocoder = SlowGeocoder::new(Duration::from_secs(12), Some("Too late"));
        let resolver = build(DeviceLocation::Fixed(BANGALORE), geocoder.clone());

        let result = resolver.resolve_address(Duration::from_secs(10)).await;
        assert_eq!(result, Err(GeoError::Timeout(Duration::from_secs(10))));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(geocoder.completed.load(Ordering::SeqCst), 0);
        assert_eq!(result, Err(GeoError::Timeout(Duration::from_secs(10))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_location_callback_finds_no_listener() {
        let delivered = Arc::new(AtomicBool::new(true));
        let location = CallbackLocation {
            delay: Duration::from_secs(12),
            delivered: Arc::clone(&delivered),
        };
        let resolver = GeoResolver::new(
            Arc::new(location),
            SlowGeocoder::new(Duration::ZERO, Some("unused")),
        );

        let result = resolver.resolve_address(Duration::from_secs(10)).await;
        assert!(matches!(result, Err(GeoError::Timeout(_))));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!delivered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_nominatim_rejects_bad_endpoint() {
        let config = GeocoderConfig {
            endpoint: "not a url".to_string(),
            ..GeocoderConfig::default()
        };
        let err = NominatimGeocoder::new(&config).unwrap_err();
        assert!(err.to_string().contains("invalid geocoder endpoint"));
    }
}
