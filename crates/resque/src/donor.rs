//! Donor record types.
//!
//! This module defines the records stored in the donor registry, the raw
//! registration form they are built from, and the id generators used to
//! name new records.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::{normalize_phone, validate_donor, ValidationReport};

/// ABO/Rh blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodGroup {
    /// A positive.
    #[serde(rename = "A+")]
    APos,
    /// A negative.
    #[serde(rename = "A-")]
    ANeg,
    /// B positive.
    #[serde(rename = "B+")]
    BPos,
    /// B negative.
    #[serde(rename = "B-")]
    BNeg,
    /// AB positive.
    #[serde(rename = "AB+")]
    AbPos,
    /// AB negative.
    #[serde(rename = "AB-")]
    AbNeg,
    /// O positive.
    #[serde(rename = "O+")]
    OPos,
    /// O negative.
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodGroup {
    /// All groups in display order.
    pub const ALL: [Self; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    /// The label used in forms and persisted JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned when a string is not one of the eight blood group labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown blood group: '{0}'")]
pub struct ParseBloodGroupError(String);

impl FromStr for BloodGroup {
    type Err = ParseBloodGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ParseBloodGroupError(s.to_string()))
    }
}

/// Raw donor registration input as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonorForm {
    /// Donor name.
    pub name: String,
    /// Contact phone, possibly with spaces.
    pub phone: String,
    /// Selected blood group label; empty when unset.
    pub blood_group: String,
    /// City of residence.
    pub city: String,
    /// Free-form notes.
    pub notes: String,
}

/// A registered blood donor.
///
/// Records are immutable once appended to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorRecord {
    /// Opaque id, unique within the registry.
    pub id: String,
    /// Donor name.
    pub name: String,
    /// Phone with whitespace stripped.
    pub phone: String,
    /// Blood group.
    pub blood_group: BloodGroup,
    /// City of residence.
    pub city: String,
    /// Free-form notes; may be empty.
    #[serde(default)]
    pub notes: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl DonorRecord {
    /// Build a record from a registration form.
    ///
    /// # Errors
    ///
    /// Returns the validation report when any field is invalid.
    pub fn from_form(
        id: String,
        form: &DonorForm,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationReport> {
        let report = validate_donor(form);
        // an unparseable group always leaves an entry in the report
        let blood_group = match form.blood_group.trim().parse::<BloodGroup>() {
            Ok(group) if report.is_ok() => group,
            _ => return Err(report),
        };

        Ok(Self {
            id,
            name: form.name.trim().to_string(),
            phone: normalize_phone(&form.phone),
            blood_group,
            city: form.city.trim().to_string(),
            notes: form.notes.trim().to_string(),
            created_at,
        })
    }
}

/// Source of fresh donor ids.
pub trait IdGenerator: Send + Sync {
    /// Produce the next id.
    fn next_id(&self) -> String;
}

/// Random UUID v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids, mostly useful in tests.
#[derive(Debug)]
pub struct SequenceIds {
    prefix: String,
    next: AtomicU64,
}

impl SequenceIds {
    /// Start a sequence at 1.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}", self.prefix)
    }
}
