//! Field validation for booking and donor forms.
//!
//! Validation is pure: every submission re-checks all fields and returns a
//! fresh [`ValidationReport`]. A field without an entry in the report passed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::booking::BookingForm;
use crate::donor::{BloodGroup, DonorForm};

/// Phone pattern applied after whitespace stripping.
const PHONE_PATTERN: &str = r"^\+?[0-9]{8,15}$";

const MIN_NAME_LEN: usize = 2;
const MIN_PICKUP_LEN: usize = 5;
const MIN_CITY_LEN: usize = 2;

/// A form field that can carry a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    /// Patient name on the booking form.
    PatientName,
    /// Donor name on the registration form.
    Name,
    /// Contact phone (both forms).
    Phone,
    /// Pickup address on the booking form.
    Pickup,
    /// Donor city.
    City,
    /// Donor blood group.
    BloodGroup,
}

impl Field {
    /// The form field id this variant maps to.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::PatientName => "patientName",
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Pickup => "pickup",
            Self::City => "city",
            Self::BloodGroup => "bloodGroup",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Per-field validation messages for a single submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    errors: BTreeMap<Field, String>,
}

impl ValidationReport {
    /// True when no field failed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Same as [`Self::is_ok`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record a message for a field, replacing any earlier one.
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    /// The message recorded for a field, if it failed.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// The message to display next to a field; empty when the field passed.
    #[must_use]
    pub fn message_for(&self, field: Field) -> &str {
        self.get(field).unwrap_or("")
    }

    /// Iterate over failing fields in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(PHONE_PATTERN).expect("phone pattern is valid"))
}

/// Strip all whitespace from a phone number.
///
/// Idempotent: normalizing an already-normalized number returns it unchanged.
#[must_use]
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Check a phone number against the accepted format after normalization.
#[must_use]
pub fn is_valid_phone(phone: &str) -> bool {
    phone_regex().is_match(&normalize_phone(phone))
}

fn has_min_len(value: &str, min: usize) -> bool {
    value.trim().chars().count() >= min
}

/// Validate a booking submission.
#[must_use]
pub fn validate_booking(form: &BookingForm) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !has_min_len(&form.patient_name, MIN_NAME_LEN) {
        report.insert(Field::PatientName, "Enter a valid name.");
    }
    if !is_valid_phone(&form.phone) {
        report.insert(Field::Phone, "Enter valid phone number with country code.");
    }
    if !has_min_len(&form.pickup, MIN_PICKUP_LEN) {
        report.insert(Field::Pickup, "Pickup location is required.");
    }

    report
}

/// Validate a donor registration.
#[must_use]
pub fn validate_donor(form: &DonorForm) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !has_min_len(&form.name, MIN_NAME_LEN) {
        report.insert(Field::Name, "Enter a valid name.");
    }
    if !is_valid_phone(&form.phone) {
        report.insert(Field::Phone, "Enter valid phone number with country code.");
    }
    if form.blood_group.trim().parse::<BloodGroup>().is_err() {
        report.insert(Field::BloodGroup, "Select a blood group.");
    }
    if !has_min_len(&form.city, MIN_CITY_LEN) {
        report.insert(Field::City, "Enter a valid city.");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn booking(name: &str, phone: &str, pickup: &str) -> BookingForm {
        BookingForm {
            patient_name: name.to_string(),
            phone: phone.to_string(),
            pickup: pickup.to_string(),
            ..Default::default()
        }
    }

    fn donor(name: &str, phone: &str, group: &str, city: &str) -> DonorForm {
        DonorForm {
            name: name.to_string(),
            phone: phone.to_string(),
            blood_group: group.to_string(),
            city: city.to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_normalize_phone_strips_whitespace() {
        assert_eq!(normalize_phone(" +91 98765\t43210 "), "+919876543210");
        assert_eq!(normalize_phone("12345678"), "12345678");
    }

    #[test]
    fn test_phone_format() {
        assert!(is_valid_phone("+91 98765 43210"));
        assert!(is_valid_phone("12345678"));
        assert!(is_valid_phone("123456789012345"));
        assert!(!is_valid_phone("1234567"));
        assert!(!is_valid_phone("1234567890123456"));
        assert!(!is_valid_phone("++12345678"));
        assert!(!is_valid_phone("12-34-56-78"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn test_phone_rejects_non_ascii_digits() {
        assert!(!is_valid_phone("١٢٣٤٥٦٧٨٩٠"));
        assert!(!is_valid_phone("+९१९८७६५४३२१०"));
        assert!(!is_valid_phone("１２３４５６７８９"));

        let form = DonorForm {
            name: "Layla".to_string(),
            phone: "١٢٣٤٥٦٧٨٩٠".to_string(),
            blood_group: "O+".to_string(),
            city: "Dubai".to_string(),
            notes: String::new(),
        };
        assert!(validate_donor(&form).get(Field::Phone).is_some());
    }

    #[test]
    fn test_valid_booking() {
        let report = validate_booking(&booking("Jane Doe", "+91 98765 43210", "12 Elm Street"));
        assert!(report.is_ok());
        assert_eq!(report.message_for(Field::PatientName), "");
    }

    #[test]
    fn test_short_patient_name() {
        let report = validate_booking(&booking("A", "+91 98765 43210", "12 Elm Street"));
        assert_eq!(report.len(), 1);
        assert_eq!(report.get(Field::PatientName), Some("Enter a valid name."));
    }

    #[test]
    fn test_name_is_trimmed_before_length_check() {
        let report = validate_booking(&booking("  A  ", "12345678", "12 Elm Street"));
        assert!(report.get(Field::PatientName).is_some());
    }

    #[test]
    fn test_all_booking_fields_fail_together() {
        let report = validate_booking(&booking("", "abc", "Elm"));
        let fields: Vec<Field> = report.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec![Field::PatientName, Field::Phone, Field::Pickup]);
    }

    #[test]
    fn test_valid_donor() {
        let report = validate_donor(&donor("Ravi", "9876543210", "O+", "Pune"));
        assert!(report.is_ok());
    }

    #[test]
    fn test_donor_missing_blood_group() {
        let report = validate_donor(&donor("Ravi", "9876543210", "", "Pune"));
        assert_eq!(report.get(Field::BloodGroup), Some("Select a blood group."));
    }

    #[test]
    fn test_donor_unknown_blood_group() {
        let report = validate_donor(&donor("Ravi", "9876543210", "C+", "Pune"));
        assert!(report.get(Field::BloodGroup).is_some());
    }

    #[test]
    fn test_donor_short_city() {
        let report = validate_donor(&donor("Ravi", "9876543210", "AB-", "X"));
        assert_eq!(report.get(Field::City), Some("Enter a valid city."));
    }

    #[test]
    fn test_report_serializes_with_field_ids() {
        let report = validate_donor(&donor("R", "9876543210", "", "Pune"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "Enter a valid name.");
        assert_eq!(json["bloodGroup"], "Select a blood group.");
    }

    proptest! {
        #[test]
        fn prop_normalize_phone_idempotent(p in "\\PC{0,24}") {
            let once = normalize_phone(&p);
            prop_assert_eq!(normalize_phone(&once), once);
        }

        #[test]
        fn prop_validate_booking_idempotent(
            name in "\\PC{0,8}",
            phone in "[+ 0-9]{0,20}",
            pickup in "\\PC{0,12}",
        ) {
            let form = booking(&name, &phone, &pickup);
            prop_assert_eq!(validate_booking(&form), validate_booking(&form));
        }

        #[test]
        fn prop_validate_donor_idempotent(
            name in "\\PC{0,8}",
            phone in "[+ 0-9]{0,20}",
            group in "(A|B|AB|O|C)?[+-]?",
            city in "\\PC{0,6}",
        ) {
            let form = donor(&name, &phone, &group, &city);
            prop_assert_eq!(validate_donor(&form), validate_donor(&form));
        }
    }
}
