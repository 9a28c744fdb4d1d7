//! Donor search.
//!
//! Filtering is stable: results keep the registry's newest-first order.

use crate::donor::DonorRecord;

/// Search criteria for the donor list.
///
/// Blank values impose no constraint; both criteria must hold when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonorQuery {
    /// Case-insensitive substring of the donor name.
    pub text: Option<String>,
    /// Exact blood group label.
    pub blood_group: Option<String>,
}

impl DonorQuery {
    /// A query that matches every donor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the name to contain `text`.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Require an exact blood group.
    #[must_use]
    pub fn with_blood_group(mut self, group: impl Into<String>) -> Self {
        self.blood_group = Some(group.into());
        self
    }

    fn text_needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    fn group_constraint(&self) -> Option<&str> {
        self.blood_group
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    /// True when neither criterion is set.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.text_needle().is_none() && self.group_constraint().is_none()
    }

    /// Check a single record.
    #[must_use]
    pub fn matches(&self, donor: &DonorRecord) -> bool {
        let needle = self.text_needle();
        matches_with(donor, needle.as_deref(), self.group_constraint())
    }
}

fn matches_with(donor: &DonorRecord, needle: Option<&str>, group: Option<&str>) -> bool {
    let text_ok = needle.map_or(true, |n| donor.name.to_lowercase().contains(n));
    let group_ok = group.map_or(true, |g| donor.blood_group.as_str() == g);
    text_ok && group_ok
}

/// Select the donors matching `query`, preserving input order.
#[must_use]
pub fn filter(donors: &[DonorRecord], query: &DonorQuery) -> Vec<DonorRecord> {
    let needle = query.text_needle();
    let group = query.group_constraint();
    donors
        .iter()
        .filter(|d| matches_with(d, needle.as_deref(), group))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::donor::BloodGroup;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn donor(id: &str, name: &str, group: BloodGroup) -> DonorRecord {
        DonorRecord {
            id: id.to_string(),
            name: name.to_string(),
            phone: "9876543210".to_string(),
            blood_group: group,
            city: "Pune".to_string(),
            notes: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn sample() -> Vec<DonorRecord> {
        vec![
            donor("4", "Meera Nair", BloodGroup::OPos),
            donor("3", "Arjun Das", BloodGroup::ANeg),
            donor("2", "Omar Sheikh", BloodGroup::OPos),
            donor("1", "Priya Menon", BloodGroup::BPos),
        ]
    }

    fn ids(donors: &[DonorRecord]) -> Vec<&str> {
        donors.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_empty_query_is_identity() {
        let donors = sample();
        assert!(DonorQuery::new().is_unconstrained());
        assert_eq!(filter(&donors, &DonorQuery::new()), donors);
    }

    #[test]
    fn test_blank_values_impose_nothing() {
        let donors = sample();
        let query = DonorQuery::new().with_text("   ").with_blood_group("");
        assert!(query.is_unconstrained());
        assert_eq!(filter(&donors, &query), donors);
    }

    #[test]
    fn test_text_is_case_insensitive_name_substring() {
        let donors = sample();
        let result = filter(&donors, &DonorQuery::new().with_text("MEN"));
        assert_eq!(ids(&result), vec!["1"]);

        let result = filter(&donors, &DonorQuery::new().with_text("ar"));
        assert_eq!(ids(&result), vec!["3"]);
    }

    #[test]
    fn test_text_does_not_search_city() {
        let donors = sample();
        assert!(filter(&donors, &DonorQuery::new().with_text("pune")).is_empty());
    }

    #[test]
    fn test_blood_group_exact_match_preserves_order() {
        let donors = sample();
        let result = filter(&donors, &DonorQuery::new().with_blood_group("O+"));
        assert_eq!(ids(&result), vec!["4", "2"]);
        assert!(result.iter().all(|d| d.blood_group == BloodGroup::OPos));
    }

    #[test]
    fn test_criteria_are_anded() {
        let donors = sample();
        let query = DonorQuery::new().with_text("omar").with_blood_group("O+");
        assert_eq!(ids(&filter(&donors, &query)), vec!["2"]);

        let query = DonorQuery::new().with_text("omar").with_blood_group("B+");
        assert!(filter(&donors, &query).is_empty());
    }

    #[test]
    fn test_empty_registry() {
        assert!(filter(&[], &DonorQuery::new().with_text("x")).is_empty());
    }

    #[test]
    fn test_unknown_group_matches_nothing() {
        let donors = sample();
        assert!(filter(&donors, &DonorQuery::new().with_blood_group("o+")).is_empty());
    }

    fn arb_group() -> impl Strategy<Value = BloodGroup> {
        proptest::sample::select(BloodGroup::ALL.to_vec())
    }

    fn arb_donors() -> impl Strategy<Value = Vec<DonorRecord>> {
        proptest::collection::vec(("[A-Za-z ]{0,10}", arb_group()), 0..20).prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (name, group))| donor(&i.to_string(), &name, group))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_identity_filter(donors in arb_donors()) {
            prop_assert_eq!(filter(&donors, &DonorQuery::new()), donors);
        }

        #[test]
        fn prop_group_filter_is_ordered_subsequence(donors in arb_donors(), group in arb_group()) {
            let result = filter(&donors, &DonorQuery::new().with_blood_group(group.as_str()));
            prop_assert!(result.iter().all(|d| d.blood_group == group));

            let expected: Vec<DonorRecord> =
                donors.iter().filter(|d| d.blood_group == group).cloned().collect();
            prop_assert_eq!(result, expected);
        }
    }
}
