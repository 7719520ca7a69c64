//! Substring filter over identifier and display name.
//!
//! # Invariants
//! - Matching is case-insensitive substring containment, never exact match.
//! - Blank filter text is treated as "no filter" for that field.
//! - When both fields are set, a record must match both (logical AND).

use crate::model::record::Record;

/// Normalized search filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    identifier: Option<String>,
    name: Option<String>,
}

impl RecordFilter {
    /// Builds a filter from raw form input.
    pub fn new(identifier: Option<&str>, name: Option<&str>) -> Self {
        Self {
            identifier: identifier.and_then(normalize_term),
            name: name.and_then(normalize_term),
        }
    }

    /// Filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_identifier(identifier: &str) -> Self {
        Self::new(Some(identifier), None)
    }

    /// True when neither field restricts the result.
    pub fn is_unrestricted(&self) -> bool {
        self.identifier.is_none() && self.name.is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        contains_term(&record.identifier, self.identifier.as_deref())
            && contains_term(&record.display_name, self.name.as_deref())
    }
}

fn normalize_term(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn contains_term(haystack: &str, term: Option<&str>) -> bool {
    match term {
        Some(term) => haystack.to_lowercase().contains(term),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::RecordFilter;
    use crate::model::record::Record;

    fn record(identifier: &str, name: &str) -> Record {
        Record::new(identifier, name).expect("valid record")
    }

    #[test]
    fn identifier_filter_is_case_insensitive_substring() {
        let filter = RecordFilter::by_identifier("a1");
        assert!(filter.matches(&record("A123", "Ana")));
        assert!(filter.matches(&record("a145", "Luis")));
        assert!(!filter.matches(&record("B200", "Ana")));
    }

    #[test]
    fn both_filters_combine_with_and() {
        let filter = RecordFilter::new(Some("a1"), Some("PEREZ"));
        assert!(filter.matches(&record("A123", "Juan Perez")));
        assert!(!filter.matches(&record("A145", "Maria Lopez")));
        assert!(!filter.matches(&record("B200", "Juan Perez")));
    }

    #[test]
    fn blank_terms_do_not_restrict() {
        let filter = RecordFilter::new(Some("   "), Some(""));
        assert!(filter.is_unrestricted());
        assert!(filter.matches(&record("Z9", "")));
        assert_eq!(filter, RecordFilter::all());
    }
}
