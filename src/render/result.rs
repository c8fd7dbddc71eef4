//! Reconciliation result with statistics and recorded issues.

use serde::{Deserialize, Serialize};

use crate::model::Record;
use crate::normalize::FieldFailure;

/// Something that went wrong without stopping the run.
///
/// Nothing in the pipeline raises on bad input; problems are collected here
/// and the best-effort record is still produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// The block graph was missing a referenced block or index
    StructuralGap {
        /// Page the gap was found on (1-based)
        page: usize,
        /// What was missing
        detail: String,
    },

    /// A matched value kept its text because it did not convert
    ConversionFailure {
        /// Dotted path of the field
        field: String,
        /// Original text
        value: String,
        /// Declared type tag
        target: String,
        /// Why parsing failed
        reason: String,
    },

    /// A template slot found no match on any page
    NoMatch {
        /// Dotted path of the slot
        slot: String,
    },
}

impl Issue {
    /// Create a structural gap issue.
    pub fn structural_gap(page: usize, detail: impl Into<String>) -> Self {
        Issue::StructuralGap {
            page,
            detail: detail.into(),
        }
    }

    /// Create a no-match issue.
    pub fn no_match(slot: impl Into<String>) -> Self {
        Issue::NoMatch { slot: slot.into() }
    }
}

impl From<FieldFailure> for Issue {
    fn from(failure: FieldFailure) -> Self {
        Issue::ConversionFailure {
            field: failure.field,
            value: failure.error.value,
            target: failure.error.kind.tag().to_string(),
            reason: failure.error.reason,
        }
    }
}

/// Result of reconciling one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileResult {
    /// The combined, normalized record
    pub record: Record,

    /// Counters collected along the way
    pub stats: ReconcileStats,

    /// Problems that did not stop the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl ReconcileResult {
    /// Create a new result.
    pub fn new(record: Record, stats: ReconcileStats, issues: Vec<Issue>) -> Self {
        Self {
            record,
            stats,
            issues,
        }
    }

    /// Check if any issues were recorded.
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues of the no-match kind.
    pub fn unmatched_slots(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|issue| match issue {
            Issue::NoMatch { slot } => Some(slot.as_str()),
            _ => None,
        })
    }
}

/// Statistics collected during reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    /// Pages processed
    pub page_count: u32,

    /// Key/value pairs extracted, after checkbox grouping
    pub field_count: u32,

    /// Tables extracted
    pub table_count: u32,

    /// Checkbox groups resolved
    pub checkbox_group_count: u32,

    /// Leaves in the final record
    pub matched_count: u32,

    /// Template slots without a match
    pub unmatched_count: u32,

    /// Values kept as text after a failed conversion
    pub conversion_failure_count: u32,
}

impl ReconcileStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another page's counters into this one.
    ///
    /// Only the extraction counters add up; the outcome counters describe
    /// the combined record and are set once at the end.
    pub fn merge(&mut self, other: &ReconcileStats) {
        self.page_count += other.page_count;
        self.field_count += other.field_count;
        self.table_count += other.table_count;
        self.checkbox_group_count += other.checkbox_group_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::ConversionError;
    use crate::schema::ValueKind;

    #[test]
    fn test_issue_from_failure() {
        let failure = FieldFailure {
            field: "Person.Age".to_string(),
            error: ConversionError {
                value: "thirty".to_string(),
                kind: ValueKind::Int,
                reason: "invalid float literal".to_string(),
            },
        };

        match Issue::from(failure) {
            Issue::ConversionFailure { field, value, target, .. } => {
                assert_eq!(field, "Person.Age");
                assert_eq!(value, "thirty");
                assert_eq!(target, "int");
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }

    #[test]
    fn test_issue_serialization() {
        let json = serde_json::to_string(&Issue::no_match("Fees.Tax")).unwrap();
        assert_eq!(json, r#"{"kind":"no_match","slot":"Fees.Tax"}"#);

        let gap: Issue =
            serde_json::from_str(r#"{"kind":"structural_gap","page":2,"detail":"x"}"#).unwrap();
        assert_eq!(gap, Issue::structural_gap(2, "x"));
    }

    #[test]
    fn test_stats_merge() {
        let mut stats = ReconcileStats::new();
        stats.matched_count = 3;
        stats.merge(&ReconcileStats {
            page_count: 1,
            field_count: 4,
            table_count: 2,
            checkbox_group_count: 1,
            matched_count: 9,
            unmatched_count: 9,
            conversion_failure_count: 9,
        });

        assert_eq!(stats.page_count, 1);
        assert_eq!(stats.field_count, 4);
        assert_eq!(stats.table_count, 2);
        assert_eq!(stats.matched_count, 3);
    }

    #[test]
    fn test_result_unmatched_slots() {
        let result = ReconcileResult::new(
            Record::new(),
            ReconcileStats::default(),
            vec![Issue::no_match("A"), Issue::structural_gap(1, "gap"), Issue::no_match("B.C")],
        );
        assert!(result.has_issues());
        assert_eq!(result.unmatched_slots().collect::<Vec<_>>(), vec!["A", "B.C"]);
    }
}
