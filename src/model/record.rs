//! Schema-shaped output records.

use serde::{Deserialize, Serialize};

use super::fields::{ExtractedTable, FieldMap};

/// A reconciled record: template-shaped, unmatched slots absent.
pub type Record = FieldMap<MatchedValue>;

/// One slot of a reconciled record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchedValue {
    /// Whole number (`int` fields)
    Integer(i64),
    /// Floating point number
    Number(f64),
    /// Text left as-is or not convertible
    Text(String),
    /// Multi-choice checkbox answer
    Choices(Vec<String>),
    /// Row-major table of cell texts
    Table(ExtractedTable),
    /// Nested section
    Section(Record),
}

impl MatchedValue {
    /// Text content, if this is a text leaf.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MatchedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if this is a number leaf.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MatchedValue::Integer(i) => Some(*i as f64),
            MatchedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Nested section, if this is one.
    pub fn as_section(&self) -> Option<&Record> {
        match self {
            MatchedValue::Section(r) => Some(r),
            _ => None,
        }
    }

    /// Table rows, if this is a table.
    pub fn as_table(&self) -> Option<&ExtractedTable> {
        match self {
            MatchedValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Check for an empty string, list, table or section.
    pub fn is_empty(&self) -> bool {
        match self {
            MatchedValue::Integer(_) | MatchedValue::Number(_) => false,
            MatchedValue::Text(s) => s.is_empty(),
            MatchedValue::Choices(c) => c.is_empty(),
            MatchedValue::Table(t) => t.is_empty(),
            MatchedValue::Section(r) => r.is_empty(),
        }
    }

    /// Count scalar and table leaves beneath this value.
    pub fn leaf_count(&self) -> usize {
        match self {
            MatchedValue::Section(r) => r.iter().map(|(_, v)| v.leaf_count()).sum(),
            _ => 1,
        }
    }
}

impl From<&str> for MatchedValue {
    fn from(s: &str) -> Self {
        MatchedValue::Text(s.to_string())
    }
}

impl From<String> for MatchedValue {
    fn from(s: String) -> Self {
        MatchedValue::Text(s)
    }
}

impl From<f64> for MatchedValue {
    fn from(n: f64) -> Self {
        MatchedValue::Number(n)
    }
}
