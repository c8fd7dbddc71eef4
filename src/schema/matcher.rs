//! Fuzzy matching of extracted fields and tables against a template.

use serde::{Deserialize, Serialize};

use crate::model::{ExtractedFields, ExtractedTable, FieldMap, FieldValue, MatchedValue, Record};
use crate::normalize::{convert_value, FieldFailure};

use super::similarity::{similarity_ratio, KeyCleaner};
use super::template::{SchemaNode, SchemaTemplate, ValueKind};

/// Field name that historically needed a looser match on gas statements.
pub const TOTAL_PRODUCER_PAYMENT: &str = "Total Producer Payment";

/// Similarity thresholds for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Minimum (exclusive) ratio for a field name match
    pub field_threshold: f64,

    /// Minimum (exclusive) ratio for a table name match
    pub table_threshold: f64,

    /// Per-field thresholds by exact template field name
    pub threshold_overrides: FieldMap<f64>,
}

impl MatchOptions {
    /// Create match options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field threshold.
    pub fn with_field_threshold(mut self, threshold: f64) -> Self {
        self.field_threshold = threshold;
        self
    }

    /// Set the table threshold.
    pub fn with_table_threshold(mut self, threshold: f64) -> Self {
        self.table_threshold = threshold;
        self
    }

    /// Override the threshold for one template field name.
    pub fn with_threshold_override(mut self, field: impl Into<String>, threshold: f64) -> Self {
        self.threshold_overrides.insert(field, threshold);
        self
    }

    /// Threshold for a scalar slot: template value, then override, then default.
    pub fn field_threshold_for(&self, name: &str, template_min: Option<f64>) -> f64 {
        template_min
            .or_else(|| self.threshold_overrides.get(name).copied())
            .unwrap_or(self.field_threshold)
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        let mut threshold_overrides = FieldMap::new();
        threshold_overrides.insert(TOTAL_PRODUCER_PAYMENT, 0.5);
        Self {
            field_threshold: 0.7,
            table_threshold: 0.8,
            threshold_overrides,
        }
    }
}

/// The best candidate found for a field name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch<'a> {
    /// Extracted key that matched
    pub key: &'a str,
    /// Its value
    pub value: &'a FieldValue,
    /// Similarity of the cleaned names
    pub ratio: f64,
}

/// Result of matching one page against a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Template-shaped record with unmatched slots omitted
    pub record: Record,
    /// Values kept as text because they did not convert
    pub failures: Vec<FieldFailure>,
    /// Dotted paths of slots without a match
    pub unmatched: Vec<String>,
}

struct Candidate<'a> {
    cleaned: String,
    key: &'a str,
    value: &'a FieldValue,
}

struct WalkState<'a> {
    candidates: Vec<Candidate<'a>>,
    tables: &'a [ExtractedTable],
    failures: Vec<FieldFailure>,
    unmatched: Vec<String>,
}

/// Matches extracted content to template slots.
#[derive(Debug, Clone, Default)]
pub struct SchemaMatcher {
    options: MatchOptions,
    cleaner: KeyCleaner,
}

impl SchemaMatcher {
    /// Create a matcher with the given thresholds.
    pub fn new(options: MatchOptions) -> Self {
        Self {
            options,
            cleaner: KeyCleaner::new(),
        }
    }

    /// Thresholds in use.
    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Walk the template and fill every slot that has a match.
    ///
    /// Sections with no matched leaves are omitted; so are unmatched
    /// scalars and table slots. Values that fail to convert keep their text.
    pub fn match_template(
        &self,
        template: &SchemaTemplate,
        fields: &ExtractedFields,
        tables: &[ExtractedTable],
    ) -> MatchOutcome {
        let mut state = WalkState {
            candidates: self.candidates(fields),
            tables,
            failures: Vec::new(),
            unmatched: Vec::new(),
        };

        let record = self.match_section("", template.root(), &mut state);
        log_match_summary(&record);

        MatchOutcome {
            record,
            failures: state.failures,
            unmatched: state.unmatched,
        }
    }

    /// Best-matching extracted field for a template field name.
    pub fn find_matching_value<'a>(
        &self,
        fields: &'a ExtractedFields,
        name: &str,
        threshold: f64,
    ) -> Option<FieldMatch<'a>> {
        self.best_candidate(&self.candidates(fields), name, threshold)
    }

    /// First table whose first cell resembles `name`.
    ///
    /// Tables without rows, or with an empty first row, are skipped.
    pub fn find_matching_table<'a>(
        &self,
        tables: &'a [ExtractedTable],
        name: &str,
        threshold: f64,
    ) -> Option<&'a ExtractedTable> {
        let wanted = name.to_lowercase();

        for table in tables {
            let Some(first_cell) = table.first().and_then(|row| row.first()) else {
                log::debug!("Skipping table without a first cell while looking for '{}'", name);
                continue;
            };
            let ratio = similarity_ratio(&wanted, &first_cell.to_lowercase());
            log::debug!(
                "Comparing table name '{}' with first cell '{}': {:.3}",
                name,
                first_cell,
                ratio
            );
            if ratio > threshold {
                log::debug!("Matched table '{}' ({} rows)", name, table.len());
                return Some(table);
            }
        }

        log::debug!("No table match for '{}'", name);
        None
    }

    fn candidates<'a>(&self, fields: &'a ExtractedFields) -> Vec<Candidate<'a>> {
        fields
            .iter()
            .map(|(key, value)| Candidate {
                cleaned: self.cleaner.clean(key),
                key,
                value,
            })
            .collect()
    }

    fn best_candidate<'a>(
        &self,
        candidates: &[Candidate<'a>],
        name: &str,
        threshold: f64,
    ) -> Option<FieldMatch<'a>> {
        let wanted = self.cleaner.clean(name);
        let mut best: Option<FieldMatch<'a>> = None;

        for candidate in candidates {
            let ratio = similarity_ratio(&wanted, &candidate.cleaned);
            log::debug!(
                "Comparing '{}' with '{}': {:.3}",
                wanted,
                candidate.cleaned,
                ratio
            );
            if ratio > best.as_ref().map_or(0.0, |b| b.ratio) {
                best = Some(FieldMatch {
                    key: candidate.key,
                    value: candidate.value,
                    ratio,
                });
            }
        }

        match best {
            Some(m) if m.ratio > threshold => {
                log::debug!("Matched '{}' to '{}' ({:.3})", name, m.key, m.ratio);
                Some(m)
            }
            other => {
                log::debug!(
                    "No match for '{}' (best ratio {:.3})",
                    name,
                    other.map_or(0.0, |m| m.ratio)
                );
                None
            }
        }
    }

    fn match_section(
        &self,
        prefix: &str,
        section: &FieldMap<SchemaNode>,
        state: &mut WalkState<'_>,
    ) -> Record {
        let mut record = Record::new();

        for (name, node) in section.iter() {
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", prefix, name)
            };

            match node {
                SchemaNode::Section(children) => {
                    let nested = self.match_section(&path, children, state);
                    if !nested.is_empty() {
                        record.insert(name, MatchedValue::Section(nested));
                    }
                }
                SchemaNode::TableSlot {
                    table_name,
                    min_similarity,
                } => {
                    let threshold = min_similarity.unwrap_or(self.options.table_threshold);
                    match self.find_matching_table(state.tables, table_name, threshold) {
                        Some(table) => {
                            record.insert(name, MatchedValue::Table(table.clone()));
                        }
                        None => state.unmatched.push(path),
                    }
                }
                SchemaNode::Scalar {
                    kind,
                    min_similarity,
                } => {
                    let threshold = self.options.field_threshold_for(name, *min_similarity);
                    let value = self
                        .best_candidate(&state.candidates, name, threshold)
                        .map(|m| m.value.clone());
                    match value {
                        Some(value) => {
                            let converted = coerce(&path, value, kind, &mut state.failures);
                            record.insert(name, converted);
                        }
                        None => state.unmatched.push(path),
                    }
                }
            }
        }

        record
    }
}

/// Convert a matched field; on failure keep the text and record why.
fn coerce(
    path: &str,
    value: FieldValue,
    kind: &ValueKind,
    failures: &mut Vec<FieldFailure>,
) -> MatchedValue {
    match value {
        FieldValue::Text(text) => match convert_value(&text, kind) {
            Ok(converted) => converted,
            Err(error) => {
                log::warn!("Field {}: {}", path, error);
                failures.push(FieldFailure {
                    field: path.to_string(),
                    error,
                });
                MatchedValue::Text(text)
            }
        },
        FieldValue::Choices(choices) => MatchedValue::Choices(choices),
    }
}

/// Log one line per top-level slot of a matched record.
pub fn log_match_summary(record: &Record) {
    for (name, value) in record.iter() {
        match value {
            MatchedValue::Section(section) => {
                log::info!("Section {}: {} matched", name, section.len());
                for (key, inner) in section.iter() {
                    match inner {
                        MatchedValue::Table(rows) => {
                            log::info!("  {}: [table with {} rows]", key, rows.len())
                        }
                        other => log::info!("  {}: {:?}", key, other),
                    }
                }
            }
            MatchedValue::Table(rows) => log::info!("{}: [table with {} rows]", name, rows.len()),
            other => log::info!("{}: {:?}", name, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_fields() -> ExtractedFields {
        [
            ("Full Name", FieldValue::from("John Doe")),
            ("User Age", FieldValue::from("30")),
        ]
        .into_iter()
        .collect()
    }

    fn tables() -> Vec<ExtractedTable> {
        vec![
            vec![],
            vec![vec![]],
            vec![
                vec!["Name".to_string(), "Age".to_string()],
                vec!["John".to_string(), "30".to_string()],
            ],
            vec![
                vec!["Employment".to_string(), "Years".to_string()],
                vec!["TechCorp".to_string(), "5".to_string()],
            ],
        ]
    }

    #[test]
    fn test_threshold_decides_match() {
        let matcher = SchemaMatcher::default();
        let fields = person_fields();

        // "name" vs "full name" scores 8/13, below the default threshold
        assert!(matcher.find_matching_value(&fields, "Name", 0.7).is_none());
        let found = matcher.find_matching_value(&fields, "Name", 0.6).unwrap();
        assert_eq!(found.value, &FieldValue::from("John Doe"));
        assert_eq!(found.key, "Full Name");

        let exact = matcher.find_matching_value(&fields, "full name:", 0.7).unwrap();
        assert_eq!(exact.ratio, 1.0);
        assert!(matcher.find_matching_value(&fields, "Address", 0.7).is_none());
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let fields: ExtractedFields = [
            ("Gross Value", FieldValue::from("first")),
            ("gross value", FieldValue::from("second")),
        ]
        .into_iter()
        .collect();

        let found = SchemaMatcher::default()
            .find_matching_value(&fields, "Gross Value", 0.7)
            .unwrap();
        assert_eq!(found.value, &FieldValue::from("first"));
    }

    #[test]
    fn test_find_matching_table_skips_empty() {
        let matcher = SchemaMatcher::default();
        let tables = tables();

        let found = matcher.find_matching_table(&tables, "EMPLOYMENT", 0.8).unwrap();
        assert_eq!(found[1][0], "TechCorp");
        assert!(matcher.find_matching_table(&tables, "NonExistent", 0.8).is_none());
        assert!(matcher.find_matching_table(&[], "Employment", 0.8).is_none());
    }

    #[test]
    fn test_match_template_shape() {
        let template = SchemaTemplate::from_json(
            r#"{
                "Person": {"Full Name": "string", "User Age": "int", "Address": "string"},
                "History": {"Jobs": {"TableName": "Employment"}},
                "Empty": {"Missing": "float"},
                "Payments": {"Missing Table": {"TableName": "Payments"}}
            }"#,
        )
        .unwrap();

        let outcome = SchemaMatcher::default().match_template(&template, &person_fields(), &tables());

        let person = outcome.record.get("Person").and_then(|v| v.as_section()).unwrap();
        assert_eq!(person.get("Full Name"), Some(&MatchedValue::from("John Doe")));
        assert_eq!(person.get("User Age"), Some(&MatchedValue::Integer(30)));
        assert!(person.get("Address").is_none());

        let history = outcome.record.get("History").and_then(|v| v.as_section()).unwrap();
        assert_eq!(history.get("Jobs").and_then(|v| v.as_table()).unwrap().len(), 2);

        assert!(outcome.record.get("Empty").is_none());
        assert!(outcome.record.get("Payments").is_none());
        assert_eq!(
            outcome.unmatched,
            vec![
                "Person.Address".to_string(),
                "Empty.Missing".to_string(),
                "Payments.Missing Table".to_string()
            ]
        );
    }

    #[test]
    fn test_conversion_failure_keeps_text() {
        let template = SchemaTemplate::from_json(r#"{"User Age": "int", "Full Name": "float"}"#).unwrap();
        let outcome = SchemaMatcher::default().match_template(&template, &person_fields(), &[]);

        assert_eq!(outcome.record.get("User Age"), Some(&MatchedValue::Integer(30)));
        assert_eq!(outcome.record.get("Full Name"), Some(&MatchedValue::from("John Doe")));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].field, "Full Name");
    }

    #[test]
    fn test_total_producer_payment_relaxed() {
        let fields: ExtractedFields = [("Total Pay", FieldValue::from("$1,000.00"))]
            .into_iter()
            .collect();
        let template =
            SchemaTemplate::from_json(r#"{"Total Producer Payment": "float_dollar"}"#).unwrap();

        let outcome = SchemaMatcher::default().match_template(&template, &fields, &[]);
        assert_eq!(
            outcome.record.get(TOTAL_PRODUCER_PAYMENT),
            Some(&MatchedValue::Number(1000.0))
        );

        let strict = SchemaMatcher::new(MatchOptions {
            threshold_overrides: FieldMap::new(),
            ..MatchOptions::default()
        });
        assert!(strict
            .match_template(&template, &fields, &[])
            .record
            .is_empty());
    }

    #[test]
    fn test_template_threshold_wins() {
        let options = MatchOptions::new().with_threshold_override("Name", 0.99);
        assert_eq!(options.field_threshold_for("Name", Some(0.5)), 0.5);
        assert_eq!(options.field_threshold_for("Name", None), 0.99);
        assert_eq!(options.field_threshold_for("Other", None), 0.7);

        let template = SchemaTemplate::from_json(
            r#"{"Name": {"ValueType": "string", "MinSimilarity": 0.6}}"#,
        )
        .unwrap();
        let outcome = SchemaMatcher::new(options).match_template(&template, &person_fields(), &[]);
        assert_eq!(outcome.record.get("Name"), Some(&MatchedValue::from("John Doe")));
    }

    #[test]
    fn test_choices_pass_through() {
        let fields: ExtractedFields = [(
            "Gas",
            FieldValue::Choices(vec!["Sold".to_string(), "Flared".to_string()]),
        )]
        .into_iter()
        .collect();
        let template = SchemaTemplate::from_json(r#"{"Gas": "float"}"#).unwrap();

        let outcome = SchemaMatcher::default().match_template(&template, &fields, &[]);
        assert_eq!(
            outcome.record.get("Gas"),
            Some(&MatchedValue::Choices(vec!["Sold".to_string(), "Flared".to_string()]))
        );
        assert!(outcome.failures.is_empty());
    }
}
