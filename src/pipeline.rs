//! The per-page reconciliation pipeline.
//!
//! Each page runs the same four stages:
//!
//! 1. index the block graph into key/value pairs and tables;
//! 2. collapse checkbox clusters under anchor words;
//! 3. match the result against the template, converting declared types;
//! 4. repair OCR damage by field name.
//!
//! Pages share nothing but the template and options, so multi-page runs
//! fan out with rayon and are combined afterwards.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combine::combine_pages;
use crate::error::Result;
use crate::model::{BlockGraph, ExtractedFields, ExtractedTable, FieldMap, MatchedValue, Record};
use crate::normalize::{FieldFailure, RecordFinisher};
use crate::parser::{parse_response, structural_gaps, CheckboxGroup, CheckboxResolver, GroupingOptions};
use crate::render::{Issue, ReconcileResult, ReconcileStats};
use crate::schema::{MatchOptions, SchemaMatcher, SchemaNode, SchemaTemplate};

/// Options for a reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Checkbox grouping
    pub grouping: GroupingOptions,

    /// Similarity thresholds
    pub matching: MatchOptions,

    /// Run the name-driven repair stage
    pub finish: bool,

    /// Process pages in parallel
    pub parallel: bool,
}

impl ReconcileOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON layout profile; missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON layout profile.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Set checkbox grouping options.
    pub fn with_grouping(mut self, grouping: GroupingOptions) -> Self {
        self.grouping = grouping;
        self
    }

    /// Set match thresholds.
    pub fn with_matching(mut self, matching: MatchOptions) -> Self {
        self.matching = matching;
        self
    }

    /// Enable or disable the repair stage.
    pub fn with_finish(mut self, finish: bool) -> Self {
        self.finish = finish;
        self
    }

    /// Enable or disable parallel page processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            grouping: GroupingOptions::default(),
            matching: MatchOptions::default(),
            finish: true,
            parallel: true,
        }
    }
}

/// What one page yields before matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageExtraction {
    /// Key/value pairs with checkbox groups folded in
    pub fields: ExtractedFields,

    /// Tables in document order
    pub tables: Vec<ExtractedTable>,

    /// Checkbox groups found
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<CheckboxGroup>,

    /// Structural problems in the block graph
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<String>,
}

/// Runs the pipeline against one template.
#[derive(Debug, Clone)]
pub struct Reconciler {
    template: SchemaTemplate,
    options: ReconcileOptions,
    resolver: CheckboxResolver,
    matcher: SchemaMatcher,
    finisher: RecordFinisher,
}

impl Reconciler {
    /// Create a reconciler for a template.
    pub fn new(template: SchemaTemplate, options: ReconcileOptions) -> Self {
        Self {
            resolver: CheckboxResolver::new(options.grouping.clone()),
            matcher: SchemaMatcher::new(options.matching.clone()),
            finisher: RecordFinisher::new(),
            template,
            options,
        }
    }

    /// Template in use.
    pub fn template(&self) -> &SchemaTemplate {
        &self.template
    }

    /// Options in use.
    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Index a page and fold its checkbox groups into the fields.
    pub fn extract_page(&self, graph: &BlockGraph) -> PageExtraction {
        let (fields, tables) = parse_response(graph);

        let groups = if self.options.grouping.is_enabled() {
            self.resolver.resolve_groups(graph)
        } else {
            Vec::new()
        };
        let fields = self.resolver.apply(fields, &groups);

        let gaps = structural_gaps(graph);
        for gap in &gaps {
            log::debug!("Structural gap: {}", gap);
        }

        PageExtraction {
            fields,
            tables,
            groups,
            gaps,
        }
    }

    /// Reconcile a single page.
    ///
    /// `page` is the 1-based page number used in issue reports.
    pub fn reconcile_page(&self, page: usize, graph: &BlockGraph) -> ReconcileResult {
        let extraction = self.extract_page(graph);

        let mut stats = ReconcileStats {
            page_count: 1,
            field_count: extraction.fields.len() as u32,
            table_count: extraction.tables.len() as u32,
            checkbox_group_count: extraction.groups.len() as u32,
            ..ReconcileStats::default()
        };

        let mut issues: Vec<Issue> = extraction
            .gaps
            .into_iter()
            .map(|detail| Issue::structural_gap(page, detail))
            .collect();

        let outcome = self
            .matcher
            .match_template(&self.template, &extraction.fields, &extraction.tables);

        let record = if self.options.finish {
            let (record, repairs) = self.finisher.finish(outcome.record);
            // A failed conversion the finisher repaired is no longer a failure
            let failures: Vec<FieldFailure> = outcome
                .failures
                .into_iter()
                .filter(|f| !is_numeric(value_at(&record, &f.field)))
                .collect();
            let repairs: Vec<FieldFailure> = repairs
                .into_iter()
                .filter(|r| !failures.iter().any(|f| f.field == r.field))
                .collect();
            issues.extend(failures.into_iter().chain(repairs).map(Issue::from));
            record
        } else {
            issues.extend(outcome.failures.into_iter().map(Issue::from));
            outcome.record
        };

        issues.extend(outcome.unmatched.into_iter().map(Issue::no_match));

        stats.matched_count = record.iter().map(|(_, v)| v.leaf_count() as u32).sum();
        stats.unmatched_count = count_no_match(&issues);
        stats.conversion_failure_count = count_conversion_failures(&issues);

        log::info!(
            "Page {}: {} fields, {} tables, {} matched, {} unmatched",
            page,
            stats.field_count,
            stats.table_count,
            stats.matched_count,
            stats.unmatched_count
        );

        ReconcileResult::new(record, stats, issues)
    }

    /// Reconcile every page and combine the records in page order.
    ///
    /// A slot is reported unmatched only when no page filled it.
    pub fn reconcile_pages(&self, graphs: &[BlockGraph]) -> ReconcileResult {
        let pages: Vec<ReconcileResult> = if self.options.parallel && graphs.len() > 1 {
            graphs
                .par_iter()
                .enumerate()
                .map(|(i, graph)| self.reconcile_page(i + 1, graph))
                .collect()
        } else {
            graphs
                .iter()
                .enumerate()
                .map(|(i, graph)| self.reconcile_page(i + 1, graph))
                .collect()
        };

        let mut stats = ReconcileStats::new();
        let mut issues = Vec::new();
        let mut records = Vec::with_capacity(pages.len());

        for page in pages {
            stats.merge(&page.stats);
            issues.extend(
                page.issues
                    .into_iter()
                    .filter(|issue| !matches!(issue, Issue::NoMatch { .. })),
            );
            records.push(page.record);
        }

        let record = combine_pages(records);

        let mut missing = Vec::new();
        missing_slots("", self.template.root(), &record, &mut missing);
        issues.extend(missing.into_iter().map(Issue::no_match));

        stats.matched_count = record.iter().map(|(_, v)| v.leaf_count() as u32).sum();
        stats.unmatched_count = count_no_match(&issues);
        stats.conversion_failure_count = count_conversion_failures(&issues);

        log::info!(
            "Combined {} pages: {} matched, {} unmatched, {} conversion failures",
            stats.page_count,
            stats.matched_count,
            stats.unmatched_count,
            stats.conversion_failure_count
        );

        ReconcileResult::new(record, stats, issues)
    }
}

/// Collect dotted paths of template slots absent from a record.
fn missing_slots(prefix: &str, section: &FieldMap<SchemaNode>, record: &Record, out: &mut Vec<String>) {
    for (name, node) in section.iter() {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };

        match node {
            SchemaNode::Section(children) => {
                let empty = Record::new();
                let nested = record
                    .get(name)
                    .and_then(|v| v.as_section())
                    .unwrap_or(&empty);
                missing_slots(&path, children, nested, out);
            }
            _ => {
                if !record.contains_key(name) {
                    out.push(path);
                }
            }
        }
    }
}

/// Look up a leaf by dotted path. Keys may themselves contain dots.
fn value_at<'a>(record: &'a Record, path: &str) -> Option<&'a MatchedValue> {
    record.iter().find_map(|(name, value)| {
        if path == name {
            return Some(value);
        }
        let rest = path.strip_prefix(name)?.strip_prefix('.')?;
        value_at(value.as_section()?, rest)
    })
}

fn is_numeric(value: Option<&MatchedValue>) -> bool {
    matches!(value, Some(MatchedValue::Number(_) | MatchedValue::Integer(_)))
}

fn count_no_match(issues: &[Issue]) -> u32 {
    issues
        .iter()
        .filter(|i| matches!(i, Issue::NoMatch { .. }))
        .count() as u32
}

fn count_conversion_failures(issues: &[Issue]) -> u32 {
    issues
        .iter()
        .filter(|i| matches!(i, Issue::ConversionFailure { .. }))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, BoundingBox, MatchedValue};

    fn page(operator: &str, amount: &str) -> BlockGraph {
        vec![
            Block::key("k1").with_children(["w1"]).with_value("v1"),
            Block::word("w1", "Operator:"),
            Block::value("v1").with_children(["w2"]),
            Block::word("w2", operator),
            Block::key("k2").with_children(["w3", "w4"]).with_value("v2"),
            Block::word("w3", "Net"),
            Block::word("w4", "Amount"),
            Block::value("v2").with_children(["w5"]),
            Block::word("w5", amount),
        ]
        .into_iter()
        .collect()
    }

    fn template() -> SchemaTemplate {
        SchemaTemplate::from_json(
            r#"{"Statement": {"Operator": "string", "Net Amount": "string", "Owner": "string"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_options_profile() {
        let options = ReconcileOptions::from_json(
            r#"{"grouping": {"anchor_words": ["Gas"]}, "parallel": false}"#,
        )
        .unwrap();

        assert_eq!(options.grouping.anchor_words, vec!["Gas".to_string()]);
        assert_eq!(options.grouping.window.lines_below, 5.0);
        assert!(!options.parallel);
        assert!(options.finish);
        assert_eq!(options.matching.field_threshold, 0.7);
    }

    #[test]
    fn test_reconcile_page() {
        let reconciler = Reconciler::new(template(), ReconcileOptions::default());
        let result = reconciler.reconcile_page(1, &page("Acme", "$1,2O0.50"));

        let statement = result.record.get("Statement").and_then(|v| v.as_section()).unwrap();
        assert_eq!(statement.get("Operator"), Some(&MatchedValue::from("Acme")));
        assert_eq!(statement.get("Net Amount"), Some(&MatchedValue::Number(1200.5)));
        assert_eq!(result.unmatched_slots().collect::<Vec<_>>(), vec!["Statement.Owner"]);
        assert_eq!(result.stats.matched_count, 2);
        assert_eq!(result.stats.field_count, 2);
    }

    #[test]
    fn test_finish_disabled() {
        let options = ReconcileOptions::new().with_finish(false);
        let result = Reconciler::new(template(), options).reconcile_page(1, &page("Acme", "$1,2O0.50"));

        let statement = result.record.get("Statement").and_then(|v| v.as_section()).unwrap();
        assert_eq!(statement.get("Net Amount"), Some(&MatchedValue::from("$1,2O0.50")));
    }

    fn float_template() -> SchemaTemplate {
        SchemaTemplate::from_json(r#"{"Statement": {"Operator": "string", "Net Amount": "float"}}"#)
            .unwrap()
    }

    #[test]
    fn test_repaired_conversion_not_reported() {
        let reconciler = Reconciler::new(float_template(), ReconcileOptions::default());
        let result = reconciler.reconcile_page(1, &page("Acme", "$1,2O0.50"));

        let statement = result.record.get("Statement").and_then(|v| v.as_section()).unwrap();
        assert_eq!(statement.get("Net Amount"), Some(&MatchedValue::Number(1200.5)));
        assert_eq!(result.stats.conversion_failure_count, 0);
        assert!(!result.has_issues());
    }

    #[test]
    fn test_unrepaired_conversion_reported_once() {
        let reconciler = Reconciler::new(float_template(), ReconcileOptions::default());
        let result = reconciler.reconcile_page(1, &page("Acme", "pending"));

        assert_eq!(result.stats.conversion_failure_count, 1);
        assert!(matches!(
            &result.issues[0],
            Issue::ConversionFailure { field, value, target, .. }
                if field == "Statement.Net Amount" && value == "pending" && target == "float"
        ));

        let raw = Reconciler::new(float_template(), ReconcileOptions::new().with_finish(false))
            .reconcile_page(1, &page("Acme", "$1,2O0.50"));
        assert_eq!(raw.stats.conversion_failure_count, 1);
    }

    #[test]
    fn test_value_at_dotted_keys() {
        let record: Record =
            serde_json::from_str(r#"{"A": {"B.C": 1.5, "D": "x"}, "E.F": 2}"#).unwrap();
        assert_eq!(value_at(&record, "A.B.C"), Some(&MatchedValue::Number(1.5)));
        assert_eq!(value_at(&record, "E.F"), Some(&MatchedValue::Integer(2)));
        assert_eq!(value_at(&record, "A.D"), Some(&MatchedValue::from("x")));
        assert_eq!(value_at(&record, "A.Z"), None);
    }

    #[test]
    fn test_reconcile_pages_combines() {
        let reconciler = Reconciler::new(template(), ReconcileOptions::default());
        let result = reconciler.reconcile_pages(&[page("Acme", "10"), page("Acme Gas", "")]);

        let statement = result.record.get("Statement").and_then(|v| v.as_section()).unwrap();
        assert_eq!(statement.get("Operator"), Some(&MatchedValue::from("Acme Gas")));
        assert_eq!(statement.get("Net Amount"), Some(&MatchedValue::Number(10.0)));
        assert_eq!(result.stats.page_count, 2);
        assert_eq!(result.unmatched_slots().collect::<Vec<_>>(), vec!["Statement.Owner"]);
    }

    #[test]
    fn test_extract_page_groups() {
        let graph: BlockGraph = vec![
            Block::line("l1", "Gas Disposition").with_box(BoundingBox::new(0.10, 0.10, 0.3, 0.02)),
            Block::key("k1").with_children(["w1"]).with_value("v1"),
            Block::word("w1", "Sold"),
            Block::value("v1")
                .with_children(["s1"])
                .with_box(BoundingBox::new(0.12, 0.12, 0.02, 0.02)),
            Block::selection("s1", true),
            Block::key("k2").with_children(["w2"]).with_value("v2"),
            Block::word("w2", "Flared"),
            Block::value("v2")
                .with_children(["s2"])
                .with_box(BoundingBox::new(0.14, 0.12, 0.02, 0.02)),
            Block::selection("s2", false),
        ]
        .into_iter()
        .collect();

        let reconciler = Reconciler::new(SchemaTemplate::default(), ReconcileOptions::default());
        let extraction = reconciler.extract_page(&graph);

        assert_eq!(extraction.groups.len(), 1);
        assert_eq!(extraction.fields.len(), 1);
        assert_eq!(extraction.fields.get("Gas").and_then(|v| v.as_text()), Some("Sold"));
    }
}
