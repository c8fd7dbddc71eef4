//! # unform
//!
//! Reconciles OCR form output with a target schema.
//!
//! An OCR service turns a scanned page into a graph of blocks: words,
//! lines, checkboxes, key/value sets, tables and cells, linked by id. This
//! library walks that graph into plain key/value pairs and tables, collapses
//! checkbox clusters into single answers, fuzzy-matches everything against
//! a nested JSON template, and repairs typical OCR damage in the values.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unform::{reconcile_file, render, SchemaTemplate};
//!
//! fn main() -> unform::Result<()> {
//!     let template = SchemaTemplate::load("template.json")?;
//!     let result = reconcile_file("page1.json", &template)?;
//!
//!     let json = render::to_json(&result.record, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Textract-style input**: `{"Blocks": [...]}` JSON, unknown block types ignored
//! - **Checkbox grouping**: anchor words with a configurable search window
//! - **Fuzzy matching**: Ratcliff/Obershelp similarity with per-slot thresholds
//! - **Value repair**: currency, percentages, OCR digit confusion, dates
//! - **Parallel processing**: Uses Rayon for multi-page documents
//! - **Best effort**: problems are reported as issues, never as errors

pub mod combine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod schema;

// Re-export commonly used types
pub use combine::{combine_pages, merge_into};
pub use error::{Error, Result};
pub use model::{
    Block, BlockGraph, BlockType, BoundingBox, ExtractedFields, ExtractedTable, FieldMap,
    FieldValue, MatchedValue, Record,
};
pub use normalize::{convert_value, finish_record, normalize_date, normalize_numeric};
pub use parser::{parse_key_values, parse_response, parse_tables, AnchorWindow, GroupingOptions};
pub use pipeline::{PageExtraction, ReconcileOptions, Reconciler};
pub use render::{Issue, JsonFormat, ReconcileResult, ReconcileStats};
pub use schema::{similarity_ratio, MatchOptions, SchemaMatcher, SchemaTemplate, ValueKind};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reconcile one page of block JSON against a template.
///
/// # Example
///
/// ```
/// use unform::{reconcile_str, SchemaTemplate};
///
/// let template = SchemaTemplate::from_json(r#"{"Total": "float"}"#).unwrap();
/// let result = reconcile_str(r#"{"Blocks": []}"#, &template).unwrap();
/// assert!(result.record.is_empty());
/// ```
pub fn reconcile_str(json: &str, template: &SchemaTemplate) -> Result<ReconcileResult> {
    let graph = BlockGraph::from_json(json)?;
    let reconciler = Reconciler::new(template.clone(), ReconcileOptions::default());
    Ok(reconciler.reconcile_page(1, &graph))
}

/// Reconcile one page of block JSON read from a file.
///
/// # Example
///
/// ```no_run
/// use unform::{reconcile_file, SchemaTemplate};
///
/// let result = reconcile_file("page1.json", &SchemaTemplate::default()).unwrap();
/// println!("{} issues", result.issues.len());
/// ```
pub fn reconcile_file<P: AsRef<Path>>(path: P, template: &SchemaTemplate) -> Result<ReconcileResult> {
    let graph = read_graph(path)?;
    let reconciler = Reconciler::new(template.clone(), ReconcileOptions::default());
    Ok(reconciler.reconcile_page(1, &graph))
}

/// Extract key/value pairs and tables from block JSON without matching.
pub fn parse_response_str(json: &str) -> Result<(ExtractedFields, Vec<ExtractedTable>)> {
    let graph = BlockGraph::from_json(json)?;
    Ok(parse_response(&graph))
}

/// Read a block graph from a JSON file.
pub fn read_graph<P: AsRef<Path>>(path: P) -> Result<BlockGraph> {
    let file = File::open(path.as_ref())?;
    log::debug!("Reading block graph from {}", path.as_ref().display());
    BlockGraph::from_reader(BufReader::new(file))
}

/// Builder for reconciling documents.
///
/// # Example
///
/// ```no_run
/// use unform::Unform;
///
/// let result = Unform::new()
///     .with_template_file("template.json")?
///     .with_anchor_words(["Gas", "Residue"])
///     .sequential()
///     .reconcile_files(["page1.json", "page2.json"])?;
/// # Ok::<(), unform::Error>(())
/// ```
pub struct Unform {
    template: SchemaTemplate,
    options: ReconcileOptions,
}

impl Unform {
    /// Create a new builder with the default template and options.
    pub fn new() -> Self {
        Self {
            template: SchemaTemplate::default(),
            options: ReconcileOptions::default(),
        }
    }

    /// Use a template.
    pub fn with_template(mut self, template: SchemaTemplate) -> Self {
        self.template = template;
        self
    }

    /// Load the template from a file.
    pub fn with_template_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.template = SchemaTemplate::load(path)?;
        Ok(self)
    }

    /// Replace all options.
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the checkbox anchor words.
    pub fn with_anchor_words<S: Into<String>>(mut self, words: impl IntoIterator<Item = S>) -> Self {
        self.options.grouping = self.options.grouping.with_anchor_words(words);
        self
    }

    /// Turn checkbox grouping off.
    pub fn without_grouping(mut self) -> Self {
        self.options.grouping = GroupingOptions::disabled();
        self
    }

    /// Set the default field threshold.
    pub fn with_field_threshold(mut self, threshold: f64) -> Self {
        self.options.matching = self.options.matching.with_field_threshold(threshold);
        self
    }

    /// Skip the name-driven repair stage.
    pub fn raw(mut self) -> Self {
        self.options.finish = false;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options.parallel = false;
        self
    }

    /// Build the reconciler.
    pub fn build(self) -> Reconciler {
        Reconciler::new(self.template, self.options)
    }

    /// Reconcile one page of block JSON.
    pub fn reconcile_str(self, json: &str) -> Result<ReconcileResult> {
        let graph = BlockGraph::from_json(json)?;
        Ok(self.build().reconcile_page(1, &graph))
    }

    /// Reconcile page files in order and combine them.
    pub fn reconcile_files<I, P>(self, paths: I) -> Result<ReconcileResult>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let graphs = paths
            .into_iter()
            .map(read_graph)
            .collect::<Result<Vec<_>>>()?;
        Ok(self.build().reconcile_pages(&graphs))
    }
}

impl Default for Unform {
    fn default() -> Self {
        Self::new()
    }
}
