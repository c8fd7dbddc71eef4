//! Target schema templates.
//!
//! A template is a JSON object. Each entry is one of:
//!
//! - a type tag string (`"float_dollar"`): a scalar field;
//! - an object with a `TableName` key: a table slot;
//! - an object with a `ValueType` key: a scalar field with options;
//! - any other object: a nested section.
//!
//! Table slots and scalars with options may carry `MinSimilarity` to
//! override the matcher's default threshold for that slot.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::FieldMap;

/// Reserved key marking a table slot.
pub const TABLE_NAME_KEY: &str = "TableName";
/// Reserved key marking a scalar with options.
pub const VALUE_TYPE_KEY: &str = "ValueType";
/// Per-slot similarity threshold key.
pub const MIN_SIMILARITY_KEY: &str = "MinSimilarity";

/// Declared type of a scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// Currency amount; everything but digits, `.` and `-` is dropped
    FloatDollar,
    /// Plain number with optional thousands separators
    Float,
    /// Whole number, truncated
    Int,
    /// Percentage, stored as a fraction
    FloatPercentage,
    /// Date, kept as text until the record is finished
    Date,
    /// Any other tag; the value passes through
    Other(String),
}

impl ValueKind {
    /// Parse a type tag. Unknown tags are kept verbatim.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "float_dollar" => ValueKind::FloatDollar,
            "float" => ValueKind::Float,
            "int" => ValueKind::Int,
            "float_percentage" => ValueKind::FloatPercentage,
            "date" => ValueKind::Date,
            other => ValueKind::Other(other.to_string()),
        }
    }

    /// The type tag as written in templates.
    pub fn tag(&self) -> &str {
        match self {
            ValueKind::FloatDollar => "float_dollar",
            ValueKind::Float => "float",
            ValueKind::Int => "int",
            ValueKind::FloatPercentage => "float_percentage",
            ValueKind::Date => "date",
            ValueKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One node of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Nested mapping of named nodes
    Section(FieldMap<SchemaNode>),
    /// A table located by the text of its first cell
    TableSlot {
        table_name: String,
        min_similarity: Option<f64>,
    },
    /// A typed field located by fuzzy key match
    Scalar {
        kind: ValueKind,
        min_similarity: Option<f64>,
    },
}

impl SchemaNode {
    /// A scalar with the default threshold.
    pub fn scalar(tag: &str) -> Self {
        SchemaNode::Scalar {
            kind: ValueKind::from_tag(tag),
            min_similarity: None,
        }
    }

    /// A table slot with the default threshold.
    pub fn table(name: impl Into<String>) -> Self {
        SchemaNode::TableSlot {
            table_name: name.into(),
            min_similarity: None,
        }
    }

    /// Set a per-slot threshold and return self. Sections are unchanged.
    pub fn with_min_similarity(mut self, threshold: f64) -> Self {
        match &mut self {
            SchemaNode::TableSlot { min_similarity, .. }
            | SchemaNode::Scalar { min_similarity, .. } => *min_similarity = Some(threshold),
            SchemaNode::Section(_) => {}
        }
        self
    }

    /// Number of scalar and table slots under this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            SchemaNode::Section(children) => children.iter().map(|(_, n)| n.leaf_count()).sum(),
            _ => 1,
        }
    }

    fn from_value(name: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(tag) => Ok(SchemaNode::scalar(tag)),
            Value::Null => Ok(SchemaNode::scalar("")),
            Value::Object(map) if map.contains_key(TABLE_NAME_KEY) => {
                let table_name = map[TABLE_NAME_KEY].as_str().ok_or_else(|| {
                    Error::InvalidTemplate(format!("`{}`: {} must be a string", name, TABLE_NAME_KEY))
                })?;
                Ok(SchemaNode::TableSlot {
                    table_name: table_name.to_string(),
                    min_similarity: min_similarity(name, map)?,
                })
            }
            Value::Object(map) if is_scalar_options(map) => {
                let tag = map[VALUE_TYPE_KEY].as_str().unwrap_or_default();
                Ok(SchemaNode::Scalar {
                    kind: ValueKind::from_tag(tag),
                    min_similarity: min_similarity(name, map)?,
                })
            }
            Value::Object(map) => Ok(SchemaNode::Section(section_from_map(map)?)),
            other => Err(Error::InvalidTemplate(format!(
                "`{}` must be a type tag or an object, found {}",
                name, other
            ))),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            SchemaNode::Section(children) => Value::Object(section_to_map(children)),
            SchemaNode::TableSlot {
                table_name,
                min_similarity,
            } => {
                let mut map = Map::new();
                map.insert(TABLE_NAME_KEY.to_string(), Value::from(table_name.as_str()));
                if let Some(t) = min_similarity {
                    map.insert(MIN_SIMILARITY_KEY.to_string(), Value::from(*t));
                }
                Value::Object(map)
            }
            SchemaNode::Scalar {
                kind,
                min_similarity: None,
            } => Value::from(kind.tag()),
            SchemaNode::Scalar {
                kind,
                min_similarity: Some(t),
            } => {
                let mut map = Map::new();
                map.insert(VALUE_TYPE_KEY.to_string(), Value::from(kind.tag()));
                map.insert(MIN_SIMILARITY_KEY.to_string(), Value::from(*t));
                Value::Object(map)
            }
        }
    }
}

/// A mapping is a scalar with options only when `ValueType` is a string and
/// every key is `ValueType` or `MinSimilarity`. Anything else is a section.
fn is_scalar_options(map: &Map<String, Value>) -> bool {
    map.get(VALUE_TYPE_KEY).is_some_and(Value::is_string)
        && map
            .keys()
            .all(|k| k == VALUE_TYPE_KEY || k == MIN_SIMILARITY_KEY)
}

fn min_similarity(name: &str, map: &Map<String, Value>) -> Result<Option<f64>> {
    match map.get(MIN_SIMILARITY_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_f64() {
            Some(t) if (0.0..=1.0).contains(&t) => Ok(Some(t)),
            _ => Err(Error::InvalidTemplate(format!(
                "`{}`: {} must be a number in [0, 1]",
                name, MIN_SIMILARITY_KEY
            ))),
        },
    }
}

fn section_from_map(map: &Map<String, Value>) -> Result<FieldMap<SchemaNode>> {
    map.iter()
        .map(|(name, value)| -> Result<(String, SchemaNode)> {
            Ok((name.clone(), SchemaNode::from_value(name, value)?))
        })
        .collect()
}

fn section_to_map(section: &FieldMap<SchemaNode>) -> Map<String, Value> {
    section
        .iter()
        .map(|(name, node)| (name.to_string(), node.to_value()))
        .collect()
}

/// A loaded template. Immutable; share it across pages.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTemplate {
    root: FieldMap<SchemaNode>,
}

impl SchemaTemplate {
    /// Build a template from top-level nodes.
    pub fn new(root: FieldMap<SchemaNode>) -> Self {
        Self { root }
    }

    /// Parse a template from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Build a template from a JSON value; the root must be an object.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(section_from_map(map)?)),
            other => Err(Error::InvalidTemplate(format!(
                "template root must be an object, found {}",
                other
            ))),
        }
    }

    /// Load a template file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Load a template file, falling back to [`Self::default_template`].
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(template) => {
                log::info!("Loaded template from {}", path.display());
                template
            }
            Err(e) => {
                log::warn!(
                    "Failed to load template from {}: {}; using default template",
                    path.display(),
                    e
                );
                Self::default_template()
            }
        }
    }

    /// Minimal gas statement schema used when no template can be loaded.
    pub fn default_template() -> Self {
        let empty = || SchemaNode::Section(FieldMap::new());
        let mut root = FieldMap::new();
        root.insert("Statement", empty());
        root.insert("Physical Information", empty());
        root.insert("Analysis", empty());
        root.insert("Fees", empty());
        root.insert("Settlement Information", empty());
        root.insert(
            "Total Producer Payment",
            SchemaNode::scalar("float_dollar").with_min_similarity(0.5),
        );
        root.insert("Contact Information", empty());
        Self::new(root)
    }

    /// Top-level nodes in declaration order.
    pub fn root(&self) -> &FieldMap<SchemaNode> {
        &self.root
    }

    /// Number of scalar and table slots.
    pub fn leaf_count(&self) -> usize {
        self.root.iter().map(|(_, n)| n.leaf_count()).sum()
    }

    /// Check if the template declares nothing.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The template as JSON.
    pub fn to_value(&self) -> Value {
        Value::Object(section_to_map(&self.root))
    }
}

impl Default for SchemaTemplate {
    fn default() -> Self {
        Self::default_template()
    }
}

impl Serialize for SchemaTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemaTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}
