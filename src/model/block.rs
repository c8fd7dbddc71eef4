//! OCR block types and the per-page block graph.

use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of an OCR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    /// A single recognized word
    Word,
    /// A line of words
    Line,
    /// A checkbox or radio button
    SelectionElement,
    /// A form key or value container
    KeyValueSet,
    /// A table container
    Table,
    /// A table cell
    Cell,
    /// Any block type the reconciler does not interpret (PAGE, MERGED_CELL, ...)
    #[serde(other)]
    Other,
}

/// Role of a KEY_VALUE_SET block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Key,
    Value,
    #[serde(other)]
    Other,
}

/// Checkbox state of a SELECTION_ELEMENT block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionStatus {
    Selected,
    NotSelected,
    /// Any other status reads as unselected
    #[serde(other)]
    Other,
}

/// Edge kind between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Child,
    Value,
    #[serde(other)]
    Other,
}

/// An edge list from one block to others, by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    /// Edge kind
    #[serde(rename = "Type")]
    pub kind: RelationshipType,
    /// Target block ids
    #[serde(default)]
    pub ids: Vec<String>,
}

impl Relationship {
    /// Create a CHILD edge list.
    pub fn child<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            kind: RelationshipType::Child,
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a VALUE edge.
    pub fn value(id: impl Into<String>) -> Self {
        Self {
            kind: RelationshipType::Value,
            ids: vec![id.into()],
        }
    }
}

/// Axis-aligned box in page-normalized coordinates (all in [0, 1]).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a bounding box.
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Right edge of the box.
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Check that every coordinate lies in [0, 1].
    pub fn is_normalized(&self) -> bool {
        [self.top, self.left, self.width, self.height]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

/// Block geometry as emitted by the OCR service.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

/// An atomic OCR-detected node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    /// Unique id within the page
    pub id: String,

    /// Block kind
    pub block_type: BlockType,

    /// Recognized text (WORD, LINE, sometimes CELL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// KEY or VALUE, for KEY_VALUE_SET blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<EntityType>,

    /// Checkbox state, for SELECTION_ELEMENT blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_status: Option<SelectionStatus>,

    /// 1-based row, for CELL blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u32>,

    /// 1-based column, for CELL blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<u32>,

    /// Position on the page
    #[serde(default)]
    pub geometry: Geometry,

    /// Outgoing edges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Block {
    /// Create a bare block.
    pub fn new(id: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            id: id.into(),
            block_type,
            text: None,
            entity_types: Vec::new(),
            selection_status: None,
            row_index: None,
            column_index: None,
            geometry: Geometry::default(),
            relationships: Vec::new(),
        }
    }

    /// Create a WORD block.
    pub fn word(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, BlockType::Word).with_text(text)
    }

    /// Create a LINE block.
    pub fn line(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, BlockType::Line).with_text(text)
    }

    /// Create a SELECTION_ELEMENT block.
    pub fn selection(id: impl Into<String>, selected: bool) -> Self {
        let mut block = Self::new(id, BlockType::SelectionElement);
        block.selection_status = Some(if selected {
            SelectionStatus::Selected
        } else {
            SelectionStatus::NotSelected
        });
        block
    }

    /// Create a KEY_VALUE_SET block typed KEY.
    pub fn key(id: impl Into<String>) -> Self {
        let mut block = Self::new(id, BlockType::KeyValueSet);
        block.entity_types = vec![EntityType::Key];
        block
    }

    /// Create a KEY_VALUE_SET block typed VALUE.
    pub fn value(id: impl Into<String>) -> Self {
        let mut block = Self::new(id, BlockType::KeyValueSet);
        block.entity_types = vec![EntityType::Value];
        block
    }

    /// Create a CELL block at a 1-based position.
    pub fn cell(id: impl Into<String>, row: u32, column: u32) -> Self {
        let mut block = Self::new(id, BlockType::Cell);
        block.row_index = Some(row);
        block.column_index = Some(column);
        block
    }

    /// Set text and return self.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add CHILD edges and return self.
    pub fn with_children<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.relationships.push(Relationship::child(ids));
        self
    }

    /// Add a VALUE edge and return self.
    pub fn with_value(mut self, id: impl Into<String>) -> Self {
        self.relationships.push(Relationship::value(id));
        self
    }

    /// Set the bounding box and return self.
    pub fn with_box(mut self, bbox: BoundingBox) -> Self {
        self.geometry.bounding_box = bbox;
        self
    }

    /// Bounding box of this block.
    pub fn bounding_box(&self) -> BoundingBox {
        self.geometry.bounding_box
    }

    /// A KEY_VALUE_SET block typed KEY.
    pub fn is_key(&self) -> bool {
        self.block_type == BlockType::KeyValueSet && self.entity_types.contains(&EntityType::Key)
    }

    /// A KEY_VALUE_SET block not typed KEY.
    pub fn is_value(&self) -> bool {
        self.block_type == BlockType::KeyValueSet && !self.is_key()
    }

    /// Whether a SELECTION_ELEMENT is checked.
    pub fn is_selected(&self) -> bool {
        self.selection_status == Some(SelectionStatus::Selected)
    }

    /// Ids on all edges of the given kind, in declaration order.
    pub fn related_ids(&self, kind: RelationshipType) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(move |r| r.kind == kind)
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }
}

/// Wire envelope produced by the OCR collaborator.
#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(rename = "Blocks", default)]
    blocks: Vec<Block>,
}

/// All blocks of one page, indexed by id.
///
/// Blocks stay in their original order; relationships are resolved through
/// the id index so no block owns another.
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    blocks: Vec<Block>,
    index: HashMap<String, usize>,
}

impl BlockGraph {
    /// Build a graph from blocks. A repeated id resolves to its last block.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut index = HashMap::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            if !block.bounding_box().is_normalized() {
                log::warn!("Block {} has a bounding box outside [0, 1]", block.id);
            }
            if index.insert(block.id.clone(), i).is_some() {
                log::debug!("Duplicate block id {}; keeping the later block", block.id);
            }
        }
        Self { blocks, index }
    }

    /// Parse a `{"Blocks": [...]}` response.
    pub fn from_json(json: &str) -> Result<Self> {
        let response: AnalyzeResponse = serde_json::from_str(json)
            .map_err(|e| Error::InvalidBlockGraph(e.to_string()))?;
        Ok(Self::from_blocks(response.blocks))
    }

    /// Parse a `{"Blocks": [...]}` response from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let response: AnalyzeResponse = serde_json::from_reader(reader)
            .map_err(|e| Error::InvalidBlockGraph(e.to_string()))?;
        Ok(Self::from_blocks(response.blocks))
    }

    /// Look up a block by id.
    pub fn get(&self, id: &str) -> Option<&Block> {
        self.index.get(id).map(|&i| &self.blocks[i])
    }

    /// All blocks in original order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the graph has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks of one type, in original order.
    pub fn of_type(&self, block_type: BlockType) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(move |b| b.block_type == block_type)
    }

    /// KEY blocks, in original order.
    pub fn keys(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_key())
    }

    /// Resolved CHILD targets of a block. Dangling ids are skipped.
    pub fn children<'a>(&'a self, block: &'a Block) -> impl Iterator<Item = &'a Block> + 'a {
        block
            .related_ids(RelationshipType::Child)
            .filter_map(move |id| self.get(id))
    }

    /// The VALUE block paired with a KEY block, if the edge resolves.
    pub fn value_of(&self, key: &Block) -> Option<&Block> {
        key.related_ids(RelationshipType::Value)
            .filter_map(|id| self.get(id))
            .find(|b| b.is_value())
    }

    /// Relationship targets that do not exist in the graph.
    pub fn dangling_ids(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .flat_map(|b| b.relationships.iter())
            .flat_map(|r| r.ids.iter())
            .map(String::as_str)
            .filter(|id| !self.index.contains_key(*id))
            .collect()
    }
}

impl FromIterator<Block> for BlockGraph {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        Self::from_blocks(iter.into_iter().collect())
    }
}
