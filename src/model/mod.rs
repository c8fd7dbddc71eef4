//! Data model for OCR blocks, extracted fields and reconciled records.
//!
//! Blocks come in from the OCR collaborator, [`ExtractedFields`] and
//! [`ExtractedTable`]s are the plain intermediate form, and [`Record`] is
//! the template-shaped output.

mod block;
mod fields;
mod record;

pub use block::{
    Block, BlockGraph, BlockType, BoundingBox, EntityType, Geometry, Relationship,
    RelationshipType, SelectionStatus,
};
pub use fields::{ExtractedFields, ExtractedTable, FieldMap, FieldValue};
pub use record::{MatchedValue, Record};
