//! Key/value and table extraction from the block graph.
//!
//! Every KEY block becomes one field whose value is the text under its
//! paired VALUE block. Every TABLE block becomes a row-major matrix of cell
//! texts. Structural gaps (missing edges, dangling ids, unindexed cells)
//! never fail; they produce empty text or are skipped.

use std::collections::{BTreeMap, HashSet};

use crate::model::{Block, BlockGraph, BlockType, ExtractedFields, ExtractedTable, FieldValue};

/// Token contributed by a checked SELECTION_ELEMENT.
pub const SELECTED_TOKEN: &str = "X";

/// Resolve the text under a block.
///
/// CHILD edges are walked depth-first down to WORD and SELECTION_ELEMENT
/// leaves. Word texts are joined with single spaces; a selected checkbox
/// contributes [`SELECTED_TOKEN`] and an unselected one nothing. A block
/// whose walk yields nothing falls back to its own text.
pub fn resolve_text(block: &Block, graph: &BlockGraph) -> String {
    let mut tokens = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(block.id.as_str());
    collect_tokens(block, graph, &mut tokens, &mut visited);

    let text = tokens.join(" ");
    let text = text.trim();
    if text.is_empty() {
        block.text.as_deref().unwrap_or_default().trim().to_string()
    } else {
        text.to_string()
    }
}

fn collect_tokens<'a>(
    block: &'a Block,
    graph: &'a BlockGraph,
    tokens: &mut Vec<&'a str>,
    visited: &mut HashSet<&'a str>,
) {
    for child in graph.children(block) {
        if !visited.insert(child.id.as_str()) {
            continue;
        }
        match child.block_type {
            BlockType::Word => {
                if let Some(text) = child.text.as_deref() {
                    tokens.push(text);
                }
            }
            BlockType::SelectionElement => {
                if child.is_selected() {
                    tokens.push(SELECTED_TOKEN);
                }
            }
            _ => collect_tokens(child, graph, tokens, visited),
        }
    }
}

/// Extract plain key/value pairs.
///
/// A KEY without a resolvable VALUE edge still yields a field with an
/// empty value. Duplicate key texts keep the last value.
pub fn parse_key_values(graph: &BlockGraph) -> ExtractedFields {
    let mut fields = ExtractedFields::new();

    for key_block in graph.keys() {
        let key = resolve_text(key_block, graph);
        let value = match graph.value_of(key_block) {
            Some(value_block) => resolve_text(value_block, graph),
            None => {
                log::debug!("Key block {} has no value block", key_block.id);
                String::new()
            }
        };
        log::debug!("Extracted key-value pair: {} -> {}", key, value);
        fields.insert(key, FieldValue::Text(value));
    }

    log::debug!("Extracted {} key-value pairs", fields.len());
    fields
}

/// Extract every TABLE block as a row-major matrix.
pub fn parse_tables(graph: &BlockGraph) -> Vec<ExtractedTable> {
    let tables: Vec<ExtractedTable> = graph
        .of_type(BlockType::Table)
        .map(|table| parse_table(table, graph))
        .collect();

    if tables.is_empty() {
        log::debug!("No tables found on page");
    }
    tables
}

fn parse_table(table: &Block, graph: &BlockGraph) -> ExtractedTable {
    let mut rows: BTreeMap<u32, BTreeMap<u32, String>> = BTreeMap::new();

    for cell in graph
        .children(table)
        .filter(|b| b.block_type == BlockType::Cell)
    {
        match (cell.row_index, cell.column_index) {
            (Some(row), Some(col)) if row > 0 && col > 0 => {
                rows.entry(row)
                    .or_default()
                    .insert(col, resolve_text(cell, graph));
            }
            _ => log::debug!("Skipping cell {} without a valid position", cell.id),
        }
    }

    log::debug!("Table {}: {} rows", table.id, rows.len());
    rows.into_values()
        .map(|cols| cols.into_values().collect())
        .collect()
}

/// Extract key/value pairs and tables in one pass.
pub fn parse_response(graph: &BlockGraph) -> (ExtractedFields, Vec<ExtractedTable>) {
    let fields = parse_key_values(graph);
    let tables = parse_tables(graph);
    log::info!(
        "Parsed {} key-value pairs and {} tables",
        fields.len(),
        tables.len()
    );
    (fields, tables)
}

/// Describe the structural gaps found in a graph.
pub fn structural_gaps(graph: &BlockGraph) -> Vec<String> {
    let mut gaps: Vec<String> = graph
        .dangling_ids()
        .into_iter()
        .map(|id| format!("dangling block id {}", id))
        .collect();

    gaps.extend(
        graph
            .keys()
            .filter(|k| graph.value_of(k).is_none())
            .map(|k| format!("key block {} has no value block", k.id)),
    );

    gaps.extend(
        graph
            .of_type(BlockType::Cell)
            .filter(|c| !matches!((c.row_index, c.column_index), (Some(r), Some(col)) if r > 0 && col > 0))
            .map(|c| format!("cell {} has no valid row/column index", c.id)),
    );

    gaps
}
