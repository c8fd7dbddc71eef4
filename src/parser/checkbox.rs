//! Checkbox group detection.
//!
//! Forms often encode one multi-choice answer as a cluster of small
//! key/value pairs (one per checkbox) printed under a label. The OCR sees
//! each box as its own field. This module finds the cluster below each
//! configured anchor word and collapses it into a single field named after
//! the anchor.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{BlockGraph, BlockType, BoundingBox, ExtractedFields, FieldValue};

use super::graph::resolve_text;
use super::options::{AnchorWindow, GroupingOptions};

/// A detected checkbox cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckboxGroup {
    /// Anchor word the group was found under
    pub anchor_word: String,

    /// Bounding box of the anchor line
    pub anchor_box: BoundingBox,

    /// Window used for the search
    pub window: AnchorWindow,

    /// Every key/value pair inside the window, whitespace-trimmed
    pub members: ExtractedFields,

    /// The collapsed answer
    pub resolved: FieldValue,
}

/// Bounding box of the first LINE containing `word` (case-sensitive).
pub fn locate_anchor(word: &str, graph: &BlockGraph) -> Option<BoundingBox> {
    graph
        .of_type(BlockType::Line)
        .find(|line| line.text.as_deref().is_some_and(|t| t.contains(word)))
        .map(|line| line.bounding_box())
}

/// Whether a VALUE block box falls inside the window derived from an anchor.
pub fn in_window(candidate: &BoundingBox, anchor: &BoundingBox, window: &AnchorWindow) -> bool {
    let top_min = anchor.top - window.lines_above * anchor.height - window.margin * anchor.top;
    let top_max = anchor.top + window.lines_below * anchor.height + window.margin * anchor.height;
    let left_min = anchor.left * (1.0 - window.margin);
    let right_max = window.right_bound * (1.0 + window.margin);

    candidate.top >= top_min
        && candidate.top <= top_max
        && candidate.left >= left_min
        && candidate.right() <= right_max
}

/// Collect the key/value pairs whose VALUE block lies in the anchor window.
///
/// Keys without a VALUE block are never collected. Trailing whitespace is
/// trimmed from keys and values.
pub fn collect_group(
    graph: &BlockGraph,
    anchor: &BoundingBox,
    window: &AnchorWindow,
) -> ExtractedFields {
    let mut members = ExtractedFields::new();

    for key_block in graph.keys() {
        let Some(value_block) = graph.value_of(key_block) else {
            continue;
        };
        if !in_window(&value_block.bounding_box(), anchor, window) {
            continue;
        }
        let key = resolve_text(key_block, graph);
        let value = resolve_text(value_block, graph);
        members.insert(
            key.trim_end(),
            FieldValue::Text(value.trim_end().to_string()),
        );
    }

    members
}

/// Collapse a group's members into one answer.
///
/// Keys with an empty value are unmarked boxes and dropped. One marked key
/// becomes a bare string (minus a trailing `;`); any other count stays a
/// list.
pub fn resolve_group(members: &ExtractedFields) -> FieldValue {
    let mut selected: Vec<String> = members
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, _)| k.to_string())
        .collect();

    if selected.len() == 1 {
        let mut choice = selected.remove(0);
        if choice.ends_with(';') {
            choice.pop();
        }
        FieldValue::Text(choice)
    } else {
        FieldValue::Choices(selected)
    }
}

/// Finds checkbox groups and folds them into the plain field map.
#[derive(Debug, Clone, Default)]
pub struct CheckboxResolver {
    options: GroupingOptions,
}

impl CheckboxResolver {
    /// Create a resolver with the given options.
    pub fn new(options: GroupingOptions) -> Self {
        Self { options }
    }

    /// Grouping options in use.
    pub fn options(&self) -> &GroupingOptions {
        &self.options
    }

    /// Locate, collect and resolve a group for every anchor found on the page.
    pub fn resolve_groups(&self, graph: &BlockGraph) -> Vec<CheckboxGroup> {
        let window = self.options.window;

        self.options
            .anchor_words
            .iter()
            .filter_map(|word| {
                let Some(anchor_box) = locate_anchor(word, graph) else {
                    log::debug!("Anchor '{}' not found on page", word);
                    return None;
                };
                let members = collect_group(graph, &anchor_box, &window);
                let resolved = resolve_group(&members);
                log::debug!(
                    "Anchor '{}': {} candidates, resolved to {:?}",
                    word,
                    members.len(),
                    resolved
                );
                Some(CheckboxGroup {
                    anchor_word: word.clone(),
                    anchor_box,
                    window,
                    members,
                    resolved,
                })
            })
            .collect()
    }

    /// Replace the raw fields consumed by groups with one field per group.
    pub fn apply(&self, mut fields: ExtractedFields, groups: &[CheckboxGroup]) -> ExtractedFields {
        let consumed: HashSet<&str> = groups.iter().flat_map(|g| g.members.keys()).collect();
        fields.retain(|key, _| !consumed.contains(key));

        for group in groups {
            fields.insert(group.anchor_word.clone(), group.resolved.clone());
        }
        fields
    }

    /// Resolve groups on a page and merge them into its fields.
    pub fn process(&self, fields: ExtractedFields, graph: &BlockGraph) -> ExtractedFields {
        if !self.options.is_enabled() {
            return fields;
        }
        let groups = self.resolve_groups(graph);
        self.apply(fields, &groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Block;
    use crate::parser::graph::parse_key_values;

    /// A labelled line with three checkbox pairs beneath it, plus an unrelated
    /// field far down the page.
    fn checkbox_page(marks: [bool; 3]) -> BlockGraph {
        let mut blocks = vec![Block::line("l1", "Residue Gas Disposition")
            .with_box(BoundingBox::new(0.30, 0.10, 0.40, 0.02))];

        let labels = ["Sold;", "Flared", "Used on lease"];
        for (i, (label, marked)) in labels.iter().zip(marks).enumerate() {
            let top = 0.33 + 0.02 * i as f64;
            blocks.push(
                Block::key(format!("k{i}"))
                    .with_children([format!("kw{i}")])
                    .with_value(format!("v{i}")),
            );
            blocks.push(Block::word(format!("kw{i}"), *label));
            blocks.push(
                Block::value(format!("v{i}"))
                    .with_children([format!("s{i}")])
                    .with_box(BoundingBox::new(top, 0.12, 0.02, 0.02)),
            );
            blocks.push(Block::selection(format!("s{i}"), marked));
        }

        blocks.push(Block::key("kf").with_children(["kfw"]).with_value("vf"));
        blocks.push(Block::word("kfw", "Operator"));
        blocks.push(
            Block::value("vf")
                .with_children(["vfw"])
                .with_box(BoundingBox::new(0.80, 0.12, 0.2, 0.02)),
        );
        blocks.push(Block::word("vfw", "Acme"));

        blocks.into_iter().collect()
    }

    #[test]
    fn test_locate_anchor_first_line() {
        let graph: BlockGraph = vec![
            Block::line("a", "Gasoline").with_box(BoundingBox::new(0.1, 0.0, 0.1, 0.01)),
            Block::line("b", "Gas").with_box(BoundingBox::new(0.5, 0.0, 0.1, 0.01)),
            Block::word("c", "Gas").with_box(BoundingBox::new(0.0, 0.0, 0.1, 0.01)),
        ]
        .into_iter()
        .collect();

        assert_eq!(locate_anchor("Gas", &graph).map(|b| b.top), Some(0.1));
        assert!(locate_anchor("gas", &graph).is_none());
    }

    #[test]
    fn test_in_window_bounds() {
        let anchor = BoundingBox::new(0.5, 0.2, 0.1, 0.02);
        let window = AnchorWindow::default();

        assert!(in_window(&BoundingBox::new(0.5, 0.2, 0.1, 0.02), &anchor, &window));
        assert!(in_window(&BoundingBox::new(0.6, 0.5, 0.1, 0.02), &anchor, &window));
        // Above the anchor, beyond the margin
        assert!(!in_window(&BoundingBox::new(0.48, 0.2, 0.1, 0.02), &anchor, &window));
        // Below five line heights plus margin
        assert!(!in_window(&BoundingBox::new(0.61, 0.2, 0.1, 0.02), &anchor, &window));
        // Left of the anchor
        assert!(!in_window(&BoundingBox::new(0.55, 0.1, 0.1, 0.02), &anchor, &window));
        // Right edge slightly beyond the page is tolerated
        assert!(in_window(&BoundingBox::new(0.55, 0.9, 0.115, 0.02), &anchor, &window));
    }

    #[test]
    fn test_collect_group_window() {
        let graph = checkbox_page([false, true, false]);
        let anchor = locate_anchor("Residue", &graph).unwrap();
        let members = collect_group(&graph, &anchor, &AnchorWindow::default());

        assert_eq!(members.len(), 3);
        assert!(!members.contains_key("Operator"));
        assert_eq!(members.get("Flared"), Some(&FieldValue::from("X")));
    }

    #[test]
    fn test_single_mark_resolves_to_string() {
        let graph = checkbox_page([false, true, false]);
        let groups = CheckboxResolver::new(GroupingOptions::new().with_anchor_words(["Residue"]))
            .resolve_groups(&graph);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].resolved, FieldValue::from("Flared"));
    }

    #[test]
    fn test_trailing_semicolon_stripped() {
        let graph = checkbox_page([true, false, false]);
        let groups = CheckboxResolver::new(GroupingOptions::new().with_anchor_words(["Residue"]))
            .resolve_groups(&graph);
        assert_eq!(groups[0].resolved, FieldValue::from("Sold"));
    }

    #[test]
    fn test_multiple_marks_stay_list() {
        let members: ExtractedFields = [
            ("A", FieldValue::from("X")),
            ("B", FieldValue::from("")),
            ("C;", FieldValue::from("X")),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            resolve_group(&members),
            FieldValue::Choices(vec!["A".to_string(), "C;".to_string()])
        );
        assert_eq!(
            resolve_group(&ExtractedFields::new()),
            FieldValue::Choices(vec![])
        );
    }

    #[test]
    fn test_process_merges_and_removes_members() {
        let graph = checkbox_page([false, false, true]);
        let fields = parse_key_values(&graph);
        assert_eq!(fields.len(), 4);

        let resolver = CheckboxResolver::new(GroupingOptions::new().with_anchor_words(["Residue", "Oil"]));
        let merged = resolver.process(fields, &graph);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("Operator"), Some(&FieldValue::from("Acme")));
        assert_eq!(merged.get("Residue"), Some(&FieldValue::from("Used on lease")));
        assert!(!merged.contains_key("Oil"));
    }

    #[test]
    fn test_disabled_grouping_is_identity() {
        let graph = checkbox_page([true, true, true]);
        let fields = parse_key_values(&graph);
        let resolver = CheckboxResolver::new(GroupingOptions::disabled());
        assert_eq!(resolver.process(fields.clone(), &graph), fields);
    }
}
