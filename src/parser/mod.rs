//! Block graph parsing module.

mod checkbox;
mod graph;
mod options;

pub use checkbox::{
    collect_group, in_window, locate_anchor, resolve_group, CheckboxGroup, CheckboxResolver,
};
pub use graph::{
    parse_key_values, parse_response, parse_tables, resolve_text, structural_gaps, SELECTED_TOKEN,
};
pub use options::{AnchorWindow, GroupingOptions, DEFAULT_ANCHOR_WORDS};
