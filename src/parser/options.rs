//! Checkbox grouping configuration.

use serde::{Deserialize, Serialize};

/// Anchor words used by the gas statement layout.
pub const DEFAULT_ANCHOR_WORDS: [&str; 8] = [
    "Silver",
    "Ethane",
    "Residue",
    "Production",
    "Sale",
    "Asset",
    "Gasoline",
    "Gas",
];

/// Search window around an anchor line, in multiples of its height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorWindow {
    /// Line heights to search below the anchor
    pub lines_below: f64,

    /// Line heights to search above the anchor
    pub lines_above: f64,

    /// Right edge of the window (page-normalized)
    pub right_bound: f64,

    /// Relative slack applied to every edge
    pub margin: f64,
}

impl AnchorWindow {
    /// Create a window.
    pub fn new(lines_below: f64, lines_above: f64, right_bound: f64, margin: f64) -> Self {
        Self {
            lines_below,
            lines_above,
            right_bound,
            margin,
        }
    }
}

impl Default for AnchorWindow {
    fn default() -> Self {
        Self {
            lines_below: 5.0,
            lines_above: 0.0,
            right_bound: 1.0,
            margin: 0.02,
        }
    }
}

/// Options for detecting checkbox groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingOptions {
    /// Anchor words, searched in order. Empty disables grouping.
    pub anchor_words: Vec<String>,

    /// Window searched around each anchor
    pub window: AnchorWindow,
}

impl GroupingOptions {
    /// Create grouping options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grouping disabled.
    pub fn disabled() -> Self {
        Self {
            anchor_words: Vec::new(),
            window: AnchorWindow::default(),
        }
    }

    /// Set anchor words.
    pub fn with_anchor_words<S: Into<String>>(mut self, words: impl IntoIterator<Item = S>) -> Self {
        self.anchor_words = words.into_iter().map(Into::into).collect();
        self
    }

    /// Set the search window.
    pub fn with_window(mut self, window: AnchorWindow) -> Self {
        self.window = window;
        self
    }

    /// Whether any anchor is configured.
    pub fn is_enabled(&self) -> bool {
        !self.anchor_words.is_empty()
    }
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            anchor_words: DEFAULT_ANCHOR_WORDS.iter().map(|s| s.to_string()).collect(),
            window: AnchorWindow::default(),
        }
    }
}
