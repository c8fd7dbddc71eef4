//! Character-sequence similarity.
//!
//! The ratio is the Ratcliff/Obershelp "gestalt" score: find the longest
//! common run, recurse on the pieces left and right of it, and report
//! `2 * matched / (len(a) + len(b))`.

use regex::Regex;

/// Similarity of two strings in [0, 1]; 1.0 means identical.
///
/// Two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

/// Total size of all matching blocks between `a` and `b`.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, alo, ahi, b, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common run of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Returns `(i, j, k)` with `a[i..i+k] == b[j..j+k]`. Among equally long
/// runs the one starting earliest in `a`, then earliest in `b`, wins.
fn longest_match(
    a: &[char],
    alo: usize,
    ahi: usize,
    b: &[char],
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // run[j + 1] = length of the common run ending at a[i - 1], b[j]
    let mut run = vec![0usize; b.len() + 1];

    for i in alo..ahi {
        let mut next = vec![0usize; b.len() + 1];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = run[j] + 1;
            next[j + 1] = k;
            if k > best_k {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_k = k;
            }
        }
        run = next;
    }

    (best_i, best_j, best_k)
}

/// Normalizes field names before comparison.
#[derive(Debug, Clone)]
pub struct KeyCleaner {
    strip: Regex,
}

impl KeyCleaner {
    /// Create a cleaner.
    pub fn new() -> Self {
        Self {
            strip: Regex::new(r"[^a-zA-Z0-9\s]").expect("valid key pattern"),
        }
    }

    /// Drop characters outside `[a-zA-Z0-9\s]`, lower-case, trim.
    pub fn clean(&self, key: &str) -> String {
        self.strip.replace_all(key, "").to_lowercase().trim().to_string()
    }
}

impl Default for KeyCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Clean a single key. Builds a fresh [`KeyCleaner`]; prefer reusing one.
pub fn clean_key(key: &str) -> String {
    KeyCleaner::new().clean(key)
}
