//! Combining per-page records into one document record.
//!
//! Pages are folded in order:
//!
//! - a key the accumulator lacks is inserted;
//! - sections merge key by key under these same rules;
//! - tables append rows, choice lists append entries;
//! - any other value is overwritten only by a non-empty incoming value.

use crate::model::{MatchedValue, Record};

/// Fold `incoming` into `target`.
pub fn merge_into(target: &mut Record, incoming: Record) {
    for (key, value) in incoming {
        let Some(existing) = target.get_mut(&key) else {
            target.insert(key, value);
            continue;
        };

        match (existing, value) {
            (MatchedValue::Section(current), MatchedValue::Section(next)) => {
                merge_into(current, next);
            }
            (MatchedValue::Table(current), MatchedValue::Table(rows)) => {
                current.extend(rows);
            }
            (MatchedValue::Choices(current), MatchedValue::Choices(more)) => {
                current.extend(more);
            }
            (existing, value) => {
                if !value.is_empty() {
                    *existing = value;
                } else {
                    log::debug!("Keeping earlier value for '{}' over an empty one", key);
                }
            }
        }
    }
}

/// Combine page records in page order.
pub fn combine_pages<I>(pages: I) -> Record
where
    I: IntoIterator<Item = Record>,
{
    pages.into_iter().fold(Record::new(), |mut combined, page| {
        merge_into(&mut combined, page);
        combined
    })
}
