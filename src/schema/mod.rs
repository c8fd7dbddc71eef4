//! Target templates and fuzzy matching against them.

mod matcher;
mod similarity;
mod template;

pub use matcher::{
    log_match_summary, FieldMatch, MatchOptions, MatchOutcome, SchemaMatcher,
    TOTAL_PRODUCER_PAYMENT,
};
pub use similarity::{clean_key, similarity_ratio, KeyCleaner};
pub use template::{
    SchemaNode, SchemaTemplate, ValueKind, MIN_SIMILARITY_KEY, TABLE_NAME_KEY, VALUE_TYPE_KEY,
};
