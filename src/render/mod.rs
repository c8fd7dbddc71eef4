//! Output of reconciliation: the result envelope and its JSON rendering.

mod json;
mod result;

pub use json::{to_json, JsonFormat};
pub use result::{Issue, ReconcileResult, ReconcileStats};
