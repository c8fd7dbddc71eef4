//! Value coercion and OCR repair.
//!
//! Two stages: [`convert_value`] coerces a matched value to the type the
//! template declares, and [`RecordFinisher`] repairs a finished record by
//! field name. Both leave unconvertible text unchanged.

mod convert;
mod finish;

pub use convert::{convert_value, ConversionError, FieldFailure};
pub use finish::{
    collapse_duplicate_decimals, finish_record, normalize_date, normalize_numeric,
    ocr_digit_repair, remove_thousands_separators, strip_currency_symbol, FieldRule,
    RecordFinisher,
};
