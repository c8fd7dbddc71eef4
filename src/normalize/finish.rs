//! Name-driven repair of a matched record.
//!
//! After matching, every text leaf is routed by its field name: names ending
//! in "date" are reparsed as dates, names that look like amounts, quantities,
//! rates or values are repaired as numbers, everything else passes through.
//! Numeric repair fixes the usual OCR damage in order:
//!
//! 1. letter `O`/`o` read for digit `0`;
//! 2. thousands separators;
//! 3. duplicated decimal points (`1.2.3` → `1.23`);
//! 4. a leading currency symbol.

use chrono::{Month, NaiveDate};
use regex::Regex;

use crate::model::{MatchedValue, Record};
use crate::schema::ValueKind;

use super::convert::{parse_finite, ConversionError, FieldFailure};

/// Currency symbols stripped from the front of numeric values.
const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Replace letter `O`/`o` with digit `0`.
pub fn ocr_digit_repair(value: &str) -> String {
    value.replace(['O', 'o'], "0")
}

/// Drop `,` thousands separators.
pub fn remove_thousands_separators(value: &str) -> String {
    value.replace(',', "")
}

/// Keep the first `.` as the decimal point and join every later digit run.
pub fn collapse_duplicate_decimals(value: &str) -> String {
    match value.split_once('.') {
        Some((int_part, rest)) if rest.contains('.') => {
            format!("{}.{}", int_part, rest.replace('.', ""))
        }
        _ => value.to_string(),
    }
}

/// Strip one leading currency symbol and the whitespace around it.
pub fn strip_currency_symbol(value: &str) -> &str {
    let trimmed = value.trim();
    match trimmed.strip_prefix(CURRENCY_SYMBOLS) {
        Some(rest) => rest.trim(),
        None => trimmed,
    }
}

/// Repair a numeric string and parse it; unparseable input comes back unchanged.
pub fn normalize_numeric(value: &str) -> MatchedValue {
    match repair_number(value) {
        Ok(n) => MatchedValue::Number(n),
        Err(_) => MatchedValue::Text(value.to_string()),
    }
}

fn repair_number(value: &str) -> Result<f64, String> {
    let repaired = ocr_digit_repair(value);
    let repaired = remove_thousands_separators(&repaired);
    let repaired = collapse_duplicate_decimals(&repaired);
    parse_finite(strip_currency_symbol(&repaired))
}

/// Reformat `Jan 15, 2023` style dates as `2023-01-15`; anything else is unchanged.
pub fn normalize_date(value: &str) -> String {
    RecordFinisher::new().normalize_date(value)
}

/// How a field's text is repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Reparse as a date
    Date,
    /// Repair and parse as a number
    Numeric,
    /// Leave as-is
    PassThrough,
}

impl FieldRule {
    /// Pick the rule for a field name.
    pub fn for_field(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.ends_with("date") || name.ends_with("run date") {
            FieldRule::Date
        } else if name.contains("amount")
            || ["quantity", "rate", "value"]
                .iter()
                .any(|suffix| name.ends_with(suffix))
        {
            FieldRule::Numeric
        } else {
            FieldRule::PassThrough
        }
    }
}

/// Applies the name-driven rules to a whole record.
#[derive(Debug, Clone)]
pub struct RecordFinisher {
    date_pattern: Regex,
}

impl RecordFinisher {
    /// Create a finisher.
    pub fn new() -> Self {
        Self {
            date_pattern: Regex::new(r"^([A-Za-z]{3})\s+(\d{1,2}),\s+(\d{4})$")
                .expect("valid date pattern"),
        }
    }

    /// Reformat an abbreviated-month date as ISO; anything else is unchanged.
    pub fn normalize_date(&self, value: &str) -> String {
        self.parse_date(value)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| value.to_string())
    }

    fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let caps = self.date_pattern.captures(value)?;
        let month = caps[1].parse::<Month>().ok()?;
        let day = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month.number_from_month(), day)
    }

    /// Repair one leaf according to its field name.
    pub fn normalize_field(&self, name: &str, value: MatchedValue) -> MatchedValue {
        let mut failures = Vec::new();
        self.finish_value(name, name, value, &mut failures)
    }

    /// Repair every leaf of a record, recursing into sections.
    ///
    /// Tables pass through: their cells carry no field names.
    pub fn finish(&self, record: Record) -> (Record, Vec<FieldFailure>) {
        let mut failures = Vec::new();
        let record = self.finish_section("", record, &mut failures);
        (record, failures)
    }

    fn finish_section(
        &self,
        prefix: &str,
        section: Record,
        failures: &mut Vec<FieldFailure>,
    ) -> Record {
        section
            .into_iter()
            .map(|(name, value)| {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                let value = self.finish_value(&path, &name, value, failures);
                (name, value)
            })
            .collect()
    }

    fn finish_value(
        &self,
        path: &str,
        name: &str,
        value: MatchedValue,
        failures: &mut Vec<FieldFailure>,
    ) -> MatchedValue {
        match value {
            MatchedValue::Text(text) => match FieldRule::for_field(name) {
                FieldRule::Date => MatchedValue::Text(self.normalize_date(&text)),
                FieldRule::Numeric => match repair_number(&text) {
                    Ok(n) => MatchedValue::Number(n),
                    Err(reason) => {
                        log::debug!("Numeric repair failed for {}: '{}'", path, text);
                        failures.push(FieldFailure {
                            field: path.to_string(),
                            error: ConversionError {
                                value: text.clone(),
                                kind: ValueKind::Float,
                                reason,
                            },
                        });
                        MatchedValue::Text(text)
                    }
                },
                FieldRule::PassThrough => MatchedValue::Text(text),
            },
            MatchedValue::Section(section) => {
                MatchedValue::Section(self.finish_section(path, section, failures))
            }
            other => other,
        }
    }
}

impl Default for RecordFinisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Repair every leaf of a record, discarding failure details.
pub fn finish_record(record: Record) -> Record {
    RecordFinisher::new().finish(record).0
}
