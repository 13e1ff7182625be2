//! Shared helpers for Decimal → f64 conversions and date parsing.
//!
//! Amount columns in the trial database are a mix of FLOAT, DOUBLE and
//! DECIMAL. The queries cast them to DECIMAL so that sqlx decodes them
//! uniformly; these helpers turn them back into `f64` for the engine.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::ClimateError;

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Convert an Option<Decimal> to Option<f64>.
///
/// A NULL sensor value stays `None`; it is never coerced to zero.
pub(crate) fn opt_dec_to_f64(d: Option<Decimal>) -> Option<f64> {
    d.and_then(|v| v.to_f64())
}

/// Parse a `YYYY-MM-DD` date string.
pub(crate) fn parse_iso_date(raw: &str, line: usize) -> Result<NaiveDate, ClimateError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        ClimateError::input_shape(line, format!("invalid date '{}': {}", raw.trim(), e))
    })
}
