// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value coercion and timestamp normalization.
//!
//! Servers report values in whatever variant type the underlying node
//! carries. This module folds those into the [`TagValue`] scalar model
//! with a fixed precedence (integer, then float, then string) so that
//! everything downstream of the transport handles one shape.
//!
//! Timestamps arrive in three forms: epoch seconds as an integer, epoch
//! seconds with a fractional part, or an ISO-8601 string. [`TimeSpec`]
//! accepts any of the three and normalizes to UTC.
//!
//! # Examples
//!
//! ```
//! use tapline_core::convert::{coerce_scalar, TimeSpec};
//! use tapline_core::types::TagValue;
//!
//! let value = coerce_scalar(&serde_json::json!(42));
//! assert_eq!(value, TagValue::Int(42));
//!
//! let spec = TimeSpec::Int(1_700_000_000);
//! assert!(spec.to_utc().is_ok());
//! ```

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::TagValue;

// =============================================================================
// Scalar Coercion
// =============================================================================

/// Coerces an arbitrary JSON value into a [`TagValue`].
///
/// Coercion is total: every input maps to some variant. Numbers prefer
/// the integer representation when they fit in `i64`, fall back to
/// `f64`, and anything without a scalar reading (arrays, objects) is
/// rendered as its compact JSON text.
pub fn coerce_scalar(raw: &serde_json::Value) -> TagValue {
    match raw {
        serde_json::Value::Null => TagValue::Null,
        serde_json::Value::Bool(b) => TagValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                TagValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                TagValue::Float(f)
            } else {
                TagValue::Str(n.to_string())
            }
        }
        serde_json::Value::String(s) => TagValue::Str(s.clone()),
        other => TagValue::Str(other.to_string()),
    }
}

/// Coerces a string payload into a [`TagValue`].
///
/// Fixed precedence: integer parse, then floating-point parse, then
/// the literal string. Non-finite float spellings ("NaN", "inf") stay
/// literal so the parse never produces a value JSON cannot carry.
pub fn coerce_str(raw: &str) -> TagValue {
    if let Ok(i) = raw.parse::<i64>() {
        return TagValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return TagValue::Float(f);
        }
    }
    TagValue::Str(raw.to_string())
}

/// Coerces a float into a [`TagValue`], demoting non-finite values to
/// their string spelling so they survive JSON persistence.
#[inline]
pub fn coerce_float(value: f64) -> TagValue {
    if value.is_finite() {
        TagValue::Float(value)
    } else {
        TagValue::Str(value.to_string())
    }
}

// =============================================================================
// TimeSpec
// =============================================================================

/// A timestamp in any of the accepted input shapes.
///
/// Deserializes untagged, so query parameters and config fields can say
/// `1700000000`, `1700000000.25`, or `"2023-11-14T22:13:20Z"` and all
/// land here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    /// Epoch seconds.
    Int(i64),
    /// Epoch seconds with a fractional part.
    Float(f64),
    /// ISO-8601 text, or a plain `YYYY-MM-DD HH:MM:SS` reading taken as UTC.
    Text(String),
}

impl TimeSpec {
    /// Normalizes to a UTC timestamp.
    pub fn to_utc(&self) -> Result<DateTime<Utc>, StoreError> {
        match self {
            TimeSpec::Int(secs) => Utc
                .timestamp_opt(*secs, 0)
                .single()
                .ok_or_else(|| StoreError::invalid_timestamp(format!("epoch out of range: {}", secs))),
            TimeSpec::Float(secs) => {
                if !secs.is_finite() {
                    return Err(StoreError::invalid_timestamp(format!(
                        "non-finite epoch: {}",
                        secs
                    )));
                }
                let whole = secs.trunc() as i64;
                let nanos = ((secs - secs.trunc()) * 1_000_000_000.0).round() as u32;
                Utc.timestamp_opt(whole, nanos).single().ok_or_else(|| {
                    StoreError::invalid_timestamp(format!("epoch out of range: {}", secs))
                })
            }
            TimeSpec::Text(text) => parse_timestamp(text),
        }
    }

    /// Normalizes to epoch milliseconds, the storage representation.
    pub fn to_epoch_millis(&self) -> Result<i64, StoreError> {
        Ok(self.to_utc()?.timestamp_millis())
    }
}

impl From<DateTime<Utc>> for TimeSpec {
    fn from(t: DateTime<Utc>) -> Self {
        TimeSpec::Text(t.to_rfc3339())
    }
}

impl From<i64> for TimeSpec {
    fn from(secs: i64) -> Self {
        TimeSpec::Int(secs)
    }
}

/// Parses a timestamp string.
///
/// RFC 3339 first, then two naive spellings interpreted as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(StoreError::invalid_timestamp(format!(
        "unrecognized timestamp: '{}'",
        text
    )))
}

/// Converts epoch milliseconds back into a UTC timestamp.
pub fn from_epoch_millis(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::invalid_timestamp(format!("millis out of range: {}", millis)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_scalar_precedence() {
        assert_eq!(coerce_scalar(&serde_json::json!(42)), TagValue::Int(42));
        assert_eq!(coerce_scalar(&serde_json::json!(-7)), TagValue::Int(-7));
        assert_eq!(coerce_scalar(&serde_json::json!(1.5)), TagValue::Float(1.5));
        assert_eq!(
            coerce_scalar(&serde_json::json!("line-3")),
            TagValue::Str("line-3".to_string())
        );
        assert_eq!(coerce_scalar(&serde_json::json!(true)), TagValue::Bool(true));
        assert_eq!(coerce_scalar(&serde_json::Value::Null), TagValue::Null);
    }

    #[test]
    fn test_coerce_scalar_u64_beyond_i64() {
        // u64::MAX does not fit i64, falls through to float
        let raw = serde_json::json!(u64::MAX);
        match coerce_scalar(&raw) {
            TagValue::Float(f) => assert!(f > 0.0),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_scalar_structured_becomes_text() {
        let raw = serde_json::json!([1, 2, 3]);
        assert_eq!(coerce_scalar(&raw), TagValue::Str("[1,2,3]".to_string()));

        let raw = serde_json::json!({"a": 1});
        match coerce_scalar(&raw) {
            TagValue::Str(s) => assert!(s.contains("\"a\"")),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_str_precedence() {
        assert_eq!(coerce_str("42"), TagValue::Int(42));
        assert_eq!(coerce_str("-17"), TagValue::Int(-17));
        assert_eq!(coerce_str("1.5"), TagValue::Float(1.5));
        assert_eq!(coerce_str("1e3"), TagValue::Float(1000.0));
        assert_eq!(coerce_str("setpoint"), TagValue::Str("setpoint".to_string()));
        // Not in the precedence: booleans and padded numbers stay literal.
        assert_eq!(coerce_str("true"), TagValue::Str("true".to_string()));
        assert_eq!(coerce_str(" 42"), TagValue::Str(" 42".to_string()));
    }

    #[test]
    fn test_coerce_str_non_finite_stays_literal() {
        assert_eq!(coerce_str("NaN"), TagValue::Str("NaN".to_string()));
        assert_eq!(coerce_str("inf"), TagValue::Str("inf".to_string()));
    }

    #[test]
    fn test_coerce_float_non_finite() {
        assert_eq!(coerce_float(2.5), TagValue::Float(2.5));
        assert_eq!(coerce_float(f64::NAN), TagValue::Str("NaN".to_string()));
        assert_eq!(coerce_float(f64::INFINITY), TagValue::Str("inf".to_string()));
    }

    #[test]
    fn test_timespec_int() {
        let spec = TimeSpec::Int(1_700_000_000);
        let t = spec.to_utc().unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_timespec_float_fraction() {
        let spec = TimeSpec::Float(1_700_000_000.5);
        let t = spec.to_utc().unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
        assert_eq!(t.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_timespec_float_rejects_nan() {
        assert!(TimeSpec::Float(f64::NAN).to_utc().is_err());
        assert!(TimeSpec::Float(f64::INFINITY).to_utc().is_err());
    }

    #[test]
    fn test_timespec_text_rfc3339() {
        let spec = TimeSpec::Text("2023-11-14T22:13:20Z".to_string());
        let t = spec.to_utc().unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);

        // Offset form converts into UTC
        let spec = TimeSpec::Text("2023-11-15T07:13:20+09:00".to_string());
        assert_eq!(spec.to_utc().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_timespec_text_naive_is_utc() {
        let spec = TimeSpec::Text("2023-11-14 22:13:20".to_string());
        assert_eq!(spec.to_utc().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_timespec_text_garbage() {
        let spec = TimeSpec::Text("yesterday-ish".to_string());
        let err = spec.to_utc().unwrap_err();
        assert!(err.to_string().contains("yesterday-ish"));
    }

    #[test]
    fn test_timespec_untagged_deserialization() {
        let spec: TimeSpec = serde_json::from_str("1700000000").unwrap();
        assert_eq!(spec, TimeSpec::Int(1_700_000_000));

        let spec: TimeSpec = serde_json::from_str("1700000000.25").unwrap();
        assert_eq!(spec, TimeSpec::Float(1_700_000_000.25));

        let spec: TimeSpec = serde_json::from_str("\"2023-11-14T22:13:20Z\"").unwrap();
        assert_eq!(spec, TimeSpec::Text("2023-11-14T22:13:20Z".to_string()));
    }

    #[test]
    fn test_epoch_millis_round_trip() {
        let t = from_epoch_millis(1_700_000_000_500).unwrap();
        assert_eq!(t.timestamp_millis(), 1_700_000_000_500);

        let spec = TimeSpec::Int(1_700_000_000);
        assert_eq!(spec.to_epoch_millis().unwrap(), 1_700_000_000_000);
    }
}
