//! The sample type carried through the pipeline and the reading classifier.
//!
//! A balance in PRINTER or HOST mode emits lines like `"    12.34 g"`; the
//! emission regex captures the (possibly negative) numeric value and the
//! short trailing unit token. Synthetic sources emit plain numbers with no
//! unit. Both the instrument source and the persistence worker classify
//! readings through [`classify`] so they always agree on the format.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppResult, DaqError};

/// Sentinel unit recorded when a reading carries no recognizable unit.
pub const UNKNOWN_UNIT: &str = "unknownUnit";

/// Captures a numeric value followed by a 1-4 letter unit token at the end
/// of a reading, e.g. `"-0.05 mg"`.
pub static EMISSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    let re = Regex::new(r"(?P<value>-?[\d]*[\.]?[\d]+)\s?(?P<unit>[a-zA-Z]{1,4}$)")
        .expect("emission regex is valid");
    re
});

/// The payload of one sample as produced by a source.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A plain numeric value (synthetic and replay sources).
    Value(f64),
    /// A raw text reading still carrying its unit (instrument sources).
    Text(String),
}

/// A single sample captured from a source. Immutable once produced.
#[derive(Clone, Debug)]
pub struct Sample {
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// Builds a numeric sample stamped with the current time.
    pub fn value(v: f64) -> Self {
        Self {
            payload: Payload::Value(v),
            timestamp: Utc::now(),
        }
    }

    /// Builds a text sample stamped with the current time.
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            payload: Payload::Text(s.into()),
            timestamp: Utc::now(),
        }
    }
}

/// A classified reading: the numeric value and its unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: String,
}

/// Classifies a sample payload into a value and unit.
///
/// Numeric payloads pass through with the [`UNKNOWN_UNIT`] sentinel; text
/// payloads are matched against [`EMISSION_REGEX`]. A text payload that
/// fails the match is an error the caller is expected to log and drop.
pub fn classify(payload: &Payload) -> AppResult<Reading> {
    match payload {
        Payload::Value(v) => Ok(Reading {
            value: *v,
            unit: UNKNOWN_UNIT.to_string(),
        }),
        Payload::Text(s) => {
            let caps = EMISSION_REGEX
                .captures(s)
                .ok_or_else(|| DaqError::Classification(s.clone()))?;
            let value: f64 = caps["value"]
                .parse()
                .map_err(|_| DaqError::Classification(s.clone()))?;
            Ok(Reading {
                value,
                unit: caps["unit"].to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_balance_reading() {
        let r = classify(&Payload::Text("     12.34 g".into())).unwrap();
        assert_eq!(r.value, 12.34);
        assert_eq!(r.unit, "g");
    }

    #[test]
    fn classifies_negative_reading_without_space() {
        let r = classify(&Payload::Text("-0.05mg".into())).unwrap();
        assert_eq!(r.value, -0.05);
        assert_eq!(r.unit, "mg");
    }

    #[test]
    fn numeric_payload_gets_sentinel_unit() {
        let r = classify(&Payload::Value(0.5)).unwrap();
        assert_eq!(r.value, 0.5);
        assert_eq!(r.unit, UNKNOWN_UNIT);
    }

    #[test]
    fn unmatched_text_is_an_error() {
        let err = classify(&Payload::Text("ERR 4".into()));
        assert!(matches!(err, Err(DaqError::Classification(_))));
    }

    #[test]
    fn trailing_garbage_fails_the_match() {
        // Unit token must terminate the line.
        assert!(classify(&Payload::Text("12.34 g extra".into())).is_err());
    }
}
