// Two-decimal rendering for transport and storage. Values stay f64 in memory.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Renders a metric value the way it travels on the wire and sits in the store ("95.00").
pub fn format_value(value: f64) -> String {
    format!("{:.2}", value)
}

/// Parses a stored or posted value; accepts "95.00", "95" and surrounding whitespace.
pub fn parse_value(raw: &str) -> Result<f64, std::num::ParseFloatError> {
    raw.trim().trim_end_matches('%').trim().parse::<f64>()
}

/// `#[serde(with = "two_decimals")]`: serializes as a fixed two-decimal string,
/// deserializes from either a string or a JSON number.
pub mod two_decimals {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_value(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => parse_value(&s)
                .map_err(|e| D::Error::custom(format!("invalid metric value {:?}: {}", s, e))),
        }
    }
}
