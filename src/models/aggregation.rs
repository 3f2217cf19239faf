// AggregatedReading: the mean of one flushed window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::{Category, Reading};
use super::value::{format_value, two_decimals};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReading {
    pub name: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Arithmetic mean over the window.
    #[serde(with = "two_decimals")]
    pub value: f64,
    pub sample_count: u64,
    pub window_start: DateTime<Utc>,
    /// Timestamp of the reading that triggered the flush.
    pub timestamp: DateTime<Utc>,
}

impl AggregatedReading {
    pub fn display_value(&self) -> String {
        format_value(self.value)
    }

    /// Record shape handed to the persistence gateway.
    pub fn to_reading(&self) -> Reading {
        Reading {
            name: self.name.clone(),
            category: self.category.clone(),
            value: self.value,
            timestamp: self.timestamp,
            entity: self.entity.clone(),
        }
    }
}
