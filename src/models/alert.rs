// Alert rules (static config) and the events they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::{Category, Reading};
use super::value::{format_value, two_decimals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Lt => value < threshold,
            Comparator::Le => value <= threshold,
        }
    }
}

/// Message placeholders: `{value}`, `{threshold}`, `{category}`, `{entity}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub category: Category,
    /// Restricts the rule to one metric name within the category; all metrics when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    pub threshold: f64,
    pub comparator: Comparator,
    pub message: String,
}

impl AlertRule {
    /// CPU above 80 percent.
    pub fn high_cpu() -> Self {
        Self {
            category: Category::Cpu,
            metric: None,
            threshold: 80.0,
            comparator: Comparator::Gt,
            message: "High CPU Usage Detected: {value}%".to_string(),
        }
    }

    pub fn applies_to(&self, reading: &Reading) -> bool {
        reading.category == self.category
            && self.metric.as_deref().is_none_or(|m| m == reading.name)
    }

    pub fn render(&self, reading: &Reading) -> String {
        self.message
            .replace("{value}", &format_value(reading.value))
            .replace("{threshold}", &format_value(self.threshold))
            .replace("{category}", reading.category.as_str())
            .replace("{entity}", reading.entity.as_deref().unwrap_or("host"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub category: Category,
    #[serde(with = "two_decimals")]
    pub observed_value: f64,
    #[serde(with = "two_decimals")]
    pub threshold: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl AlertEvent {
    /// Record shape handed to the persistence gateway: category "Alert", name = message.
    pub fn to_reading(&self) -> Reading {
        Reading {
            name: self.message.clone(),
            category: Category::Alert,
            value: self.observed_value,
            timestamp: self.timestamp,
            entity: self.entity.clone(),
        }
    }
}
