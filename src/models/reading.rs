// Reading: one timestamped, categorized observation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::{format_value, two_decimals};

/// Classification key used for aggregation, alerting and routing. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Cpu,
    Memory,
    Disk,
    System,
    Container,
    Alert,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Cpu => "CPU",
            Category::Memory => "Memory",
            Category::Disk => "Disk",
            Category::System => "System",
            Category::Container => "Container",
            Category::Alert => "Alert",
            Category::Other(s) => s,
        }
    }

    /// Parses a category name. Returns None for an empty or blank name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Some(match s {
            "CPU" => Category::Cpu,
            "Memory" => Category::Memory,
            "Disk" => Category::Disk,
            "System" => Category::System,
            "Container" => Category::Container,
            "Alert" => Category::Alert,
            other => Category::Other(other.to_string()),
        })
    }

    /// CPU, Memory and Disk: the host categories that make up the synthetic "System" scope.
    pub fn is_system_scope(&self) -> bool {
        matches!(self, Category::Cpu | Category::Memory | Category::Disk)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Category::parse(&s).ok_or_else(|| "category must be non-empty".to_string())
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub name: String,
    pub category: Category,
    #[serde(with = "two_decimals")]
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl Reading {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            value,
            timestamp,
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn display_value(&self) -> String {
        format_value(self.value)
    }
}

/// A reading as held by the persistence gateway (adds the store-assigned id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub id: i64,
    pub name: String,
    pub category: Category,
    #[serde(with = "two_decimals")]
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl MetricRecord {
    pub fn into_reading(self) -> Reading {
        Reading {
            name: self.name,
            category: self.category,
            value: self.value,
            timestamp: self.timestamp,
            entity: self.entity,
        }
    }
}
