// Typed source snapshots, validated at the reader boundary.

use serde::{Deserialize, Serialize};

/// Host-wide resource usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshot {
    pub cpu_percent: f64,
    pub memory_used_mb: f64,
    pub disk_percent: f64,
}

/// Resource usage of one running container, computed from two successive counter reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSnapshot {
    pub id: String,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_usage_mb: f64,
    pub memory_percent: f64,
}
