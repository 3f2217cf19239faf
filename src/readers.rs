// Source reader seam: anything that can produce snapshots on demand.
// The sampler owns the readers and converts their snapshots into readings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CollectionError;
use crate::models::{Category, ContainerSnapshot, HostSnapshot, Reading};

pub const CPU_USAGE: &str = "CPU Usage";
pub const MEMORY_USAGE: &str = "Memory Usage";
pub const DISK_USAGE: &str = "Disk Usage";
pub const CONTAINER_CPU_USAGE: &str = "Container CPU Usage";
pub const CONTAINER_MEMORY_USAGE: &str = "Container Memory Usage";

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Host(HostSnapshot),
    Container(ContainerSnapshot),
}

impl Snapshot {
    /// Named readings for one snapshot; all carry the tick's capture timestamp.
    pub fn into_readings(self, timestamp: DateTime<Utc>) -> Vec<Reading> {
        match self {
            Snapshot::Host(h) => vec![
                Reading::new(CPU_USAGE, Category::Cpu, h.cpu_percent, timestamp),
                Reading::new(MEMORY_USAGE, Category::Memory, h.memory_used_mb, timestamp),
                Reading::new(DISK_USAGE, Category::Disk, h.disk_percent, timestamp),
            ],
            Snapshot::Container(c) => vec![
                Reading::new(
                    CONTAINER_CPU_USAGE,
                    Category::Container,
                    c.cpu_percent,
                    timestamp,
                )
                .with_entity(c.name.clone()),
                Reading::new(
                    CONTAINER_MEMORY_USAGE,
                    Category::Container,
                    c.memory_percent,
                    timestamp,
                )
                .with_entity(c.name),
            ],
        }
    }
}

#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Short name used in logs ("host", "docker").
    fn source(&self) -> &'static str;

    /// One round of snapshots. An empty vec is a valid answer (nothing to sample).
    async fn read(&self) -> Result<Vec<Snapshot>, CollectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_snapshot_yields_cpu_memory_disk_with_shared_timestamp() {
        let ts = Utc::now();
        let readings = Snapshot::Host(HostSnapshot {
            cpu_percent: 12.5,
            memory_used_mb: 2048.0,
            disk_percent: 40.0,
        })
        .into_readings(ts);
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].category, Category::Cpu);
        assert_eq!(readings[1].category, Category::Memory);
        assert_eq!(readings[2].category, Category::Disk);
        assert!(readings.iter().all(|r| r.timestamp == ts));
        assert!(readings.iter().all(|r| r.entity.is_none()));
    }

    #[test]
    fn container_snapshot_readings_carry_entity() {
        let readings = Snapshot::Container(ContainerSnapshot {
            id: "abc".into(),
            name: "web".into(),
            cpu_percent: 3.0,
            memory_usage_mb: 64.0,
            memory_percent: 12.5,
        })
        .into_readings(Utc::now());
        assert_eq!(readings.len(), 2);
        assert!(
            readings
                .iter()
                .all(|r| r.entity.as_deref() == Some("web") && r.category == Category::Container)
        );
        assert_eq!(readings[1].value, 12.5);
    }
}
