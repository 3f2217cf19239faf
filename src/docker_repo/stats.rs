// Typed conversion of a raw Docker stats response into a ContainerSnapshot.

use crate::error::CollectionError;
use crate::models::ContainerSnapshot;
use bollard::models::ContainerStatsResponse;

const SOURCE: &str = "docker";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn malformed(reason: impl Into<String>) -> CollectionError {
    CollectionError::Malformed {
        source_name: SOURCE,
        reason: reason.into(),
    }
}

/// Converts one stats response (current + previous CPU counters) into a snapshot.
/// Missing counter blocks are malformed provider output, not a zero reading.
pub(crate) fn process_statistics(
    s: &ContainerStatsResponse,
    id: &str,
    name: &str,
) -> Result<ContainerSnapshot, CollectionError> {
    let cpu_stats = s
        .cpu_stats
        .as_ref()
        .ok_or_else(|| malformed(format!("{}: missing cpu_stats", name)))?;
    let precpu_stats = s
        .precpu_stats
        .as_ref()
        .ok_or_else(|| malformed(format!("{}: missing precpu_stats", name)))?;
    let cpu_usage = cpu_stats
        .cpu_usage
        .as_ref()
        .ok_or_else(|| malformed(format!("{}: missing cpu_usage", name)))?;
    let precpu_usage = precpu_stats
        .cpu_usage
        .as_ref()
        .ok_or_else(|| malformed(format!("{}: missing precpu cpu_usage", name)))?;

    let cpu_delta =
        cpu_usage.total_usage.unwrap_or(0) as i64 - precpu_usage.total_usage.unwrap_or(0) as i64;
    let system_delta = cpu_stats.system_cpu_usage.unwrap_or(0) as i64
        - precpu_stats.system_cpu_usage.unwrap_or(0) as i64;
    let online = cpu_stats
        .online_cpus
        .filter(|n| *n > 0)
        .or_else(|| {
            cpu_usage
                .percpu_usage
                .as_ref()
                .map(|p| p.len() as u32)
                .filter(|n| *n > 0)
        })
        .unwrap_or(1) as f64;
    let cpu_percent = if system_delta > 0 && cpu_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * online * 100.0
    } else {
        0.0
    };

    let memory = s
        .memory_stats
        .as_ref()
        .ok_or_else(|| malformed(format!("{}: missing memory_stats", name)))?;
    let usage = memory.usage.unwrap_or(0);
    // Page cache is reclaimable; `docker stats` excludes it too (cgroup v2 / v1 key).
    let cache = memory
        .stats
        .as_ref()
        .and_then(|m| m.get("inactive_file").or_else(|| m.get("total_inactive_file")))
        .copied()
        .unwrap_or(0);
    let used = usage.saturating_sub(cache);
    let limit = memory.limit.unwrap_or(0);
    let memory_percent = if limit > 0 {
        (used as f64 / limit as f64) * 100.0
    } else {
        0.0
    };

    Ok(ContainerSnapshot {
        id: id.to_string(),
        name: name.to_string(),
        cpu_percent,
        memory_usage_mb: used as f64 / BYTES_PER_MB,
        memory_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerCpuStats, ContainerCpuUsage, ContainerMemoryStats};
    use std::collections::HashMap;

    fn minimal_cpu_stats(total_usage: u64, system_cpu_usage: u64) -> ContainerCpuStats {
        ContainerCpuStats {
            cpu_usage: Some(ContainerCpuUsage {
                total_usage: Some(total_usage),
                ..Default::default()
            }),
            system_cpu_usage: Some(system_cpu_usage),
            online_cpus: Some(2),
            throttling_data: None,
        }
    }

    fn memory(usage: u64, limit: u64) -> ContainerMemoryStats {
        ContainerMemoryStats {
            usage: Some(usage),
            limit: Some(limit),
            ..Default::default()
        }
    }

    #[test]
    fn process_statistics_rejects_missing_cpu_stats() {
        let s = ContainerStatsResponse {
            cpu_stats: None,
            precpu_stats: Some(minimal_cpu_stats(0, 0)),
            memory_stats: Some(memory(1, 2)),
            ..Default::default()
        };
        let err = process_statistics(&s, "id", "name").unwrap_err();
        assert!(matches!(err, CollectionError::Malformed { .. }));
    }

    #[test]
    fn process_statistics_rejects_missing_precpu_stats() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 1000)),
            precpu_stats: None,
            memory_stats: Some(memory(1, 2)),
            ..Default::default()
        };
        assert!(process_statistics(&s, "id", "name").is_err());
    }

    #[test]
    fn process_statistics_rejects_missing_memory_stats() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 1000)),
            precpu_stats: Some(minimal_cpu_stats(50, 500)),
            memory_stats: None,
            ..Default::default()
        };
        assert!(process_statistics(&s, "id", "name").is_err());
    }

    #[test]
    fn process_statistics_computes_cpu_and_memory_percent() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100_000_000, 1_000_000_000)),
            precpu_stats: Some(minimal_cpu_stats(50_000_000, 500_000_000)),
            memory_stats: Some(memory(256 * 1024 * 1024, 512 * 1024 * 1024)),
            ..Default::default()
        };
        let out = process_statistics(&s, "abc123", "web").unwrap();
        assert_eq!(out.id, "abc123");
        assert_eq!(out.name, "web");
        // (50M / 500M) * 2 cpus * 100
        assert!((out.cpu_percent - 20.0).abs() < 0.01);
        assert!((out.memory_percent - 50.0).abs() < 0.01);
        assert!((out.memory_usage_mb - 256.0).abs() < 0.01);
    }

    #[test]
    fn process_statistics_excludes_inactive_file_cache() {
        let mut m = memory(300 * 1024 * 1024, 1024 * 1024 * 1024);
        m.stats = Some(HashMap::from([(
            "inactive_file".to_string(),
            44 * 1024 * 1024,
        )]));
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 1000)),
            precpu_stats: Some(minimal_cpu_stats(50, 500)),
            memory_stats: Some(m),
            ..Default::default()
        };
        let out = process_statistics(&s, "id", "n").unwrap();
        assert!((out.memory_usage_mb - 256.0).abs() < 0.01);
        assert!((out.memory_percent - 25.0).abs() < 0.01);
    }

    #[test]
    fn process_statistics_zero_system_delta_returns_zero_cpu_percent() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(minimal_cpu_stats(100, 500)),
            precpu_stats: Some(minimal_cpu_stats(50, 500)),
            memory_stats: Some(memory(0, 0)),
            ..Default::default()
        };
        let out = process_statistics(&s, "id", "n").unwrap();
        assert_eq!(out.cpu_percent, 0.0);
        assert_eq!(out.memory_percent, 0.0);
    }
}
