// Host source reader via sysinfo

use crate::error::CollectionError;
use crate::models::HostSnapshot;
use crate::readers::{Snapshot, SourceReader};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use sysinfo::{Disks, System};
use tracing::instrument;

const SOURCE: &str = "host";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct SysinfoRepo {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    last_cpu_refresh: Arc<Mutex<Option<(Instant, f64)>>>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();
        let disks = Disks::new_with_refreshed_list();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(disks)),
            last_cpu_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// CPU percent, memory used (MB) and disk used (%) across all mounted disks.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "sample"))]
    pub async fn sample(&self) -> Result<HostSnapshot, CollectionError> {
        let sys = self.sys.clone();
        let disks = self.disks.clone();
        let last_cpu_refresh = self.last_cpu_refresh.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys.lock().map_err(|e| CollectionError::Unavailable {
                source_name: SOURCE,
                reason: format!("sysinfo lock poisoned: {}", e),
            })?;

            let now = Instant::now();
            let cpu_percent = match last_cpu_refresh.lock() {
                Ok(mut guard) => match *guard {
                    // Refreshing faster than the sysinfo minimum gives meaningless deltas.
                    Some((prev_ts, prev_usage))
                        if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
                    {
                        prev_usage
                    }
                    _ => {
                        sys.refresh_cpu_all();
                        let usage = sys.global_cpu_usage() as f64;
                        *guard = Some((now, usage));
                        usage
                    }
                },
                Err(_) => {
                    sys.refresh_cpu_all();
                    sys.global_cpu_usage() as f64
                }
            };

            sys.refresh_memory();
            let total = sys.total_memory();
            let used = total.saturating_sub(sys.available_memory());

            let mut disks = disks.lock().map_err(|e| CollectionError::Unavailable {
                source_name: SOURCE,
                reason: format!("sysinfo disks lock poisoned: {}", e),
            })?;
            disks.refresh(false);
            let (disk_total, disk_available) = disks
                .list()
                .iter()
                .fold((0u64, 0u64), |(t, a), d| {
                    (t + d.total_space(), a + d.available_space())
                });
            let disk_percent = if disk_total > 0 {
                (disk_total.saturating_sub(disk_available) as f64 / disk_total as f64) * 100.0
            } else {
                0.0
            };

            Ok(HostSnapshot {
                cpu_percent: cpu_percent.clamp(0.0, 100.0),
                memory_used_mb: used as f64 / BYTES_PER_MB,
                disk_percent,
            })
        })
        .await
        .map_err(|e| CollectionError::Join {
            source_name: SOURCE,
            reason: e.to_string(),
        })?
    }
}

#[async_trait]
impl SourceReader for SysinfoRepo {
    fn source(&self) -> &'static str {
        SOURCE
    }

    async fn read(&self) -> Result<Vec<Snapshot>, CollectionError> {
        Ok(vec![Snapshot::Host(self.sample().await?)])
    }
}
