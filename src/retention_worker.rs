// Store maintenance: prune records past retention on a fixed period, and VACUUM
// either at cron times (local time) or every vacuum_interval_secs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::metric_repo::MetricRepo;
use tracing::{info, instrument, warn};

/// Config for the retention worker.
#[derive(Debug, Clone)]
pub struct RetentionWorkerConfig {
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily).
    pub vacuum_schedule: Option<String>,
    /// Used when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

/// Spawns the retention worker. Returns a join handle.
pub fn spawn(repo: Arc<MetricRepo>, config: RetentionWorkerConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(repo, config).await;
    })
}

/// Time until the next VACUUM: the next cron fire when a schedule is given, else `interval`.
pub fn next_vacuum_in(schedule: Option<&cron::Schedule>, interval: Duration) -> Duration {
    let Some(schedule) = schedule else {
        return interval;
    };
    let now = chrono::Local::now();
    schedule
        .after(&now)
        .next()
        .and_then(|next| (next - now).to_std().ok())
        .unwrap_or(interval)
}

#[instrument(skip(repo), fields(interval_secs = config.prune_interval_secs))]
async fn run(repo: Arc<MetricRepo>, config: RetentionWorkerConfig) {
    let schedule = config.vacuum_schedule.as_deref().and_then(|raw| {
        cron::Schedule::from_str(raw)
            .inspect_err(|e| {
                warn!(cron = %raw, error = %e, "invalid vacuum_schedule; using vacuum_interval_secs")
            })
            .ok()
    });
    let vacuum_interval = Duration::from_secs(config.vacuum_interval_secs);

    let mut prune_interval = tokio::time::interval(Duration::from_secs(config.prune_interval_secs));
    prune_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let vacuum_at = tokio::time::sleep(next_vacuum_in(schedule.as_ref(), vacuum_interval));
    tokio::pin!(vacuum_at);

    loop {
        tokio::select! {
            _ = prune_interval.tick() => {
                run_prune(&repo).await;
            }
            _ = &mut vacuum_at => {
                match repo.vacuum().await {
                    Ok(()) => info!("vacuum complete"),
                    Err(e) => warn!(error = %e, operation = "vacuum", "vacuum failed"),
                }
                let delay = next_vacuum_in(schedule.as_ref(), vacuum_interval);
                vacuum_at.as_mut().reset(tokio::time::Instant::now() + delay);
            }
        }
    }
}

/// One prune pass; failures are logged and retried on the next tick.
pub async fn run_prune(repo: &MetricRepo) {
    match repo.prune_old_data().await {
        Ok(0) => {}
        Ok(n) => info!(pruned = n, "old metrics pruned"),
        Err(e) => warn!(error = %e, operation = "prune_old_data", "Failed to prune old data"),
    }
}
