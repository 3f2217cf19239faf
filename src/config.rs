use serde::Deserialize;
use std::str::FromStr;

use crate::aggregator::{DEFAULT_FLUSH_THRESHOLD, FlushPolicy};
use crate::models::AlertRule;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
    /// Alert rules; the CPU > 80 rule when omitted.
    #[serde(default = "default_alerts")]
    pub alerts: Vec<AlertRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    #[serde(default)]
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
    /// Per-call timeout on appends from the pipeline.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_retention_days() -> u32 {
    7
}

fn default_prune_interval_secs() -> u64 {
    3600
}

fn default_vacuum_interval_secs() -> u64 {
    86_400
}

fn default_store_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Messages buffered per live subscriber before it lags.
    pub broadcast_capacity: usize,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

fn default_publish_timeout_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: u64,
    #[serde(default)]
    pub flush_policy: FlushPolicy,
    /// Container to sample: empty = host only, "*" = every running container.
    #[serde(default)]
    pub container_id: String,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,
    /// Batches waiting for the sinks before new ones are dropped.
    #[serde(default = "default_dispatch_queue_capacity")]
    pub dispatch_queue_capacity: usize,
    /// How often to log pipeline stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_sample_interval_secs() -> u64 {
    5
}

fn default_flush_threshold() -> u64 {
    DEFAULT_FLUSH_THRESHOLD
}

fn default_ledger_path() -> String {
    "metrics_log.csv".into()
}

fn default_dispatch_queue_capacity() -> usize {
    64
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

fn default_alerts() -> Vec<AlertRule> {
    vec![AlertRule::high_cpu()]
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.retention_days > 0,
            "database.retention_days must be > 0, got {}",
            self.database.retention_days
        );
        anyhow::ensure!(
            self.database.prune_interval_secs > 0,
            "database.prune_interval_secs must be > 0, got {}",
            self.database.prune_interval_secs
        );
        anyhow::ensure!(
            self.database.vacuum_interval_secs > 0,
            "database.vacuum_interval_secs must be > 0, got {}",
            self.database.vacuum_interval_secs
        );
        if let Some(ref schedule) = self.database.vacuum_schedule {
            cron::Schedule::from_str(schedule).map_err(|e| {
                anyhow::anyhow!("database.vacuum_schedule is not a valid cron expression: {}", e)
            })?;
        }
        anyhow::ensure!(
            self.database.store_timeout_ms > 0,
            "database.store_timeout_ms must be > 0, got {}",
            self.database.store_timeout_ms
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.publishing.publish_timeout_ms > 0,
            "publishing.publish_timeout_ms must be > 0, got {}",
            self.publishing.publish_timeout_ms
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_secs > 0,
            "monitoring.sample_interval_secs must be > 0, got {}",
            self.monitoring.sample_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.flush_threshold > 0,
            "monitoring.flush_threshold must be > 0, got {}",
            self.monitoring.flush_threshold
        );
        anyhow::ensure!(
            !self.monitoring.ledger_path.is_empty(),
            "monitoring.ledger_path must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.dispatch_queue_capacity > 0,
            "monitoring.dispatch_queue_capacity must be > 0, got {}",
            self.monitoring.dispatch_queue_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        for rule in &self.alerts {
            anyhow::ensure!(
                rule.threshold.is_finite(),
                "alerts: threshold for {} must be finite",
                rule.category
            );
            anyhow::ensure!(
                !rule.message.is_empty(),
                "alerts: message for {} must be non-empty",
                rule.category
            );
            anyhow::ensure!(
                rule.metric.as_deref().is_none_or(|m| !m.trim().is_empty()),
                "alerts: metric for {} must be non-empty when set",
                rule.category
            );
        }
        Ok(())
    }
}
