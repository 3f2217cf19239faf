// Fan-out sink: every item goes to the broadcast channel and the persistence gateway
// as two independent calls, each bounded by its own timeout. No retry, no rollback.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant, timeout};

use crate::error::{StoreError, TransportError};
use crate::models::{AggregatedReading, AlertEvent, Category, MetricRecord, Reading};
use crate::stats::PipelineStats;

pub const TOPIC_METRIC_UPDATE: &str = "ReceiveMetricUpdate";
pub const TOPIC_ALERT: &str = "Alert";

/// Rate limit for the "no subscribers" debug line.
const NO_SUBSCRIBERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Live-update transport.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), TransportError>;
}

/// Persistence gateway. The pipeline only appends; queries serve the HTTP layer.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn append(&self, reading: &Reading) -> Result<(), StoreError>;
    async fn query(&self, category: Option<&Category>) -> Result<Vec<MetricRecord>, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reading(Reading),
    Aggregated(AggregatedReading),
    Alert(AlertEvent),
}

impl Dispatch {
    pub fn topic(&self) -> &'static str {
        match self {
            Dispatch::Reading(_) | Dispatch::Aggregated(_) => TOPIC_METRIC_UPDATE,
            Dispatch::Alert(_) => TOPIC_ALERT,
        }
    }

    /// Broadcast arguments: `[name, value]` for metric updates, `[message]` for alerts.
    pub fn payload(&self) -> Value {
        match self {
            Dispatch::Reading(r) => json!([label(&r.name, r.entity.as_deref()), r.display_value()]),
            Dispatch::Aggregated(a) => {
                json!([label(&a.name, a.entity.as_deref()), a.display_value()])
            }
            Dispatch::Alert(e) => json!([e.message]),
        }
    }

    pub fn record(&self) -> Reading {
        match self {
            Dispatch::Reading(r) => r.clone(),
            Dispatch::Aggregated(a) => a.to_reading(),
            Dispatch::Alert(e) => e.to_reading(),
        }
    }

    pub fn category(&self) -> &Category {
        match self {
            Dispatch::Reading(r) => &r.category,
            Dispatch::Aggregated(a) => &a.category,
            Dispatch::Alert(e) => &e.category,
        }
    }
}

fn label(name: &str, entity: Option<&str>) -> String {
    match entity {
        Some(e) => format!("{} ({})", name, e),
        None => name.to_string(),
    }
}

/// Result of one dispatch, per destination.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub broadcast: Result<(), TransportError>,
    pub persistence: Result<(), StoreError>,
}

pub struct FanOut {
    broadcaster: Arc<dyn Broadcaster>,
    store: Arc<dyn MetricStore>,
    publish_timeout: Duration,
    store_timeout: Duration,
    stats: Arc<PipelineStats>,
    last_no_subscribers_log: Mutex<Option<Instant>>,
}

impl FanOut {
    pub fn new(
        broadcaster: Arc<dyn Broadcaster>,
        store: Arc<dyn MetricStore>,
        publish_timeout: Duration,
        store_timeout: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            broadcaster,
            store,
            publish_timeout,
            store_timeout,
            stats,
            last_no_subscribers_log: Mutex::new(None),
        }
    }

    pub async fn dispatch(&self, item: &Dispatch) -> DispatchOutcome {
        let publish_ms = self.publish_timeout.as_millis() as u64;
        let store_ms = self.store_timeout.as_millis() as u64;

        let publish = async {
            timeout(
                self.publish_timeout,
                self.broadcaster.publish(item.topic(), item.payload()),
            )
            .await
            .unwrap_or(Err(TransportError::Timeout(publish_ms)))
        };
        let record = item.record();
        let persist = async {
            timeout(self.store_timeout, self.store.append(&record))
                .await
                .unwrap_or(Err(StoreError::Timeout(store_ms)))
        };
        let (broadcast, persistence) = tokio::join!(publish, persist);

        match &broadcast {
            Ok(()) => {}
            Err(TransportError::NoSubscribers) => self.log_no_subscribers(),
            Err(e) => {
                PipelineStats::add(&self.stats.broadcast_failures, 1);
                tracing::warn!(
                    error = %e,
                    operation = "publish",
                    topic = item.topic(),
                    category = %item.category(),
                    timestamp = %record.timestamp,
                    "broadcast failed"
                );
            }
        }
        if let Err(e) = &persistence {
            PipelineStats::add(&self.stats.store_failures, 1);
            tracing::warn!(
                error = %e,
                operation = "append",
                category = %item.category(),
                timestamp = %record.timestamp,
                "persistence failed"
            );
        }

        DispatchOutcome {
            broadcast,
            persistence,
        }
    }

    /// Dispatches items in order; each item still reaches both destinations independently.
    pub async fn dispatch_all(&self, items: &[Dispatch]) -> Vec<DispatchOutcome> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.dispatch(item).await);
        }
        out
    }

    fn log_no_subscribers(&self) {
        let Ok(mut last) = self.last_no_subscribers_log.lock() else {
            return;
        };
        if last.is_none_or(|t| t.elapsed() >= NO_SUBSCRIBERS_LOG_INTERVAL) {
            tracing::debug!(
                operation = "publish",
                "No live subscribers; broadcast channel has no receivers"
            );
            *last = Some(Instant::now());
        }
    }
}
