// Sampler loop: Idle -> Sampling -> Dispatching -> Idle on a fixed period.
// Aggregation state lives in this task only. Delivery runs in a dedicated dispatcher
// task fed through a bounded channel; a full channel drops the batch instead of stalling.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, interval, timeout};
use tracing::Instrument;

use crate::aggregator::{Aggregator, Flush, FlushPolicy};
use crate::alerts::AlertEvaluator;
use crate::error::CollectionError;
use crate::fanout::{Dispatch, FanOut};
use crate::ledger::Ledger;
use crate::models::{AlertEvent, AlertRule, Reading};
use crate::readers::SourceReader;
use crate::stats::PipelineStats;

/// Upper bound on one ledger append; the ledger is a local file.
const LEDGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Readers, sinks and shutdown for the sampler.
pub struct SamplerDeps {
    pub readers: Vec<Arc<dyn SourceReader>>,
    pub fanout: Arc<FanOut>,
    pub ledger: Ledger,
    pub stats: Arc<PipelineStats>,
    pub live_subscribers: Arc<AtomicUsize>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Sampler timing, aggregation and alerting config.
pub struct SamplerConfig {
    /// Tick period; also the per-reader timeout.
    pub sample_interval: Duration,
    pub flush_threshold: u64,
    pub flush_policy: FlushPolicy,
    pub alert_rules: Vec<AlertRule>,
    pub dispatch_queue_capacity: usize,
    pub stats_log_interval: Duration,
}

/// Everything one tick produced, before dispatch.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub timestamp: Option<DateTime<Utc>>,
    pub readings: Vec<Reading>,
    pub alerts: Vec<AlertEvent>,
    pub flushes: Vec<Flush>,
    pub failures: Vec<CollectionError>,
}

/// What the dispatcher delivers for one tick.
#[derive(Debug, Default)]
pub struct DispatchBatch {
    pub items: Vec<Dispatch>,
    pub flushes: Vec<Flush>,
}

impl TickOutput {
    /// Raw readings first, then alerts, then aggregated readings.
    pub fn into_batch(self) -> DispatchBatch {
        let mut items = Vec::with_capacity(
            self.readings.len()
                + self.alerts.len()
                + self.flushes.iter().map(|f| f.readings.len()).sum::<usize>(),
        );
        items.extend(self.readings.into_iter().map(Dispatch::Reading));
        items.extend(self.alerts.into_iter().map(Dispatch::Alert));
        for f in &self.flushes {
            items.extend(f.readings.iter().cloned().map(Dispatch::Aggregated));
        }
        DispatchBatch {
            items,
            flushes: self.flushes,
        }
    }
}

/// Runs every reader concurrently, each bounded by `reader_timeout`.
/// A failed reader contributes no readings; the others are unaffected.
pub async fn collect_readings(
    readers: &[Arc<dyn SourceReader>],
    reader_timeout: Duration,
    timestamp: DateTime<Utc>,
) -> (Vec<Reading>, Vec<CollectionError>) {
    let timeout_ms = reader_timeout.as_millis() as u64;
    let results = join_all(readers.iter().map(|reader| async move {
        match timeout(reader_timeout, reader.read()).await {
            Ok(result) => result,
            Err(_) => Err(CollectionError::Timeout {
                source_name: reader.source(),
                timeout_ms,
            }),
        }
    }))
    .await;

    let mut readings = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(snapshots) => {
                for snapshot in snapshots {
                    readings.extend(snapshot.into_readings(timestamp));
                }
            }
            Err(e) => failures.push(e),
        }
    }
    (readings, failures)
}

/// One Sampling step: collect, then hand each reading in order to the aggregator and the evaluator.
pub async fn run_tick(
    readers: &[Arc<dyn SourceReader>],
    reader_timeout: Duration,
    aggregator: &mut Aggregator,
    evaluator: &AlertEvaluator,
) -> TickOutput {
    let timestamp = Utc::now();
    let (readings, failures) = collect_readings(readers, reader_timeout, timestamp).await;
    for e in &failures {
        tracing::warn!(
            error = %e,
            source = e.source_name(),
            timestamp = %timestamp,
            operation = "collect",
            "reader failed; its readings are skipped this tick"
        );
    }

    let mut alerts = Vec::new();
    let mut flushes = Vec::new();
    for reading in &readings {
        if let Some(flush) = aggregator.accumulate(reading) {
            tracing::info!(
                categories = flush.readings.len(),
                timestamp = %flush.timestamp,
                "aggregation window flushed"
            );
            flushes.push(flush);
        }
        if let Some(alert) = evaluator.evaluate(reading) {
            tracing::info!(category = %alert.category, message = %alert.message, "alert raised");
            alerts.push(alert);
        }
    }

    TickOutput {
        timestamp: Some(timestamp),
        readings,
        alerts,
        flushes,
        failures,
    }
}

/// Spawns the task that delivers batches to the fan-out and the ledger.
/// Exits after draining when the sampler drops its sender.
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<DispatchBatch>,
    fanout: Arc<FanOut>,
    ledger: Ledger,
    stats: Arc<PipelineStats>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            fanout.dispatch_all(&batch.items).await;
            for flush in &batch.flushes {
                let result = timeout(LEDGER_TIMEOUT, ledger.append(flush)).await;
                let err = match result {
                    Ok(Ok(_)) => continue,
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => format!("timed out after {} ms", LEDGER_TIMEOUT.as_millis()),
                };
                PipelineStats::add(&stats.ledger_failures, 1);
                tracing::warn!(
                    error = %err,
                    operation = "ledger_append",
                    path = %ledger.path().display(),
                    timestamp = %flush.timestamp,
                    "ledger append failed"
                );
            }
        }
        tracing::debug!("Dispatcher shutting down");
    })
}

pub fn spawn(deps: SamplerDeps, config: SamplerConfig) -> tokio::task::JoinHandle<()> {
    let SamplerDeps {
        readers,
        fanout,
        ledger,
        stats,
        live_subscribers,
        mut shutdown_rx,
    } = deps;
    let SamplerConfig {
        sample_interval,
        flush_threshold,
        flush_policy,
        alert_rules,
        dispatch_queue_capacity,
        stats_log_interval,
    } = config;

    let sampler_span = tracing::span!(
        tracing::Level::DEBUG,
        "sampler",
        sample_interval_ms = sample_interval.as_millis() as u64
    );

    let task = async move {
        let (batch_tx, batch_rx) = mpsc::channel(dispatch_queue_capacity.max(1));
        let dispatcher = spawn_dispatcher(batch_rx, fanout, ledger, stats.clone());

        let mut aggregator = Aggregator::new(flush_threshold, flush_policy);
        let evaluator = AlertEvaluator::new(alert_rules);

        let mut tick = interval(sample_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First stats tick fires immediately; skip it.
        stats_log_tick.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::debug!("Sampler shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let output = tokio::select! {
                        biased;
                        _ = &mut shutdown_rx => {
                            tracing::debug!("Sampler shutting down; in-flight tick abandoned");
                            break;
                        }
                        output = run_tick(&readers, sample_interval, &mut aggregator, &evaluator) => output,
                    };

                    PipelineStats::add(&stats.ticks, 1);
                    PipelineStats::add(&stats.readings, output.readings.len() as u64);
                    PipelineStats::add(&stats.reader_failures, output.failures.len() as u64);
                    PipelineStats::add(&stats.alerts, output.alerts.len() as u64);
                    PipelineStats::add(&stats.flushes, output.flushes.len() as u64);

                    let batch = output.into_batch();
                    if batch.items.is_empty() {
                        continue;
                    }
                    match batch_tx.try_send(batch) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(dropped)) => {
                            PipelineStats::add(&stats.batches_dropped, 1);
                            tracing::warn!(
                                items = dropped.items.len(),
                                operation = "dispatch",
                                "sinks are behind; dropping this tick's batch"
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            tracing::warn!(operation = "dispatch", "dispatcher channel closed");
                        }
                    }
                }
                _ = stats_log_tick.tick() => {
                    stats.log(live_subscribers.load(Ordering::Relaxed));
                }
            }
        }

        drop(batch_tx);
        if let Err(e) = dispatcher.await {
            tracing::warn!(error = %e, "dispatcher task failed");
        }
    };
    tokio::spawn(task.instrument(sampler_span))
}
