// Rolling per-category averages. Owned by the sampler task; nothing else mutates it.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::models::{AggregatedReading, Category, Reading};

pub const DEFAULT_FLUSH_THRESHOLD: u64 = 50;

/// When windows flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Host CPU/Memory/Disk count as one synthetic "System" window: once all of them hold
    /// the threshold, every non-empty window (containers included) flushes in one event.
    #[default]
    Combined,
    /// Each window flushes on its own count.
    PerCategory,
}

/// Windows are per metric within a category, and per entity for container-scoped readings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey {
    pub category: Category,
    pub entity: Option<String>,
    pub metric: String,
}

impl WindowKey {
    pub fn of(reading: &Reading) -> Self {
        Self {
            category: reading.category.clone(),
            entity: reading.entity.clone(),
            metric: reading.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationWindow {
    pub name: String,
    pub sum: f64,
    pub count: u64,
    pub window_start: Option<DateTime<Utc>>,
}

impl AggregationWindow {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sum: 0.0,
            count: 0,
            window_start: None,
        }
    }

    fn add(&mut self, reading: &Reading) {
        if self.count == 0 {
            self.window_start = Some(reading.timestamp);
        }
        self.sum += reading.value;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
        self.window_start = None;
    }
}

/// One flush event: the aggregated readings emitted together.
#[derive(Debug, Clone, PartialEq)]
pub struct Flush {
    pub timestamp: DateTime<Utc>,
    pub readings: Vec<AggregatedReading>,
}

impl Flush {
    /// Host-wide average for a category, if it was part of this flush.
    pub fn host_average(&self, category: &Category) -> Option<f64> {
        self.readings
            .iter()
            .find(|r| &r.category == category && r.entity.is_none())
            .map(|r| r.value)
    }

    pub fn has_system_scope(&self) -> bool {
        self.readings
            .iter()
            .any(|r| r.entity.is_none() && r.category.is_system_scope())
    }
}

#[derive(Debug)]
pub struct Aggregator {
    threshold: u64,
    policy: FlushPolicy,
    windows: BTreeMap<WindowKey, AggregationWindow>,
}

impl Aggregator {
    pub fn new(threshold: u64, policy: FlushPolicy) -> Self {
        Self {
            threshold: threshold.max(1),
            policy,
            windows: BTreeMap::new(),
        }
    }

    /// Folds one reading into its window. Returns a flush when a threshold was reached.
    pub fn accumulate(&mut self, reading: &Reading) -> Option<Flush> {
        let key = WindowKey::of(reading);
        let window = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| AggregationWindow::new(&reading.name));
        window.add(reading);
        let window_count = window.count;
        if !self.is_due(window_count) {
            return None;
        }

        let readings = match self.policy {
            FlushPolicy::Combined => {
                let mut out = Vec::with_capacity(self.windows.len());
                for (k, w) in self.windows.iter_mut() {
                    if let Some(r) = flush_window(k, w, reading.timestamp) {
                        out.push(r);
                    }
                }
                out
            }
            FlushPolicy::PerCategory => self
                .windows
                .get_mut(&key)
                .and_then(|w| flush_window(&key, w, reading.timestamp))
                .into_iter()
                .collect(),
        };
        Some(Flush {
            timestamp: reading.timestamp,
            readings,
        })
    }

    fn is_due(&self, window_count: u64) -> bool {
        match self.policy {
            FlushPolicy::PerCategory => window_count >= self.threshold,
            // Host CPU/Memory/Disk fill in lockstep, so wait until the slowest one is full.
            // Without any host window, the window that just grew decides.
            FlushPolicy::Combined => {
                let system_min = self
                    .windows
                    .iter()
                    .filter(|(k, w)| {
                        k.entity.is_none() && k.category.is_system_scope() && w.count > 0
                    })
                    .map(|(_, w)| w.count)
                    .min();
                system_min.unwrap_or(window_count) >= self.threshold
            }
        }
    }

    /// The window for one metric name, host-wide or for one entity.
    pub fn window(&self, metric: &str, entity: Option<&str>) -> Option<&AggregationWindow> {
        self.windows
            .iter()
            .find(|(k, _)| k.metric == metric && k.entity.as_deref() == entity)
            .map(|(_, w)| w)
    }

    /// Samples accumulated across all windows and not yet flushed.
    pub fn pending(&self) -> u64 {
        self.windows.values().map(|w| w.count).sum()
    }
}

fn flush_window(
    key: &WindowKey,
    window: &mut AggregationWindow,
    timestamp: DateTime<Utc>,
) -> Option<AggregatedReading> {
    let value = window.mean()?;
    let out = AggregatedReading {
        name: format!("Average {}", window.name),
        category: key.category.clone(),
        entity: key.entity.clone(),
        value,
        sample_count: window.count,
        window_start: window.window_start.unwrap_or(timestamp),
        timestamp,
    };
    window.reset();
    Some(out)
}
