// Shared test helpers: scripted readers and in-memory sinks

#![allow(dead_code)]

use async_trait::async_trait;
use monitord::error::{CollectionError, StoreError, TransportError};
use monitord::fanout::{Broadcaster, MetricStore};
use monitord::models::{Category, HostSnapshot, MetricRecord, Reading};
use monitord::readers::{Snapshot, SourceReader};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn host(cpu: f64, memory_mb: f64, disk: f64) -> Snapshot {
    Snapshot::Host(HostSnapshot {
        cpu_percent: cpu,
        memory_used_mb: memory_mb,
        disk_percent: disk,
    })
}

/// CPU 10, 20, ..., 500 with constant memory and disk.
pub fn cpu_ramp() -> Vec<Snapshot> {
    (1..=50).map(|i| host(i as f64 * 10.0, 1024.0, 40.0)).collect()
}

/// Hands out one snapshot per read, then nothing.
pub struct ScriptedReader {
    snapshots: Mutex<VecDeque<Snapshot>>,
}

impl ScriptedReader {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceReader for ScriptedReader {
    fn source(&self) -> &'static str {
        "scripted"
    }

    async fn read(&self) -> Result<Vec<Snapshot>, CollectionError> {
        Ok(self.snapshots.lock().unwrap().pop_front().into_iter().collect())
    }
}

pub struct FailingReader;

#[async_trait]
impl SourceReader for FailingReader {
    fn source(&self) -> &'static str {
        "failing"
    }

    async fn read(&self) -> Result<Vec<Snapshot>, CollectionError> {
        Err(CollectionError::Unavailable {
            source_name: "failing",
            reason: "daemon gone".into(),
        })
    }
}

pub struct HangingReader;

#[async_trait]
impl SourceReader for HangingReader {
    fn source(&self) -> &'static str {
        "hanging"
    }

    async fn read(&self) -> Result<Vec<Snapshot>, CollectionError> {
        std::future::pending().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Ok,
    Fail,
    Hang,
}

pub struct RecordingBroadcaster {
    pub mode: Mode,
    pub messages: Mutex<Vec<(String, Value)>>,
}

impl RecordingBroadcaster {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<(String, Value)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), TransportError> {
        match self.mode {
            Mode::Ok => {
                self.messages
                    .lock()
                    .unwrap()
                    .push((topic.to_string(), payload));
                Ok(())
            }
            Mode::Fail => Err(TransportError::Unavailable("hub down".into())),
            Mode::Hang => std::future::pending().await,
        }
    }
}

pub struct RecordingStore {
    pub mode: Mode,
    pub records: Mutex<Vec<Reading>>,
}

impl RecordingStore {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<Reading> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricStore for RecordingStore {
    async fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        match self.mode {
            Mode::Ok => {
                self.records.lock().unwrap().push(reading.clone());
                Ok(())
            }
            Mode::Fail => Err(StoreError::Unavailable("disk full".into())),
            Mode::Hang => std::future::pending().await,
        }
    }

    async fn query(&self, category: Option<&Category>) -> Result<Vec<MetricRecord>, StoreError> {
        if self.mode != Mode::Ok {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| category.is_none_or(|c| &r.category == c))
            .enumerate()
            .map(|(i, r)| MetricRecord {
                id: i as i64 + 1,
                name: r.name.clone(),
                category: r.category.clone(),
                value: r.value,
                timestamp: r.timestamp,
                entity: r.entity.clone(),
            })
            .collect())
    }
}
