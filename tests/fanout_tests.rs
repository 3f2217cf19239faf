// Fan-out delivery: both destinations are attempted independently

mod common;

use chrono::Utc;
use common::{Mode, RecordingBroadcaster, RecordingStore};
use monitord::error::{StoreError, TransportError};
use monitord::fanout::{Dispatch, FanOut, TOPIC_ALERT, TOPIC_METRIC_UPDATE};
use monitord::hub::Hub;
use monitord::models::{Category, Reading};
use monitord::stats::PipelineStats;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;

fn fanout(
    broadcaster: Arc<RecordingBroadcaster>,
    store: Arc<RecordingStore>,
    stats: Arc<PipelineStats>,
) -> FanOut {
    FanOut::new(
        broadcaster,
        store,
        Duration::from_millis(100),
        Duration::from_millis(100),
        stats,
    )
}

fn cpu(value: f64) -> Dispatch {
    Dispatch::Reading(Reading::new("CPU Usage", Category::Cpu, value, Utc::now()))
}

#[tokio::test]
async fn reading_reaches_both_destinations() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Ok));
    let store = Arc::new(RecordingStore::new(Mode::Ok));
    let fanout = fanout(broadcaster.clone(), store.clone(), Arc::default());

    let outcome = fanout.dispatch(&cpu(12.5)).await;
    assert!(outcome.broadcast.is_ok());
    assert!(outcome.persistence.is_ok());
    assert_eq!(
        broadcaster.messages(),
        vec![(TOPIC_METRIC_UPDATE.to_string(), json!(["CPU Usage", "12.50"]))]
    );
    assert_eq!(store.records().len(), 1);
    assert_eq!(store.records()[0].category, Category::Cpu);
}

#[tokio::test]
async fn store_failure_does_not_block_broadcast() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Ok));
    let store = Arc::new(RecordingStore::new(Mode::Fail));
    let stats = Arc::new(PipelineStats::default());
    let fanout = fanout(broadcaster.clone(), store, stats.clone());

    let outcome = fanout.dispatch(&cpu(12.5)).await;
    assert!(outcome.broadcast.is_ok());
    assert!(matches!(outcome.persistence, Err(StoreError::Unavailable(_))));
    assert_eq!(broadcaster.messages().len(), 1);
    assert_eq!(PipelineStats::get(&stats.store_failures), 1);
    assert_eq!(PipelineStats::get(&stats.broadcast_failures), 0);
}

#[tokio::test]
async fn broadcast_failure_does_not_block_persistence() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Fail));
    let store = Arc::new(RecordingStore::new(Mode::Ok));
    let stats = Arc::new(PipelineStats::default());
    let fanout = fanout(broadcaster, store.clone(), stats.clone());

    let outcome = fanout.dispatch(&cpu(12.5)).await;
    assert!(matches!(outcome.broadcast, Err(TransportError::Unavailable(_))));
    assert!(outcome.persistence.is_ok());
    assert_eq!(store.records().len(), 1);
    assert_eq!(PipelineStats::get(&stats.broadcast_failures), 1);
}

#[tokio::test]
async fn hanging_store_times_out_and_broadcast_still_lands() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Ok));
    let store = Arc::new(RecordingStore::new(Mode::Hang));
    let fanout = fanout(broadcaster.clone(), store, Arc::default());

    let outcome = fanout.dispatch(&cpu(1.0)).await;
    assert!(matches!(outcome.persistence, Err(StoreError::Timeout(100))));
    assert!(outcome.broadcast.is_ok());
    assert_eq!(broadcaster.messages().len(), 1);
}

#[tokio::test]
async fn hanging_broadcaster_times_out_and_record_is_stored() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Hang));
    let store = Arc::new(RecordingStore::new(Mode::Ok));
    let fanout = fanout(broadcaster, store.clone(), Arc::default());

    let outcome = fanout.dispatch(&cpu(1.0)).await;
    assert!(matches!(outcome.broadcast, Err(TransportError::Timeout(100))));
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn alert_goes_out_on_alert_topic_and_is_stored_as_alert() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Ok));
    let store = Arc::new(RecordingStore::new(Mode::Ok));
    let fanout = fanout(broadcaster.clone(), store.clone(), Arc::default());

    let reading = Reading::new("CPU Usage", Category::Cpu, 95.0, Utc::now());
    let event = monitord::alerts::AlertEvaluator::default()
        .evaluate(&reading)
        .unwrap();
    fanout.dispatch(&Dispatch::Alert(event)).await;

    assert_eq!(
        broadcaster.messages(),
        vec![(
            TOPIC_ALERT.to_string(),
            json!(["High CPU Usage Detected: 95.00%"])
        )]
    );
    let stored = store.records();
    assert_eq!(stored[0].category, Category::Alert);
    assert_eq!(stored[0].name, "High CPU Usage Detected: 95.00%");
}

#[tokio::test]
async fn container_reading_label_names_the_container() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Ok));
    let store = Arc::new(RecordingStore::new(Mode::Ok));
    let fanout = fanout(broadcaster.clone(), store, Arc::default());

    let reading = Reading::new("Container CPU Usage", Category::Container, 3.0, Utc::now())
        .with_entity("web");
    fanout.dispatch(&Dispatch::Reading(reading)).await;
    assert_eq!(
        broadcaster.messages()[0].1,
        json!(["Container CPU Usage (web)", "3.00"])
    );
}

#[tokio::test]
async fn hub_without_subscribers_is_not_counted_as_failure() {
    let store = Arc::new(RecordingStore::new(Mode::Ok));
    let stats = Arc::new(PipelineStats::default());
    let fanout = FanOut::new(
        Arc::new(Hub::new(8)),
        store.clone(),
        Duration::from_millis(100),
        Duration::from_millis(100),
        stats.clone(),
    );

    let outcome = fanout.dispatch(&cpu(5.0)).await;
    assert!(matches!(outcome.broadcast, Err(TransportError::NoSubscribers)));
    assert_eq!(PipelineStats::get(&stats.broadcast_failures), 0);
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn dispatch_all_keeps_order() {
    let broadcaster = Arc::new(RecordingBroadcaster::new(Mode::Ok));
    let store = Arc::new(RecordingStore::new(Mode::Ok));
    let fanout = fanout(broadcaster.clone(), store.clone(), Arc::default());

    let outcomes = fanout.dispatch_all(&[cpu(1.0), cpu(2.0), cpu(3.0)]).await;
    assert_eq!(outcomes.len(), 3);
    let values: Vec<f64> = store.records().iter().map(|r| r.value).collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
}
