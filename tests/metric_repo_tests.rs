// MetricRepo tests: connect, init, append, query, prune

use chrono::{Duration, Utc};
use monitord::error::StoreError;
use monitord::fanout::MetricStore;
use monitord::metric_repo::MetricRepo;
use monitord::models::{Category, Reading};
use tempfile::TempDir;

async fn repo(dir: &TempDir, retention_days: u32) -> MetricRepo {
    let path = dir.path().join("data").join("metrics.db");
    let repo = MetricRepo::connect(path.to_str().unwrap(), retention_days)
        .await
        .unwrap();
    repo.init().await.unwrap();
    repo
}

#[tokio::test]
async fn metric_repo_connect_and_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let repo = repo(&dir, 7).await;
    repo.init().await.unwrap();
    assert!(repo.query(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn metric_repo_append_and_query_round_trip() {
    let dir = TempDir::new().unwrap();
    let repo = repo(&dir, 7).await;
    let ts = Utc::now();
    repo.append(&Reading::new("CPU Usage", Category::Cpu, 12.346, ts))
        .await
        .unwrap();
    repo.append(
        &Reading::new("Container CPU Usage", Category::Container, 3.0, ts).with_entity("web"),
    )
    .await
    .unwrap();

    let all = repo.query(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "CPU Usage");
    // Stored as its two-decimal text.
    assert_eq!(all[0].value, 12.35);
    assert_eq!(all[0].timestamp.timestamp_millis(), ts.timestamp_millis());
    assert_eq!(all[1].entity.as_deref(), Some("web"));
    assert!(all[0].id < all[1].id);
}

#[tokio::test]
async fn metric_repo_query_filters_by_category() {
    let dir = TempDir::new().unwrap();
    let repo = repo(&dir, 7).await;
    let ts = Utc::now();
    for (name, category, value) in [
        ("CPU Usage", Category::Cpu, 10.0),
        ("Memory Usage", Category::Memory, 2048.0),
        ("CPU Usage", Category::Cpu, 20.0),
        ("High CPU Usage Detected: 95.00%", Category::Alert, 95.0),
    ] {
        repo.append(&Reading::new(name, category, value, ts))
            .await
            .unwrap();
    }

    let cpu = repo.query(Some(&Category::Cpu)).await.unwrap();
    assert_eq!(cpu.len(), 2);
    assert!(cpu.iter().all(|r| r.category == Category::Cpu));

    let alerts = repo.query(Some(&Category::Alert)).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].name, "High CPU Usage Detected: 95.00%");

    let custom = repo
        .query(Some(&Category::parse("GPU").unwrap()))
        .await
        .unwrap();
    assert!(custom.is_empty());
}

#[tokio::test]
async fn metric_repo_orders_oldest_first() {
    let dir = TempDir::new().unwrap();
    let repo = repo(&dir, 7).await;
    let now = Utc::now();
    repo.append(&Reading::new("CPU Usage", Category::Cpu, 2.0, now))
        .await
        .unwrap();
    repo.append(&Reading::new(
        "CPU Usage",
        Category::Cpu,
        1.0,
        now - Duration::seconds(30),
    ))
    .await
    .unwrap();

    let values: Vec<f64> = repo
        .query(None)
        .await
        .unwrap()
        .iter()
        .map(|r| r.value)
        .collect();
    assert_eq!(values, vec![1.0, 2.0]);
}

#[tokio::test]
async fn metric_repo_prune_removes_only_expired_records() {
    let dir = TempDir::new().unwrap();
    let repo = repo(&dir, 1).await;
    let now = Utc::now();
    repo.append(&Reading::new(
        "CPU Usage",
        Category::Cpu,
        1.0,
        now - Duration::days(3),
    ))
    .await
    .unwrap();
    repo.append(&Reading::new("CPU Usage", Category::Cpu, 2.0, now))
        .await
        .unwrap();

    assert_eq!(repo.prune_old_data().await.unwrap(), 1);
    let left = repo.query(None).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].value, 2.0);
    repo.vacuum().await.unwrap();
}

#[tokio::test]
async fn metric_repo_serves_as_metric_store() {
    let dir = TempDir::new().unwrap();
    let store: std::sync::Arc<dyn MetricStore> = std::sync::Arc::new(repo(&dir, 7).await);
    store
        .append(&Reading::new("Disk Usage", Category::Disk, 40.0, Utc::now()))
        .await
        .unwrap();
    assert_eq!(store.query(Some(&Category::Disk)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn metric_repo_closed_pool_reports_unavailable() {
    let dir = TempDir::new().unwrap();
    let repo = repo(&dir, 7).await;
    repo.close().await;
    let err = repo
        .append(&Reading::new("CPU Usage", Category::Cpu, 1.0, Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}
