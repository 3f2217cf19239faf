use anyhow::Result;
use monitord::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let hub = hub::Hub::new(app_config.publishing.broadcast_capacity);

    let metric_repo = Arc::new(
        metric_repo::MetricRepo::connect(
            &app_config.database.path,
            app_config.database.retention_days,
        )
        .await?,
    );
    metric_repo.init().await?;

    let ledger = ledger::Ledger::new(&app_config.monitoring.ledger_path);
    ledger.ensure_header().await?;

    let (target_tx, target_rx) = watch::channel(docker_repo::ContainerTarget::parse(
        &app_config.monitoring.container_id,
    ));

    let mut readers: Vec<Arc<dyn readers::SourceReader>> =
        vec![Arc::new(sysinfo_repo::SysinfoRepo::new())];
    match docker_repo::DockerRepo::connect(target_rx) {
        Ok(repo) => readers.push(Arc::new(repo)),
        Err(e) => tracing::warn!(error = %e, "Docker unavailable; sampling host metrics only"),
    }

    let stats = Arc::new(stats::PipelineStats::default());
    let fanout = Arc::new(fanout::FanOut::new(
        Arc::new(hub.clone()),
        metric_repo.clone(),
        Duration::from_millis(app_config.publishing.publish_timeout_ms),
        Duration::from_millis(app_config.database.store_timeout_ms),
        stats.clone(),
    ));

    let ws_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let sampler_handle = sampler::spawn(
        sampler::SamplerDeps {
            readers,
            fanout,
            ledger,
            stats,
            live_subscribers: ws_connections.clone(),
            shutdown_rx,
        },
        sampler::SamplerConfig {
            sample_interval: Duration::from_secs(app_config.monitoring.sample_interval_secs),
            flush_threshold: app_config.monitoring.flush_threshold,
            flush_policy: app_config.monitoring.flush_policy,
            alert_rules: app_config.alerts.clone(),
            dispatch_queue_capacity: app_config.monitoring.dispatch_queue_capacity,
            stats_log_interval: Duration::from_secs(
                app_config.monitoring.stats_log_interval_secs,
            ),
        },
    );

    retention_worker::spawn(
        metric_repo.clone(),
        retention_worker::RetentionWorkerConfig {
            prune_interval_secs: app_config.database.prune_interval_secs,
            vacuum_schedule: app_config.database.vacuum_schedule.clone(),
            vacuum_interval_secs: app_config.database.vacuum_interval_secs,
        },
    );

    let app = routes::app(
        metric_repo.clone(),
        hub,
        Arc::new(alerts::AlertEvaluator::new(app_config.alerts.clone())),
        target_tx,
        ws_connections,
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    if in_container {
        // In Docker: run server until error or SIGTERM (no signal handler; avoids immediate exit)
        axum::serve(listener, app).await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    let _ = tokio::signal::ctrl_c().await;
                }
            } => {
                tracing::info!("Received shutdown signal");
                let _ = shutdown_tx.send(());
                let _ = sampler_handle.await;
                metric_repo.close().await;
            }
        }
    }

    Ok(())
}
