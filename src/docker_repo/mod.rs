// Container source reader via bollard

mod stats;

use crate::error::CollectionError;
use crate::models::ContainerSnapshot;
use crate::readers::{Snapshot, SourceReader};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use futures_util::StreamExt;
use futures_util::future::join_all;
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::{instrument, warn};

const SOURCE: &str = "docker";

/// Target value that samples every running container instead of one.
pub const ALL_CONTAINERS: &str = "*";

/// Which container(s) to sample. Empty means host-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerTarget {
    None,
    One(String),
    AllRunning,
}

impl ContainerTarget {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => ContainerTarget::None,
            ALL_CONTAINERS => ContainerTarget::AllRunning,
            id => ContainerTarget::One(id.to_string()),
        }
    }
}

pub struct DockerRepo {
    docker: Docker,
    target: watch::Receiver<ContainerTarget>,
}

impl DockerRepo {
    /// Connects to the local daemon. The target can be switched later through the sender side.
    pub fn connect(target: watch::Receiver<ContainerTarget>) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self { docker, target })
    }

    /// Snapshots for the current target; empty when no target is set.
    #[instrument(skip(self), fields(repo = "docker", operation = "sample_containers"))]
    pub async fn sample_containers(&self) -> Result<Vec<ContainerSnapshot>, CollectionError> {
        let target = self.target.borrow().clone();
        match target {
            ContainerTarget::None => Ok(Vec::new()),
            ContainerTarget::One(id) => Ok(vec![self.container_stats(&id, &id).await?]),
            ContainerTarget::AllRunning => {
                let running = self.list_running().await?;
                let results =
                    join_all(running.iter().map(|(id, name)| self.container_stats(id, name)))
                        .await;
                let mut out = Vec::with_capacity(results.len());
                for (result, (id, _)) in results.into_iter().zip(&running) {
                    match result {
                        Ok(s) => out.push(s),
                        // Container may have stopped between list and stats; skip it this tick.
                        Err(e) => warn!(error = %e, container = %id, "container stats failed"),
                    }
                }
                Ok(out)
            }
        }
    }

    async fn list_running(&self) -> Result<Vec<(String, String)>, CollectionError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);
        let options = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| CollectionError::Unavailable {
                source_name: SOURCE,
                reason: format!("list_containers: {}", e),
            })?;
        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let name = c
                    .names
                    .as_ref()
                    .and_then(|n| n.first())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                Some((id, name))
            })
            .collect())
    }

    /// One non-streaming stats call; the daemon fills precpu_stats from its previous read.
    async fn container_stats(
        &self,
        id: &str,
        fallback_name: &str,
    ) -> Result<ContainerSnapshot, CollectionError> {
        let options = StatsOptions {
            stream: false,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));
        let response = match stream.next().await {
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                return Err(CollectionError::Unavailable {
                    source_name: SOURCE,
                    reason: format!("stats {}: {}", id, e),
                });
            }
            None => {
                return Err(CollectionError::Malformed {
                    source_name: SOURCE,
                    reason: format!("stats {}: empty response", id),
                });
            }
        };
        let name = response
            .name
            .as_deref()
            .map(|n| n.trim_start_matches('/'))
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback_name)
            .to_string();
        stats::process_statistics(&response, id, &name)
    }
}

#[async_trait]
impl SourceReader for DockerRepo {
    fn source(&self) -> &'static str {
        SOURCE
    }

    async fn read(&self) -> Result<Vec<Snapshot>, CollectionError> {
        Ok(self
            .sample_containers()
            .await?
            .into_iter()
            .map(Snapshot::Container)
            .collect())
    }
}
