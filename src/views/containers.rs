//! Docker containers with resource stats.

use serde_json::Value;
use std::sync::Arc;

use crate::api::types::{Container, ContainerList};
use crate::api::{decode, paths, ApiError};
use crate::sync::poller::{Endpoint, ViewSource};

pub const CONTAINERS_VIEW: &str = "containers";

const ENDPOINTS: &[Endpoint] = &[Endpoint::new(
    "docker/containers",
    paths::DOCKER_CONTAINERS,
)];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainersSnapshot {
    pub containers: Vec<Container>,
    /// Backend-reported docker error (daemon down, permission denied, ...)
    pub error: Option<String>,
}

impl ContainersSnapshot {
    /// Containers whose name or image contains `query`, ignoring case.
    /// An empty query matches everything.
    pub fn filter(&self, query: &str) -> Vec<&Container> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.containers.iter().collect();
        }
        self.containers
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&query) || c.image.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.containers.iter().filter(|c| c.is_running()).count()
    }
}

pub struct ContainersView;

impl ViewSource for ContainersView {
    type Snapshot = ContainersSnapshot;

    fn name(&self) -> &'static str {
        CONTAINERS_VIEW
    }

    fn endpoints(&self) -> &[Endpoint] {
        ENDPOINTS
    }

    fn assemble(
        &self,
        payloads: &[Arc<Value>],
        _previous: Option<&ContainersSnapshot>,
    ) -> Result<ContainersSnapshot, ApiError> {
        let list: ContainerList = decode(paths::DOCKER_CONTAINERS, (*payloads[0]).clone())?;
        Ok(ContainersSnapshot {
            containers: list.containers,
            error: list.error,
        })
    }

    // Only a server error means docker itself is down; other failures are
    // transient and stay in the log.
    fn failure_message(&self, error: &ApiError) -> Option<String> {
        (error.status() == Some(500)).then(|| "Docker is not available or not running".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> ContainersSnapshot {
        let payloads = vec![Arc::new(json!({
            "containers": [
                { "id": "a1", "name": "jellyfin", "image": "jellyfin/jellyfin:latest", "status": "running" },
                { "id": "b2", "name": "homeassistant", "image": "ghcr.io/home-assistant/home-assistant", "status": "running" },
                { "id": "c3", "name": "backup", "image": "restic/restic", "status": "exited" }
            ]
        }))];
        ContainersView.assemble(&payloads, None).unwrap()
    }

    #[test]
    fn test_filter_matches_name_or_image() {
        let snapshot = snapshot();

        let by_name: Vec<&str> = snapshot.filter("JELLY").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(by_name, vec!["a1"]);

        let by_image: Vec<&str> = snapshot.filter("ghcr.io").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(by_image, vec!["b2"]);

        assert_eq!(snapshot.filter("").len(), 3);
        assert!(snapshot.filter("nginx").is_empty());
    }

    #[test]
    fn test_running_count() {
        assert_eq!(snapshot().running_count(), 2);
    }

    #[test]
    fn test_only_server_error_notifies() {
        let server = ApiError::Status {
            path: paths::DOCKER_CONTAINERS.to_string(),
            status: 500,
            body: String::new(),
        };
        let unavailable = ApiError::Status {
            path: paths::DOCKER_CONTAINERS.to_string(),
            status: 503,
            body: String::new(),
        };

        assert_eq!(
            ContainersView.failure_message(&server).as_deref(),
            Some("Docker is not available or not running")
        );
        assert!(ContainersView.failure_message(&unavailable).is_none());
    }
}
