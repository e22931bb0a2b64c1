//! Overview: metrics summary, health badge and the CPU / memory /
//! temperature history chart.

use chrono::Local;
use serde_json::Value;
use std::sync::Arc;

use crate::api::types::{Health, HealthStatus, MetricsSummary};
use crate::api::{decode, paths, ApiError};
use crate::sync::history::{History, MetricSample};
use crate::sync::poller::{Endpoint, ViewSource};

pub const OVERVIEW_VIEW: &str = "overview";

const ENDPOINTS: &[Endpoint] = &[
    Endpoint::new("metrics/summary", paths::METRICS_SUMMARY),
    Endpoint::new("health", paths::HEALTH),
];

#[derive(Debug, Clone)]
pub struct OverviewSnapshot {
    pub summary: MetricsSummary,
    pub health: Health,
    /// One sample per commit, oldest first
    pub history: History,
}

impl OverviewSnapshot {
    pub fn health_status(&self) -> HealthStatus {
        self.health.level()
    }
}

pub struct OverviewView {
    seed: History,
}

impl OverviewView {
    pub fn new(history_capacity: usize) -> Self {
        Self::with_seed(History::new(history_capacity))
    }

    /// Start the chart from previously recorded samples (server-kept history)
    pub fn with_seed(seed: History) -> Self {
        Self { seed }
    }
}

impl ViewSource for OverviewView {
    type Snapshot = OverviewSnapshot;

    fn name(&self) -> &'static str {
        OVERVIEW_VIEW
    }

    fn endpoints(&self) -> &[Endpoint] {
        ENDPOINTS
    }

    fn assemble(
        &self,
        payloads: &[Arc<Value>],
        previous: Option<&OverviewSnapshot>,
    ) -> Result<OverviewSnapshot, ApiError> {
        let summary: MetricsSummary = decode(paths::METRICS_SUMMARY, (*payloads[0]).clone())?;
        let health: Health = decode(paths::HEALTH, (*payloads[1]).clone())?;

        let history = previous.map(|p| &p.history).unwrap_or(&self.seed);
        let history = history.append(MetricSample::from_summary(&summary, &Local::now()));

        Ok(OverviewSnapshot {
            summary,
            health,
            history,
        })
    }

    fn failure_message(&self, _error: &ApiError) -> Option<String> {
        Some("Failed to fetch metrics".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payloads(cpu: f64) -> Vec<Arc<Value>> {
        vec![
            Arc::new(json!({
                "cpu": { "overall_usage": cpu },
                "memory": { "percent": 50.0 },
                "temperature": { "cpu_temp": 41.0, "unit": "C" }
            })),
            Arc::new(json!({ "status": "healthy" })),
        ]
    }

    #[test]
    fn test_each_commit_appends_one_sample() {
        let view = OverviewView::new(3);

        let first = view.assemble(&payloads(10.0), None).unwrap();
        let second = view.assemble(&payloads(20.0), Some(&first)).unwrap();

        assert_eq!(first.history.len(), 1);
        assert_eq!(second.history.len(), 2);
        assert_eq!(second.history.latest().unwrap().cpu, 20.0);
        assert_eq!(second.health_status(), HealthStatus::Healthy);
        assert_eq!(second.summary.temperature.cpu_temp, 41.0);
    }

    #[test]
    fn test_seed_used_only_without_previous() {
        let seed = History::seeded(
            450,
            vec![MetricSample {
                time: "08:00:00".to_string(),
                cpu: 1.0,
                memory: 2.0,
                temp: 3.0,
            }],
        );
        let view = OverviewView::with_seed(seed);

        let first = view.assemble(&payloads(5.0), None).unwrap();
        assert_eq!(first.history.len(), 2);
        assert_eq!(first.history.samples()[0].time, "08:00:00");

        let fresh = OverviewSnapshot {
            history: History::new(450),
            ..first.clone()
        };
        let next = view.assemble(&payloads(6.0), Some(&fresh)).unwrap();
        assert_eq!(next.history.len(), 1);
    }

    #[test]
    fn test_bad_summary_is_a_decode_error() {
        let view = OverviewView::new(10);
        let bad = vec![Arc::new(json!({ "cpu": "busy" })), Arc::new(json!({}))];
        let err = view.assemble(&bad, None).unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
