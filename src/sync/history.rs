//! Bounded history of metric samples for the time-series chart.
//!
//! `append` never mutates in place: it returns a new `History` sharing no
//! storage with the old one, so a consumer holding the previous buffer can
//! detect the change by pointer identity.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::types::MetricsSummary;

/// 15 minutes at a 2-second cadence
pub const DEFAULT_HISTORY_CAPACITY: usize = 450;

/// One point on the CPU / memory / temperature chart
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricSample {
    /// Wall-clock label, "HH:MM:SS"
    pub time: String,
    pub cpu: f64,
    pub memory: f64,
    pub temp: f64,
}

impl MetricSample {
    /// Derive a sample from a metrics summary taken at `at`
    pub fn from_summary<Tz: TimeZone>(summary: &MetricsSummary, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            time: at.format("%H:%M:%S").to_string(),
            cpu: summary.cpu.overall_usage,
            memory: summary.memory.percent,
            temp: summary.temperature.cpu_temp,
        }
    }
}

#[derive(Clone, Debug)]
pub struct History {
    samples: Arc<[MetricSample]>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Arc::from(Vec::<MetricSample>::new()),
            capacity,
        }
    }

    /// Build from existing samples, keeping only the newest `capacity`
    pub fn seeded(capacity: usize, samples: Vec<MetricSample>) -> Self {
        let skip = samples.len().saturating_sub(capacity);
        let kept: Vec<MetricSample> = samples.into_iter().skip(skip).collect();
        Self {
            samples: Arc::from(kept),
            capacity,
        }
    }

    /// Append at the tail, evicting from the head past capacity
    pub fn append(&self, sample: MetricSample) -> History {
        if self.capacity == 0 {
            return History::new(0);
        }

        let keep = self.samples.len().min(self.capacity - 1);
        let start = self.samples.len() - keep;

        let mut next = Vec::with_capacity(keep + 1);
        next.extend_from_slice(&self.samples[start..]);
        next.push(sample);

        History {
            samples: Arc::from(next),
            capacity: self.capacity,
        }
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when both handles share the same storage
    pub fn ptr_eq(&self, other: &History) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity && self.samples == other.samples
    }
}
