//! Shared types decoded from the insights API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One fetched batch of workflow insights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInsightPage {
    /// Opaque continuation token; `None` means no more pages.
    #[serde(default)]
    pub next_page_token: Option<String>,
    pub items: Vec<WorkflowInsightRecord>,
}

impl WorkflowInsightPage {
    /// The token to request next, if any.
    ///
    /// An empty string is treated the same as `null`.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

/// Aggregated metrics for one named workflow over a reporting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInsightRecord {
    pub name: String,
    pub metrics: WorkflowMetrics,
    /// Every other record key (`window_start`, `window_end`, ...), kept
    /// verbatim for re-encoding.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowInsightRecord {
    /// The value exported as the success-rate gauge.
    pub fn success_rate(&self) -> f64 {
        self.metrics.success_rate
    }

    pub fn window_start(&self) -> Option<&str> {
        self.extra.get("window_start").and_then(Value::as_str)
    }

    pub fn window_end(&self) -> Option<&str> {
        self.extra.get("window_end").and_then(Value::as_str)
    }
}

/// The `metrics` object of a record.
///
/// Only `success_rate` is exported. Every other key stays as decoded JSON,
/// including explicit `null`s and keys this exporter does not know, so a
/// re-encode reproduces the remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    /// Expected in `[0, 1]`; passed through unvalidated.
    pub success_rate: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowMetrics {
    pub fn total_runs(&self) -> Option<u64> {
        self.extra_u64("total_runs")
    }

    pub fn successful_runs(&self) -> Option<u64> {
        self.extra_u64("successful_runs")
    }

    pub fn failed_runs(&self) -> Option<u64> {
        self.extra_u64("failed_runs")
    }

    pub fn mttr(&self) -> Option<u64> {
        self.extra_u64("mttr")
    }

    pub fn total_credits_used(&self) -> Option<u64> {
        self.extra_u64("total_credits_used")
    }

    pub fn total_recoveries(&self) -> Option<u64> {
        self.extra_u64("total_recoveries")
    }

    pub fn throughput(&self) -> Option<f64> {
        self.extra.get("throughput").and_then(Value::as_f64)
    }

    /// `None` when absent, `null`, or not shaped like duration statistics.
    pub fn duration_metrics(&self) -> Option<DurationMetrics> {
        self.extra
            .get("duration_metrics")
            .filter(|value| value.is_object())
            .and_then(|value| DurationMetrics::deserialize(value).ok())
    }

    fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }
}

/// Run duration statistics, in seconds. A read-only view over
/// `metrics.duration_metrics`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DurationMetrics {
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
    #[serde(default)]
    pub median: Option<u64>,
    #[serde(default)]
    pub mean: Option<u64>,
    #[serde(default)]
    pub p95: Option<u64>,
    #[serde(default)]
    pub standard_deviation: Option<f64>,
}
