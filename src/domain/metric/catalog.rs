use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::metric::aligner::DEFAULT_BUCKET_PERIOD_SECS;

/// Per-series aligner applied by the backend before points are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PerSeriesAligner {
    #[serde(rename = "ALIGN_NONE")]
    None,
    #[serde(rename = "ALIGN_DELTA")]
    Delta,
    #[serde(rename = "ALIGN_RATE")]
    Rate,
    #[serde(rename = "ALIGN_INTERPOLATE")]
    Interpolate,
    #[serde(rename = "ALIGN_NEXT_OLDER")]
    NextOlder,
    #[serde(rename = "ALIGN_MIN")]
    Min,
    #[serde(rename = "ALIGN_MAX")]
    Max,
    #[default]
    #[serde(rename = "ALIGN_MEAN")]
    Mean,
    #[serde(rename = "ALIGN_COUNT")]
    Count,
    #[serde(rename = "ALIGN_SUM")]
    Sum,
    #[serde(rename = "ALIGN_STDDEV")]
    Stddev,
    #[serde(rename = "ALIGN_PERCENTILE_99")]
    Percentile99,
    #[serde(rename = "ALIGN_PERCENTILE_95")]
    Percentile95,
    #[serde(rename = "ALIGN_PERCENTILE_50")]
    Percentile50,
    #[serde(rename = "ALIGN_PERCENTILE_05")]
    Percentile05,
    #[serde(rename = "ALIGN_PERCENT_CHANGE")]
    PercentChange,
}

impl PerSeriesAligner {
    pub fn as_code(&self) -> &'static str {
        match self {
            PerSeriesAligner::None => "ALIGN_NONE",
            PerSeriesAligner::Delta => "ALIGN_DELTA",
            PerSeriesAligner::Rate => "ALIGN_RATE",
            PerSeriesAligner::Interpolate => "ALIGN_INTERPOLATE",
            PerSeriesAligner::NextOlder => "ALIGN_NEXT_OLDER",
            PerSeriesAligner::Min => "ALIGN_MIN",
            PerSeriesAligner::Max => "ALIGN_MAX",
            PerSeriesAligner::Mean => "ALIGN_MEAN",
            PerSeriesAligner::Count => "ALIGN_COUNT",
            PerSeriesAligner::Sum => "ALIGN_SUM",
            PerSeriesAligner::Stddev => "ALIGN_STDDEV",
            PerSeriesAligner::Percentile99 => "ALIGN_PERCENTILE_99",
            PerSeriesAligner::Percentile95 => "ALIGN_PERCENTILE_95",
            PerSeriesAligner::Percentile50 => "ALIGN_PERCENTILE_50",
            PerSeriesAligner::Percentile05 => "ALIGN_PERCENTILE_05",
            PerSeriesAligner::PercentChange => "ALIGN_PERCENT_CHANGE",
        }
    }
}

/// How entities of a catalog metric are found and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Discovered per metric, one series per instance.
    Instance,
    /// Cannot be listed; reuses the instance list of the discovery metric.
    AgentMemory,
    /// Discovered per metric, one series per instance and device.
    Disk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMetric {
    pub metric_type: String,
    pub aligner: PerSeriesAligner,
    pub kind: MetricKind,
}

impl CatalogMetric {
    fn new(metric_type: &str, aligner: PerSeriesAligner, kind: MetricKind) -> Self {
        Self {
            metric_type: metric_type.to_string(),
            aligner,
            kind,
        }
    }
}

/// Metrics exported for every project in a run.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    pub metrics: Vec<CatalogMetric>,
    pub alignment_period: Duration,
}

impl MetricCatalog {
    /// CPU usage, network bytes, agent memory and disk ops.
    pub fn builtin() -> Self {
        use MetricKind::*;
        use PerSeriesAligner::{Mean, Rate};

        Self {
            metrics: vec![
                CatalogMetric::new("compute.googleapis.com/instance/cpu/usage_time", Rate, Instance),
                CatalogMetric::new("compute.googleapis.com/instance/network/sent_bytes_count", Rate, Instance),
                CatalogMetric::new("compute.googleapis.com/instance/network/received_bytes_count", Rate, Instance),
                // sampled every 60 seconds, one series per state (buffered, cached, free, used)
                CatalogMetric::new("agent.googleapis.com/memory/bytes_used", Mean, AgentMemory),
                // one instance may have many disks
                CatalogMetric::new("compute.googleapis.com/instance/disk/write_ops_count", Rate, Disk),
                CatalogMetric::new("compute.googleapis.com/instance/disk/read_ops_count", Rate, Disk),
            ],
            alignment_period: Duration::seconds(DEFAULT_BUCKET_PERIOD_SECS),
        }
    }

    pub fn of_kind(&self, kind: MetricKind) -> impl Iterator<Item = &CatalogMetric> {
        self.metrics.iter().filter(move |m| m.kind == kind)
    }

    /// First instance metric; its instance list stands in for agent metrics.
    pub fn discovery_metric(&self) -> Option<&CatalogMetric> {
        self.of_kind(MetricKind::Instance).next()
    }
}
