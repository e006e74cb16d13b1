use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::domain::metric::aligned_series::AlignedSeries;
use crate::errors::ExportError;

/// Everything a sink needs to place and render one exported series.
#[derive(Debug, Clone, Copy)]
pub struct ExportRecord<'a> {
    /// Window start in local time.
    pub local_date_time: NaiveDateTime,
    pub project_id: &'a str,
    pub metric_type: &'a str,
    pub entity_name: &'a str,
    pub series: &'a AlignedSeries,
    /// Extra directories below the entity, e.g. `["disk", "sdb"]`.
    pub tag_path: &'a [String],
    /// Replaces the metric title in the file name when set.
    pub unit: Option<&'a str>,
}

/// Destination for aligned series.
///
/// Writing the same record twice replaces the first output.
#[async_trait]
pub trait MetricExporter: Send + Sync {
    /// Returns the location written to.
    async fn export(&self, record: &ExportRecord<'_>) -> Result<String, ExportError>;

    fn kind(&self) -> &'static str;
}
