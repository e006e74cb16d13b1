use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::formats::Separator;
use serde_with::{serde_as, StringWithSeparator};

use crate::core::client::monitoring::time_series_api_trait::Aggregation;
use crate::core::config::app_config::parse_alignment_period;
use crate::domain::metric::catalog::PerSeriesAligner;
use crate::domain::metric::time_window::{fixed_offset, IntervalType, TimeWindow};
use crate::errors::ExportError;

/// `disk|sdb` in the `attendNames` form field.
pub struct PipeSeparator;

impl Separator for PipeSeparator {
    fn separator() -> &'static str {
        "|"
    }
}

/// One (project, metric, entity) unit of work.
///
/// Serialized as a flat form body for deferred execution. A job that carries
/// its window replays to the same output wherever it runs.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    #[serde(rename = "projectID")]
    pub project_id: String,

    #[serde(rename = "metric")]
    pub metric_type: String,

    pub aligner: PerSeriesAligner,

    #[serde(rename = "alignmentPeriod", default = "default_alignment_period")]
    pub alignment_period: String,

    pub filter: String,

    #[serde(rename = "instanceName")]
    pub instance_name: String,

    #[serde_as(as = "StringWithSeparator::<PipeSeparator, String>")]
    #[serde(rename = "attendNames", default, skip_serializing_if = "Vec::is_empty")]
    pub tag_path: Vec<String>,

    #[serde(rename = "intervalStart", default, skip_serializing_if = "Option::is_none")]
    pub interval_start: Option<DateTime<Utc>>,

    #[serde(rename = "intervalEnd", default, skip_serializing_if = "Option::is_none")]
    pub interval_end: Option<DateTime<Utc>>,

    /// Hours east of UTC for display; the service default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

fn default_alignment_period() -> String {
    "60s".to_string()
}

impl ExportJob {
    pub fn new(
        project_id: impl Into<String>,
        metric_type: impl Into<String>,
        aligner: PerSeriesAligner,
        filter: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            metric_type: metric_type.into(),
            aligner,
            alignment_period: default_alignment_period(),
            filter: filter.into(),
            instance_name: instance_name.into(),
            tag_path: Vec::new(),
            interval_start: None,
            interval_end: None,
            timezone: None,
            unit: None,
        }
    }

    pub fn with_tag_path(mut self, tag_path: Vec<String>) -> Self {
        self.tag_path = tag_path;
        self
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_alignment_period(mut self, period: impl Into<String>) -> Self {
        self.alignment_period = period.into();
        self
    }

    /// Pins the window so the job no longer depends on when it runs.
    pub fn pinned_to(mut self, window: &TimeWindow, tz_offset_hours: i32) -> Self {
        self.interval_start = Some(window.start());
        self.interval_end = Some(window.end());
        self.timezone = Some(tz_offset_hours);
        self
    }

    /// The pinned window, or the previous local day relative to `now`.
    pub fn window(&self, default_tz_hours: i32, now: DateTime<Utc>) -> Result<TimeWindow, ExportError> {
        let tz = self.timezone.unwrap_or(default_tz_hours);

        match (self.interval_start, self.interval_end) {
            (Some(start), Some(end)) => TimeWindow::new(start, end, fixed_offset(tz)?),
            (None, None) => TimeWindow::resolve(now, tz, IntervalType::Day),
            _ => Err(ExportError::Config(
                "intervalStart and intervalEnd must be given together".into(),
            )),
        }
    }

    pub fn aggregation(&self) -> Result<Aggregation, ExportError> {
        Ok(Aggregation {
            per_series_aligner: self.aligner,
            alignment_period: parse_alignment_period(&self.alignment_period)?,
        })
    }

    /// Short label for logs: `instance` or `instance/disk/sdb`.
    pub fn entity_label(&self) -> String {
        if self.tag_path.is_empty() {
            self.instance_name.clone()
        } else {
            format!("{}/{}", self.instance_name, self.tag_path.join("/"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn disk_job() -> ExportJob {
        ExportJob::new(
            "p1",
            "compute.googleapis.com/instance/disk/read_ops_count",
            PerSeriesAligner::Rate,
            r#"metric.type="x" AND metric.labels.device_name="sdb""#,
            "vm-a",
        )
        .with_tag_path(vec!["disk".into(), "sdb".into()])
    }

    #[test]
    fn json_round_trip_keeps_form_field_names() {
        let job = disk_job();
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["projectID"], "p1");
        assert_eq!(value["aligner"], "ALIGN_RATE");
        assert_eq!(value["attendNames"], "disk|sdb");
        assert_eq!(value["instanceName"], "vm-a");
        assert!(value.get("intervalStart").is_none());

        let back: ExportJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn missing_attend_names_means_no_tag_path() {
        let job: ExportJob = serde_json::from_str(
            r#"{"projectID":"p1","metric":"m","aligner":"ALIGN_MEAN","filter":"f","instanceName":"vm-a"}"#,
        )
        .unwrap();

        assert!(job.tag_path.is_empty());
        assert_eq!(job.alignment_period, "60s");
        assert_eq!(job.entity_label(), "vm-a");
    }

    #[test]
    fn pinned_window_ignores_now() {
        let day = TimeWindow::resolve(utc("2024-03-14T18:00:00Z"), 8, IntervalType::Day).unwrap();
        let job = disk_job().pinned_to(&day, 8);

        let replayed = job.window(0, utc("2030-01-01T00:00:00Z")).unwrap();

        assert_eq!(replayed, day);
        assert_eq!(job.entity_label(), "vm-a/disk/sdb");
    }

    #[test]
    fn unpinned_window_is_previous_day() {
        let job = disk_job();
        let w = job.window(8, utc("2024-03-14T18:00:00Z")).unwrap();

        assert_eq!(w.end(), utc("2024-03-14T16:00:00Z"));
        assert_eq!(w.duration(), Duration::hours(24));
    }

    #[test]
    fn half_pinned_window_is_rejected() {
        let mut job = disk_job();
        job.interval_start = Some(utc("2024-03-14T00:00:00Z"));
        assert!(matches!(job.window(0, Utc::now()), Err(ExportError::Config(_))));
    }

    #[test]
    fn aggregation_parses_period() {
        let agg = disk_job().with_alignment_period("300s").aggregation().unwrap();
        assert_eq!(agg.alignment_period, Duration::minutes(5));
        assert_eq!(agg.per_series_aligner, PerSeriesAligner::Rate);
        assert!(disk_job().with_alignment_period("5m").aggregation().is_err());
    }
}
