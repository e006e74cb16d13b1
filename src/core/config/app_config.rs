use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::core::client::monitoring::retry::RetryPolicy;
use crate::domain::metric::catalog::PerSeriesAligner;
use crate::domain::metric::time_window::IntervalType;
use crate::errors::ExportError;

pub const CONFIG_PATH_ENV: &str = "EXPORTER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Where exported files land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExporterKind {
    #[default]
    #[serde(rename = "FileExporter")]
    File,
    #[serde(rename = "GCSExporter")]
    Gcs,
}

impl ExporterKind {
    pub fn as_code(&self) -> &'static str {
        match self {
            ExporterKind::File => "FileExporter",
            ExporterKind::Gcs => "GCSExporter",
        }
    }
}

/// How export jobs are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Inline,
    LocalQueue,
    HttpQueue,
}

impl DispatchMode {
    pub fn as_code(&self) -> &'static str {
        match self {
            DispatchMode::Inline => "inline",
            DispatchMode::LocalQueue => "local_queue",
            DispatchMode::HttpQueue => "http_queue",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(DispatchMode::Inline),
            "local_queue" => Some(DispatchMode::LocalQueue),
            "http_queue" => Some(DispatchMode::HttpQueue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: StdDuration::from_millis(self.base_delay_ms),
            max_delay: StdDuration::from_millis(self.max_delay_ms.max(self.base_delay_ms)),
        }
    }
}

/// Legacy per-metric export: explicit filter, window and aligner.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MetricOverride {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub metric_type: String,
    #[serde(default)]
    pub and_filters: Vec<String>,
    #[serde(default)]
    pub interval_type: IntervalType,
    /// Falls back to the global timezone.
    #[serde(default)]
    #[validate(range(min = -23, max = 23))]
    pub timezone: Option<i32>,
    #[serde(default)]
    pub aggregation_per_series_aligner: PerSeriesAligner,
    #[serde(default = "default_alignment_period")]
    pub aggregation_alignment_period: String,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProjectConfig {
    #[serde(rename = "projectID")]
    #[validate(length(min = 1))]
    pub project_id: String,
    #[serde(default)]
    #[validate(nested)]
    pub metrics: Vec<MetricOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Whole hours east of UTC.
    #[serde(default)]
    #[validate(range(min = -23, max = 23))]
    pub timezone: i32,

    #[serde(default)]
    pub exporter_class: ExporterKind,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub dispatch: DispatchMode,

    #[serde(default = "default_queue_workers")]
    #[validate(range(min = 1, max = 64))]
    pub queue_workers: usize,

    #[serde(default)]
    #[validate(url)]
    pub worker_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Append every active project visible to the credentials.
    #[serde(default)]
    pub discover_projects: bool,

    /// Run the export at every local midnight while serving.
    #[serde(default)]
    pub schedule_daily: bool,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Only ever set from the environment.
    #[serde(skip)]
    pub access_token: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub projects: Vec<ProjectConfig>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("metrics")
}

fn default_queue_workers() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_alignment_period() -> String {
    "60s".to_string()
}

impl AppConfig {
    /// Reads the YAML file named by `EXPORTER_CONFIG` and applies env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(Path::new(&path))?;

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.check()?;

        info!(
            path = %path,
            projects = config.projects.len(),
            exporter = config.exporter_class.as_code(),
            dispatch = config.dispatch.as_code(),
            "✅ Configuration loaded"
        );
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(raw).context("Failed to parse config YAML")?;
        config.check()?;
        Ok(config)
    }

    /// Environment overrides; `lookup` is `std::env::var` outside tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ExportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("EXPORTER_OUTPUT_DIR").filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("EXPORTER_BIND_ADDR").filter(|v| !v.is_empty()) {
            self.bind_addr = addr;
        }
        if let Some(mode) = lookup("EXPORTER_DISPATCH").filter(|v| !v.is_empty()) {
            self.dispatch = DispatchMode::from_code(&mode)
                .ok_or_else(|| ExportError::Config(format!("unknown dispatch mode `{mode}`")))?;
        }
        if let Some(token) = lookup("EXPORTER_ACCESS_TOKEN").filter(|v| !v.is_empty()) {
            self.access_token = Some(token);
        }
        Ok(())
    }

    /// Field validation plus the rules spanning several fields.
    pub fn check(&self) -> Result<(), ExportError> {
        self.validate()
            .map_err(|e| ExportError::Config(e.to_string()))?;

        if self.exporter_class == ExporterKind::Gcs
            && self.bucket.as_deref().map_or(true, str::is_empty)
        {
            return Err(ExportError::Config("GCSExporter requires `bucket`".into()));
        }
        if self.dispatch == DispatchMode::HttpQueue && self.worker_url.is_none() {
            return Err(ExportError::Config("http_queue dispatch requires `workerUrl`".into()));
        }
        for project in &self.projects {
            for metric in &project.metrics {
                parse_alignment_period(&metric.aggregation_alignment_period)?;
            }
        }
        Ok(())
    }

    pub fn project_ids(&self) -> Vec<String> {
        self.projects.iter().map(|p| p.project_id.clone()).collect()
    }

    pub fn overrides_for(&self, project_id: &str) -> &[MetricOverride] {
        self.projects
            .iter()
            .find(|p| p.project_id == project_id)
            .map(|p| p.metrics.as_slice())
            .unwrap_or(&[])
    }
}

/// Parses a `"<seconds>s"` alignment period such as `60s`.
pub fn parse_alignment_period(raw: &str) -> Result<Duration, ExportError> {
    let secs = raw
        .trim()
        .strip_suffix('s')
        .and_then(|n| n.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| ExportError::Config(format!("invalid alignment period `{raw}`")))?;
    Ok(Duration::seconds(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
timezone: 8
exporterClass: GCSExporter
bucket: metrics-bucket
dispatch: local_queue
queueWorkers: 2
retry: { maxAttempts: 3, baseDelayMs: 100, maxDelayMs: 1000 }
projects:
  - projectID: p1
    metrics:
      - title: cpu
        metricType: compute.googleapis.com/instance/cpu/utilization
        andFilters: ['resource.label.zone="asia-east1-a"']
        intervalType: hour
        aggregationPerSeriesAligner: ALIGN_MAX
        aggregationAlignmentPeriod: 300s
        unit: percent
  - projectID: p2
"#;

    #[test]
    fn parses_full_config() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.timezone, 8);
        assert_eq!(config.exporter_class, ExporterKind::Gcs);
        assert_eq!(config.dispatch, DispatchMode::LocalQueue);
        assert_eq!(config.queue_workers, 2);
        assert_eq!(config.project_ids(), vec!["p1", "p2"]);

        let cpu = &config.overrides_for("p1")[0];
        assert_eq!(cpu.interval_type, IntervalType::Hour);
        assert_eq!(cpu.aggregation_per_series_aligner, PerSeriesAligner::Max);
        assert_eq!(cpu.timezone, None);
        assert!(config.overrides_for("p2").is_empty());

        let policy = config.retry.to_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, StdDuration::from_millis(100));
    }

    #[test]
    fn defaults_apply_to_minimal_config() {
        let config = AppConfig::from_yaml_str("projects: [{projectID: p1}]").unwrap();

        assert_eq!(config.timezone, 0);
        assert_eq!(config.exporter_class, ExporterKind::File);
        assert_eq!(config.dispatch, DispatchMode::Inline);
        assert_eq!(config.output_dir, PathBuf::from("metrics"));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.retry.max_attempts, RetryPolicy::default().max_attempts);
        assert!(!config.discover_projects);
    }

    #[test]
    fn rejects_out_of_range_timezone() {
        assert!(AppConfig::from_yaml_str("timezone: 24").is_err());
        assert!(AppConfig::from_yaml_str("timezone: -23").is_ok());
    }

    #[test]
    fn rejects_gcs_without_bucket_and_http_queue_without_url() {
        assert!(AppConfig::from_yaml_str("exporterClass: GCSExporter").is_err());
        assert!(AppConfig::from_yaml_str("dispatch: http_queue").is_err());
        assert!(AppConfig::from_yaml_str(
            "dispatch: http_queue\nworkerUrl: http://worker:8080/api/v1/export"
        )
        .is_ok());
    }

    #[test]
    fn rejects_empty_project_id_and_bad_period() {
        assert!(AppConfig::from_yaml_str("projects: [{projectID: ''}]").is_err());
        assert!(AppConfig::from_yaml_str(
            "projects: [{projectID: p1, metrics: [{title: t, metricType: m, aggregationAlignmentPeriod: 1m}]}]"
        )
        .is_err());
    }

    #[test]
    fn env_overrides_win() {
        let mut config = AppConfig::from_yaml_str("outputDir: out").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("EXPORTER_OUTPUT_DIR", "/data/metrics"),
            ("EXPORTER_DISPATCH", "HTTP_QUEUE"),
            ("EXPORTER_ACCESS_TOKEN", "tok"),
        ]);

        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/data/metrics"));
        assert_eq!(config.dispatch, DispatchMode::HttpQueue);
        assert_eq!(config.access_token.as_deref(), Some("tok"));
        assert!(config.check().is_err());
    }

    #[test]
    fn unknown_dispatch_override_is_a_config_error() {
        let mut config = AppConfig::from_yaml_str("{}").unwrap();
        let err = config
            .apply_overrides(|k| (k == "EXPORTER_DISPATCH").then(|| "carrier-pigeon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[test]
    fn alignment_period_parsing() {
        assert_eq!(parse_alignment_period("60s").unwrap(), Duration::seconds(60));
        assert_eq!(parse_alignment_period(" 300s ").unwrap(), Duration::minutes(5));
        assert!(parse_alignment_period("0s").is_err());
        assert!(parse_alignment_period("60").is_err());
    }
}
