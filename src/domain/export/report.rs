use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::metric::time_window::TimeWindow;

#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub project_id: String,
    pub metric: String,
    /// `None` when discovery itself failed.
    pub instance: Option<String>,
    pub error: String,
}

/// Outcome counters of one orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRunReport {
    pub run_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub projects: usize,
    pub exported: usize,
    pub enqueued: usize,
    pub no_data: usize,
    pub failures: Vec<JobFailure>,
    /// Set when an auth or config error stopped the run early.
    pub aborted: Option<String>,
}

impl ExportRunReport {
    pub fn new(window: &TimeWindow) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            window_start: window.start(),
            window_end: window.end(),
            projects: 0,
            exported: 0,
            enqueued: 0,
            no_data: 0,
            failures: Vec::new(),
            aborted: None,
        }
    }

    pub fn record_failure(
        &mut self,
        project_id: &str,
        metric: &str,
        instance: Option<&str>,
        error: impl ToString,
    ) {
        self.failures.push(JobFailure {
            project_id: project_id.to_string(),
            metric: metric.to_string(),
            instance: instance.map(str::to_string),
            error: error.to_string(),
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.aborted.is_some()
    }
}
