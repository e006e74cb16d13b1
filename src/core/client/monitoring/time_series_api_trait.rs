use async_trait::async_trait;
use chrono::Duration;

use crate::core::client::monitoring::time_series_dto::ListTimeSeriesResponse;
use crate::domain::metric::catalog::PerSeriesAligner;
use crate::domain::metric::time_window::TimeWindow;
use crate::errors::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSeriesView {
    Full,
    /// Labels only, no point payload.
    Headers,
}

impl TimeSeriesView {
    pub fn as_code(&self) -> &'static str {
        match self {
            TimeSeriesView::Full => "FULL",
            TimeSeriesView::Headers => "HEADERS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregation {
    pub per_series_aligner: PerSeriesAligner,
    pub alignment_period: Duration,
}

impl Aggregation {
    /// `60s` style duration string.
    pub fn alignment_period_code(&self) -> String {
        format!("{}s", self.alignment_period.num_seconds())
    }
}

#[derive(Debug, Clone)]
pub struct ListTimeSeriesRequest<'a> {
    pub project_id: &'a str,
    pub filter: &'a str,
    pub window: &'a TimeWindow,
    pub aggregation: Option<Aggregation>,
    pub view: TimeSeriesView,
    pub page_token: Option<String>,
}

/// One page of `projects.timeSeries.list`.
#[async_trait]
pub trait TimeSeriesApi: Send + Sync {
    async fn list_time_series(
        &self,
        request: &ListTimeSeriesRequest<'_>,
    ) -> Result<ListTimeSeriesResponse, ExportError>;
}
