use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::client::monitoring::mappers::map_points_to_raw;
use crate::core::client::monitoring::retry::RetryPolicy;
use crate::core::client::monitoring::time_series_api_trait::{
    Aggregation, ListTimeSeriesRequest, TimeSeriesApi, TimeSeriesView,
};
use crate::core::client::monitoring::time_series_dto::TimeSeriesDto;
use crate::domain::metric::aligned_series::RawPoint;
use crate::domain::metric::entity::EntityRef;
use crate::domain::metric::filter::{make_discovery_filter, DEVICE_NAME_KEY, INSTANCE_NAME_KEY};
use crate::domain::metric::time_window::TimeWindow;
use crate::errors::ExportError;

/// Entity discovery and single-series retrieval on top of [`TimeSeriesApi`].
pub struct MonitoringGateway {
    api: Arc<dyn TimeSeriesApi>,
    retry: RetryPolicy,
}

impl MonitoringGateway {
    pub fn new(api: Arc<dyn TimeSeriesApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Distinct instances reporting `metric_type` within the window.
    pub async fn discover_instances(
        &self,
        project_id: &str,
        metric_type: &str,
        window: &TimeWindow,
    ) -> Result<BTreeSet<EntityRef>, ExportError> {
        let headers = self.list_headers(project_id, metric_type, window).await?;

        let instances: BTreeSet<EntityRef> = headers
            .iter()
            .filter_map(|s| s.metric_label(INSTANCE_NAME_KEY))
            .map(EntityRef::instance)
            .collect();

        info!(project_id, metric = metric_type, count = instances.len(), "Discovered instances");
        Ok(instances)
    }

    /// Distinct `(instance, device)` pairs reporting `metric_type` within the window.
    pub async fn discover_instance_disks(
        &self,
        project_id: &str,
        metric_type: &str,
        window: &TimeWindow,
    ) -> Result<BTreeSet<EntityRef>, ExportError> {
        let headers = self.list_headers(project_id, metric_type, window).await?;

        let disks: BTreeSet<EntityRef> = headers
            .iter()
            .filter_map(|s| {
                let instance = s.metric_label(INSTANCE_NAME_KEY)?;
                let device = s.metric_label(DEVICE_NAME_KEY)?;
                Some(EntityRef::disk(instance, device))
            })
            .collect();

        info!(project_id, metric = metric_type, count = disks.len(), "Discovered disks");
        Ok(disks)
    }

    /// Points of the single series matching `filter`, newest first.
    pub async fn fetch_series(
        &self,
        project_id: &str,
        filter: &str,
        window: &TimeWindow,
        aggregation: &Aggregation,
    ) -> Result<Vec<RawPoint>, ExportError> {
        let series = self
            .list_all(project_id, filter, window, Some(*aggregation), TimeSeriesView::Full)
            .await?;

        match series.as_slice() {
            [] => Err(ExportError::NoSeries {
                filter: filter.to_string(),
            }),
            [only] => {
                let raw = map_points_to_raw(&only.points);
                debug!(project_id, filter, points = raw.len(), "Fetched series");
                Ok(raw)
            }
            many => Err(ExportError::AmbiguousSeries {
                filter: filter.to_string(),
                count: many.len(),
            }),
        }
    }

    async fn list_headers(
        &self,
        project_id: &str,
        metric_type: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TimeSeriesDto>, ExportError> {
        let filter = make_discovery_filter(metric_type)?;
        self.list_all(project_id, &filter, window, None, TimeSeriesView::Headers)
            .await
    }

    /// Follows `nextPageToken` until exhausted; each page is retried on its own.
    async fn list_all(
        &self,
        project_id: &str,
        filter: &str,
        window: &TimeWindow,
        aggregation: Option<Aggregation>,
        view: TimeSeriesView,
    ) -> Result<Vec<TimeSeriesDto>, ExportError> {
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = ListTimeSeriesRequest {
                project_id,
                filter,
                window,
                aggregation,
                view,
                page_token: page_token.take(),
            };

            let page = self
                .retry
                .run("timeSeries.list", || self.api.list_time_series(&request))
                .await?;

            all.extend(page.time_series);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(all)
    }
}
