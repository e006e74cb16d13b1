use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::core::client::auth::TokenSource;
use crate::core::client::monitoring::time_series_api_trait::{ListTimeSeriesRequest, TimeSeriesApi};
use crate::core::client::monitoring::time_series_dto::ListTimeSeriesResponse;
use crate::errors::ExportError;

pub const MONITORING_BASE_URL: &str = "https://monitoring.googleapis.com";

/// Cloud Monitoring v3 REST client.
///
/// The HTTP client and token source are built once at startup and shared.
pub struct StackdriverClient {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
}

impl StackdriverClient {
    pub fn new(http: Client, tokens: Arc<dyn TokenSource>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            tokens,
            base_url: base_url.into(),
        }
    }

    fn time_series_url(&self, project_id: &str) -> String {
        format!(
            "{}/v3/projects/{}/timeSeries",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(project_id)
        )
    }
}

pub fn build_query_params(request: &ListTimeSeriesRequest<'_>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("filter", request.filter.to_string()),
        ("interval.startTime", request.window.start_rfc3339()),
        ("interval.endTime", request.window.end_rfc3339()),
        ("view", request.view.as_code().to_string()),
    ];

    if let Some(agg) = &request.aggregation {
        params.push(("aggregation.perSeriesAligner", agg.per_series_aligner.as_code().to_string()));
        params.push(("aggregation.alignmentPeriod", agg.alignment_period_code()));
    }

    if let Some(token) = &request.page_token {
        params.push(("pageToken", token.clone()));
    }

    params
}

#[async_trait]
impl TimeSeriesApi for StackdriverClient {
    async fn list_time_series(
        &self,
        request: &ListTimeSeriesRequest<'_>,
    ) -> Result<ListTimeSeriesResponse, ExportError> {
        let token = self.tokens.access_token().await?;
        let url = self.time_series_url(request.project_id);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&build_query_params(request))
            .send()
            .await
            .map_err(|e| ExportError::Transport(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = resp.text().await.unwrap_or_default();
            return Err(ExportError::Auth(format!("{status} from monitoring API: {text}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExportError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ListTimeSeriesResponse = resp.json().await.map_err(|e| ExportError::Api {
            status: status.as_u16(),
            body: format!("invalid response body: {e}"),
        })?;

        debug!(
            project_id = request.project_id,
            view = request.view.as_code(),
            series = parsed.time_series.len(),
            "Listed time series"
        );
        Ok(parsed)
    }
}
