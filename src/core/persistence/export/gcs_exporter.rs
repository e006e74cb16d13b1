use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::info;

use crate::core::client::auth::TokenSource;
use crate::core::client::monitoring::retry::RetryPolicy;
use crate::core::persistence::export::csv_format::render_csv;
use crate::core::persistence::export::export_path::object_key;
use crate::core::persistence::export::metric_exporter_trait::{ExportRecord, MetricExporter};
use crate::errors::ExportError;

pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";

/// Uploads CSV objects to a Cloud Storage bucket with the media upload API.
pub struct GcsExporter {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    bucket: String,
    prefix: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GcsExporter {
    pub fn new(
        http: Client,
        tokens: Arc<dyn TokenSource>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            tokens,
            bucket: bucket.into(),
            prefix: prefix.into(),
            base_url: STORAGE_BASE_URL.to_string(),
            retry,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Object name inside the bucket, prefixed like the local root directory.
    pub fn object_name(&self, key: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}/{key}")
        }
    }

    fn upload_url(&self, object_name: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.bucket),
            urlencoding::encode(object_name)
        )
    }

    async fn upload(&self, url: &str, body: &str) -> Result<(), ExportError> {
        let token = self.tokens.access_token().await?;

        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| ExportError::Transport(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = resp.text().await.unwrap_or_default();
            return Err(ExportError::Auth(format!("{status} from storage: {text}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExportError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetricExporter for GcsExporter {
    async fn export(&self, record: &ExportRecord<'_>) -> Result<String, ExportError> {
        let name = self.object_name(&object_key(record)?);
        let url = self.upload_url(&name);
        let body = render_csv(record.series);

        self.retry
            .run("storage.objects.insert", || self.upload(&url, &body))
            .await?;

        let location = format!("gs://{}/{}", self.bucket, name);
        info!(
            project_id = record.project_id,
            metric = record.metric_type,
            instance = record.entity_name,
            points = record.series.len(),
            object = %location,
            "☁️ Uploaded series to bucket"
        );
        Ok(location)
    }

    fn kind(&self) -> &'static str {
        "GCSExporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::auth::StaticTokenSource;

    fn exporter(prefix: &str) -> GcsExporter {
        GcsExporter::new(
            Client::new(),
            Arc::new(StaticTokenSource::new("t")),
            "my-bucket",
            prefix,
            RetryPolicy::no_retry(),
        )
    }

    #[test]
    fn object_names_use_prefix() {
        assert_eq!(exporter("metrics").object_name("p1/a.csv"), "metrics/p1/a.csv");
        assert_eq!(exporter("/metrics/").object_name("p1/a.csv"), "metrics/p1/a.csv");
        assert_eq!(exporter("").object_name("p1/a.csv"), "p1/a.csv");
    }

    type Uploads = Arc<std::sync::Mutex<Vec<(String, Option<String>, String)>>>;

    async fn upload_server(status: axum::http::StatusCode) -> (String, Uploads) {
        use axum::extract::{RawQuery, State};
        use axum::http::HeaderMap;
        use axum::routing::post;

        let uploads = Uploads::default();
        let router = axum::Router::new()
            .route(
                "/upload/storage/v1/b/{bucket}/o",
                post(
                    move |State(uploads): State<Uploads>,
                          RawQuery(query): RawQuery,
                          headers: HeaderMap,
                          body: String| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        uploads.lock().unwrap().push((query.unwrap_or_default(), auth, body));
                        status
                    },
                ),
            )
            .with_state(uploads.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), uploads)
    }

    fn record_series() -> crate::domain::metric::aligned_series::AlignedSeries {
        use crate::domain::metric::aligned_series::RawPoint;
        use crate::domain::metric::aligner::align_series;
        use crate::domain::metric::time_window::{IntervalType, TimeWindow};
        use chrono::{DateTime, Duration, Utc};

        let now = DateTime::parse_from_rfc3339("2024-03-14T18:00:00Z").unwrap().with_timezone(&Utc);
        let window = TimeWindow::resolve(now, 8, IntervalType::Hour).unwrap();
        align_series(&[RawPoint { time: window.start(), value: 1.5 }], &window, Duration::seconds(60))
    }

    #[tokio::test]
    async fn export_uploads_csv_with_bearer_token() {
        let (base_url, uploads) = upload_server(axum::http::StatusCode::OK).await;
        let gcs = exporter("metrics").with_base_url(base_url);
        let series = record_series();
        let record = ExportRecord {
            local_date_time: chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap(),
            project_id: "p1",
            metric_type: "compute.googleapis.com/instance/cpu/usage_time",
            entity_name: "vm-a",
            series: &series,
            tag_path: &[],
            unit: None,
        };

        let location = gcs.export(&record).await.unwrap();

        assert_eq!(
            location,
            "gs://my-bucket/metrics/p1/2024/03/15/vm-a/2024-03-15T01:00:00[vm-a][cpu_usage_time].csv"
        );
        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (query, auth, body) = &uploads[0];
        assert!(query.starts_with("uploadType=media&name=metrics%2Fp1%2F2024"));
        assert_eq!(auth.as_deref(), Some("Bearer t"));
        assert_eq!(body.lines().count(), 61);
        assert_eq!(body.lines().nth(1), Some("1710464400,2024-03-15 01:00:00,1.5"));
    }

    #[tokio::test]
    async fn forbidden_upload_is_an_auth_error() {
        let (base_url, _uploads) = upload_server(axum::http::StatusCode::FORBIDDEN).await;
        let gcs = exporter("").with_base_url(base_url);
        let series = record_series();
        let record = ExportRecord {
            local_date_time: chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap(),
            project_id: "p1",
            metric_type: "m",
            entity_name: "vm-a",
            series: &series,
            tag_path: &[],
            unit: None,
        };

        let err = gcs.export(&record).await.unwrap_err();
        assert!(matches!(err, ExportError::Auth(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn upload_url_encodes_object_name() {
        let url = exporter("metrics").upload_url("metrics/p1/2024-03-14T00:00:00[vm-a][cpu].csv");
        assert_eq!(
            url,
            "https://storage.googleapis.com/upload/storage/v1/b/my-bucket/o?uploadType=media&name=metrics%2Fp1%2F2024-03-14T00%3A00%3A00%5Bvm-a%5D%5Bcpu%5D.csv"
        );
    }
}
