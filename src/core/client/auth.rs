use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::ExportError;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const TOKEN_SCOPES: &str = "https://www.googleapis.com/auth/monitoring.read,https://www.googleapis.com/auth/devstorage.read_write,https://www.googleapis.com/auth/cloudplatformprojects.readonly";

/// Supplies bearer tokens for the monitoring, storage and project APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ExportError>;
}

/// Fixed token, e.g. from `EXPORTER_ACCESS_TOKEN`.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, ExportError> {
        if self.token.trim().is_empty() {
            return Err(ExportError::Auth("static access token is empty".into()));
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Default service-account token from the compute metadata server.
///
/// The token is cached and refreshed one minute before it expires.
pub struct MetadataTokenSource {
    http: Client,
    endpoint: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(http: Client) -> Self {
        Self::with_endpoint(http, METADATA_TOKEN_URL)
    }

    pub fn with_endpoint(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, ExportError> {
        let resp = self
            .http
            .get(&self.endpoint)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", TOKEN_SCOPES)])
            .send()
            .await
            .map_err(|e| ExportError::Auth(format!("metadata server unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ExportError::Auth(format!("metadata server returned {status}: {text}")));
        }

        let body: MetadataTokenResponse = resp
            .json()
            .await
            .map_err(|e| ExportError::Auth(format!("invalid metadata token response: {e}")))?;

        debug!(expires_in = body.expires_in, "Fetched access token from metadata server");
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn access_token(&self) -> Result<String, ExportError> {
        let mut guard = self.cached.lock().await;

        if let Some(token) = guard.as_ref() {
            if token.expires_at - Duration::seconds(60) > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }
}
