use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::core::client::auth::TokenSource;
use crate::errors::ExportError;

pub const RESOURCE_MANAGER_BASE_URL: &str = "https://cloudresourcemanager.googleapis.com";

/// Lists the projects visible to the exporter's credentials.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn list_active_projects(&self) -> Result<Vec<String>, ExportError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProjectsResponse {
    #[serde(default)]
    projects: Vec<ProjectDto>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDto {
    project_id: String,
}

/// Cloud Resource Manager v1 `projects.list`.
pub struct ResourceManagerClient {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
}

impl ResourceManagerClient {
    pub fn new(http: Client, tokens: Arc<dyn TokenSource>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            tokens,
            base_url: base_url.into(),
        }
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<ListProjectsResponse, ExportError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/v1/projects", self.base_url.trim_end_matches('/'));

        let mut query = vec![("filter", "lifecycleState:ACTIVE")];
        if let Some(t) = page_token {
            query.push(("pageToken", t));
        }

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| ExportError::Transport(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let text = resp.text().await.unwrap_or_default();
            return Err(ExportError::Auth(format!("{status} from resource manager: {text}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExportError::Api {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| ExportError::Api {
            status: status.as_u16(),
            body: format!("invalid projects response: {e}"),
        })
    }
}

#[async_trait]
impl ProjectDirectory for ResourceManagerClient {
    async fn list_active_projects(&self) -> Result<Vec<String>, ExportError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            ids.extend(page.projects.into_iter().map(|p| p.project_id));

            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }

        info!(count = ids.len(), "Listed active projects");
        Ok(ids)
    }
}

/// Configured projects first, then discovered ones not already listed.
pub fn merge_project_ids(configured: &[String], discovered: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = configured.to_vec();
    for id in discovered {
        if !merged.contains(&id) {
            merged.push(id);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_projects_page() {
        let body = r#"{
            "projects": [
                {"projectNumber": "1", "projectId": "alpha", "lifecycleState": "ACTIVE"},
                {"projectNumber": "2", "projectId": "beta", "lifecycleState": "ACTIVE"}
            ],
            "nextPageToken": "n"
        }"#;

        let parsed: ListProjectsResponse = serde_json::from_str(body).unwrap();
        let ids: Vec<&str> = parsed.projects.iter().map(|p| p.project_id.as_str()).collect();

        assert_eq!(ids, vec!["alpha", "beta"]);
        assert_eq!(parsed.next_page_token.as_deref(), Some("n"));
    }

    #[test]
    fn merge_keeps_configured_order_first() {
        let merged = merge_project_ids(
            &["p2".to_string(), "p1".to_string()],
            vec!["p1".into(), "p3".into(), "p0".into()],
        );
        assert_eq!(merged, vec!["p2", "p1", "p3", "p0"]);
    }
}
