use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::core::client::auth::{MetadataTokenSource, StaticTokenSource, TokenSource};
use crate::core::client::monitoring::gateway::MonitoringGateway;
use crate::core::client::monitoring::monitoring_client::{StackdriverClient, MONITORING_BASE_URL};
use crate::core::client::projects::{ProjectDirectory, ResourceManagerClient, RESOURCE_MANAGER_BASE_URL};
use crate::core::config::app_config::AppConfig;
use crate::core::persistence::export::build_exporter;
use crate::domain::export::service::export_service::ExportService;
use crate::domain::metric::catalog::MetricCatalog;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub export_service: Arc<ExportService>,
    pub http: Client,
    /// Present only when project discovery is enabled.
    pub projects: Option<Arc<dyn ProjectDirectory>>,
}

/// Builds the shared HTTP client and credentials once and wires every service.
pub fn build_app_state(config: AppConfig) -> Result<AppState> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let tokens: Arc<dyn TokenSource> = match config.access_token.as_deref() {
        Some(token) => {
            info!("Using access token from environment");
            Arc::new(StaticTokenSource::new(token))
        }
        None => Arc::new(MetadataTokenSource::new(http.clone())),
    };

    let api = Arc::new(StackdriverClient::new(http.clone(), tokens.clone(), MONITORING_BASE_URL));
    let gateway = MonitoringGateway::new(api, config.retry.to_policy());
    let exporter = build_exporter(&config, http.clone(), tokens.clone())?;

    let export_service = Arc::new(ExportService::new(
        gateway,
        exporter,
        MetricCatalog::builtin(),
        config.timezone,
    ));

    let projects: Option<Arc<dyn ProjectDirectory>> = config.discover_projects.then(|| {
        Arc::new(ResourceManagerClient::new(http.clone(), tokens.clone(), RESOURCE_MANAGER_BASE_URL))
            as Arc<dyn ProjectDirectory>
    });

    info!(
        exporter = export_service.exporter_kind(),
        dispatch = config.dispatch.as_code(),
        timezone = config.timezone,
        "✅ Application state initialized"
    );

    Ok(AppState {
        config: Arc::new(config),
        export_service,
        http,
        projects,
    })
}
