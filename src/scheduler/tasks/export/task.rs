use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::core::client::projects::merge_project_ids;
use crate::core::config::app_config::{DispatchMode, ProjectConfig};
use crate::core::queue::http_task_queue::HttpTaskQueue;
use crate::core::queue::local_task_queue::LocalTaskQueue;
use crate::domain::export::dispatcher::{InlineDispatcher, QueueDispatcher};
use crate::domain::export::report::ExportRunReport;

/// Jobs buffered per local worker before `enqueue` waits.
const LOCAL_QUEUE_DEPTH_PER_WORKER: usize = 16;

/// One orchestrated export for the window ending at `now`'s local midnight.
pub async fn run(state: &AppState, now: DateTime<Utc>) -> Result<ExportRunReport> {
    let projects = resolve_projects(state).await?;
    let service = Arc::clone(&state.export_service);
    let config = &state.config;

    let report = match config.dispatch {
        DispatchMode::Inline => {
            let dispatcher = InlineDispatcher::new(service.clone());
            service.run(now, &projects, &dispatcher).await?
        }
        DispatchMode::LocalQueue => {
            let workers = config.queue_workers;
            let (queue, pool) = LocalTaskQueue::start(
                service.clone(),
                workers,
                workers * LOCAL_QUEUE_DEPTH_PER_WORKER,
            );
            let dispatcher = QueueDispatcher::new(Arc::new(queue));
            let mut report = service.run(now, &projects, &dispatcher).await?;

            // closing the last sender lets the workers drain and stop
            drop(dispatcher);
            let stats = pool.join().await;
            report.exported += stats.exported;
            report.no_data += stats.no_data;
            report.failures.extend(stats.failures);
            report
        }
        DispatchMode::HttpQueue => {
            let url = config
                .worker_url
                .clone()
                .context("http_queue dispatch requires workerUrl")?;
            let queue = HttpTaskQueue::new(state.http.clone(), url, config.retry.to_policy());
            service
                .run(now, &projects, &QueueDispatcher::new(Arc::new(queue)))
                .await?
        }
    };

    Ok(report)
}

/// Configured projects, followed by discovered ones when enabled.
pub async fn resolve_projects(state: &AppState) -> Result<Vec<ProjectConfig>> {
    let configured = state.config.projects.clone();

    let Some(directory) = state.projects.as_ref().filter(|_| state.config.discover_projects) else {
        return Ok(configured);
    };

    let discovered = match directory.list_active_projects().await {
        Ok(ids) => ids,
        Err(e) if e.is_fatal() => return Err(e).context("Project discovery failed"),
        Err(e) => {
            warn!(error = %e, "⚠️ Project discovery failed, using configured projects only");
            return Ok(configured);
        }
    };

    let order = merge_project_ids(&state.config.project_ids(), discovered);
    let projects: Vec<ProjectConfig> = order
        .into_iter()
        .map(|id| {
            configured
                .iter()
                .find(|p| p.project_id == id)
                .cloned()
                .unwrap_or(ProjectConfig {
                    project_id: id,
                    metrics: Vec::new(),
                })
        })
        .collect();

    info!(
        configured = configured.len(),
        total = projects.len(),
        "Resolved projects for export"
    );
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::monitoring::gateway::MonitoringGateway;
    use crate::core::client::monitoring::retry::RetryPolicy;
    use crate::core::client::monitoring::time_series_api_trait::{ListTimeSeriesRequest, TimeSeriesApi};
    use crate::core::client::monitoring::time_series_dto::ListTimeSeriesResponse;
    use crate::core::client::projects::ProjectDirectory;
    use crate::core::config::app_config::AppConfig;
    use crate::core::persistence::export::file_exporter::FileExporter;
    use crate::domain::export::service::export_service::ExportService;
    use crate::domain::metric::catalog::MetricCatalog;
    use crate::errors::ExportError;
    use async_trait::async_trait;

    /// Every query comes back empty.
    struct EmptyApi;

    #[async_trait]
    impl TimeSeriesApi for EmptyApi {
        async fn list_time_series(
            &self,
            _request: &ListTimeSeriesRequest<'_>,
        ) -> Result<ListTimeSeriesResponse, ExportError> {
            Ok(ListTimeSeriesResponse::default())
        }
    }

    enum Directory {
        Found(Vec<&'static str>),
        Unavailable,
        Denied,
    }

    #[async_trait]
    impl ProjectDirectory for Directory {
        async fn list_active_projects(&self) -> Result<Vec<String>, ExportError> {
            match self {
                Directory::Found(ids) => Ok(ids.iter().map(|s| s.to_string()).collect()),
                Directory::Unavailable => Err(ExportError::Transport("reset".into())),
                Directory::Denied => Err(ExportError::Auth("denied".into())),
            }
        }
    }

    fn state(yaml: &str, directory: Option<Directory>, root: &std::path::Path) -> AppState {
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        let gateway = MonitoringGateway::new(Arc::new(EmptyApi), RetryPolicy::no_retry());
        let service = ExportService::new(
            gateway,
            Arc::new(FileExporter::new(root)),
            MetricCatalog::builtin(),
            config.timezone,
        );

        AppState {
            config: Arc::new(config),
            export_service: Arc::new(service),
            http: reqwest::Client::new(),
            projects: directory.map(|d| Arc::new(d) as Arc<dyn ProjectDirectory>),
        }
    }

    const DISCOVERING: &str = r#"
discoverProjects: true
projects:
  - projectID: p2
    metrics:
      - { title: cpu, metricType: compute.googleapis.com/instance/cpu/utilization }
  - projectID: p1
"#;

    #[tokio::test]
    async fn discovered_projects_follow_configured_ones() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state(DISCOVERING, Some(Directory::Found(vec!["p1", "p3"])), tmp.path());

        let projects = resolve_projects(&state).await.unwrap();

        let ids: Vec<&str> = projects.iter().map(|p| p.project_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1", "p3"]);
        assert_eq!(projects[0].metrics.len(), 1);
        assert!(projects[2].metrics.is_empty());
    }

    #[tokio::test]
    async fn transient_discovery_failure_keeps_configured_projects() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state(DISCOVERING, Some(Directory::Unavailable), tmp.path());

        let projects = resolve_projects(&state).await.unwrap();
        assert_eq!(projects.len(), 2);
    }

    #[tokio::test]
    async fn denied_discovery_fails_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state(DISCOVERING, Some(Directory::Denied), tmp.path());

        assert!(run(&state, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn local_queue_results_are_merged_into_the_report() {
        let tmp = tempfile::tempdir().unwrap();
        let yaml = r#"
dispatch: local_queue
queueWorkers: 2
projects:
  - projectID: p1
    metrics:
      - { title: cpu, metricType: compute.googleapis.com/instance/cpu/utilization }
      - { title: mem, metricType: agent.googleapis.com/memory/percent_used }
"#;
        let state = state(yaml, None, tmp.path());

        let report = run(&state, Utc::now()).await.unwrap();

        assert_eq!(report.enqueued, 2);
        assert_eq!(report.no_data, 2);
        assert_eq!(report.exported, 0);
        assert!(!report.has_failures());
    }
}
