use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::app_state::AppState;
use crate::domain::export::dispatcher::{DispatchOutcome, JobDispatcher};
use crate::domain::export::export_job::ExportJob;
use crate::errors::ExportError;
use crate::scheduler::tasks::export::resolve_projects;

pub const DRY_RUN_ENV: &str = "EXPORTER_DRY_RUN";

/// Records every job instead of running it.
#[derive(Default)]
pub struct PlanDispatcher {
    jobs: Mutex<Vec<ExportJob>>,
}

impl PlanDispatcher {
    pub fn into_jobs(self) -> Vec<ExportJob> {
        self.jobs.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl JobDispatcher for PlanDispatcher {
    async fn dispatch(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError> {
        info!(
            project_id = %job.project_id,
            metric = %job.metric_type,
            instance = %job.entity_label(),
            filter = %job.filter,
            "🔧 Planned export"
        );
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(job.clone());
        Ok(DispatchOutcome::Enqueued)
    }

    fn mode(&self) -> &'static str {
        "dry_run"
    }
}

/// Runs discovery only and logs the jobs a real run would produce.
pub async fn run_debug(state: &AppState) -> Result<Vec<ExportJob>> {
    info!("🔧 Dry run: discovering entities without exporting...");

    let projects = resolve_projects(state).await?;
    let planner = PlanDispatcher::default();
    state
        .export_service
        .run(Utc::now(), &projects, &planner)
        .await?;

    let jobs = planner.into_jobs();
    info!(jobs = jobs.len(), "Dry run completed. Exiting...");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::catalog::PerSeriesAligner;

    #[tokio::test]
    async fn planner_collects_jobs_in_order() {
        let planner = PlanDispatcher::default();
        for instance in ["vm-a", "vm-b"] {
            let job = ExportJob::new(
                "p1",
                "compute.googleapis.com/instance/cpu/utilization",
                PerSeriesAligner::Mean,
                "metric.type=\"x\"",
                instance,
            );
            assert_eq!(planner.dispatch(&job).await.unwrap(), DispatchOutcome::Enqueued);
        }

        let jobs = planner.into_jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].instance_name, "vm-a");
        assert_eq!(jobs[1].instance_name, "vm-b");
    }
}
