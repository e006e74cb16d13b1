use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::core::client::monitoring::gateway::MonitoringGateway;
use crate::core::config::app_config::{MetricOverride, ProjectConfig};
use crate::core::persistence::export::metric_exporter_trait::{ExportRecord, MetricExporter};
use crate::domain::export::dispatcher::{DispatchOutcome, JobDispatcher, JobExecutor};
use crate::domain::export::export_job::ExportJob;
use crate::domain::export::report::ExportRunReport;
use crate::domain::metric::aligner::align_series;
use crate::domain::metric::catalog::{CatalogMetric, MetricCatalog, MetricKind};
use crate::domain::metric::entity::EntityRef;
use crate::domain::metric::filter::{
    make_agent_memory_filter, make_discovery_filter, make_disk_filter, make_instance_filter,
    with_and_filters,
};
use crate::domain::metric::time_window::{IntervalType, TimeWindow};
use crate::errors::ExportError;

/// Discovers entities per project and turns each into an export job.
pub struct ExportService {
    gateway: MonitoringGateway,
    exporter: Arc<dyn MetricExporter>,
    catalog: MetricCatalog,
    timezone_offset_hours: i32,
}

impl ExportService {
    pub fn new(
        gateway: MonitoringGateway,
        exporter: Arc<dyn MetricExporter>,
        catalog: MetricCatalog,
        timezone_offset_hours: i32,
    ) -> Self {
        Self {
            gateway,
            exporter,
            catalog,
            timezone_offset_hours,
        }
    }

    pub fn timezone_offset_hours(&self) -> i32 {
        self.timezone_offset_hours
    }

    pub fn exporter_kind(&self) -> &'static str {
        self.exporter.kind()
    }

    /// The previous local day relative to `now`.
    pub fn window_for(&self, now: DateTime<Utc>) -> Result<TimeWindow, ExportError> {
        TimeWindow::resolve(now, self.timezone_offset_hours, IntervalType::Day)
    }

    /// Fans out every project, sequentially and in order.
    ///
    /// Per-job failures are collected in the report; an auth or config error
    /// stops the run and is recorded in `aborted`.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        projects: &[ProjectConfig],
        dispatcher: &dyn JobDispatcher,
    ) -> Result<ExportRunReport, ExportError> {
        let window = self.window_for(now)?;
        let mut report = ExportRunReport::new(&window);

        info!(
            run_id = %report.run_id,
            projects = projects.len(),
            start = %window.start_rfc3339(),
            end = %window.end_rfc3339(),
            dispatch = dispatcher.mode(),
            "🚀 Export run started"
        );

        for project in projects {
            report.projects += 1;
            info!(project_id = %project.project_id, "Query metrics in project");

            let mut run = ProjectRun {
                service: self,
                project_id: &project.project_id,
                window: &window,
                dispatcher,
                report: &mut report,
            };

            if let Err(fatal) = run.export_project(now, &project.metrics).await {
                error!(project_id = %project.project_id, error = %fatal, "❌ Export run aborted");
                report.aborted = Some(fatal.to_string());
                break;
            }
        }

        info!(
            run_id = %report.run_id,
            exported = report.exported,
            enqueued = report.enqueued,
            no_data = report.no_data,
            failed = report.failures.len(),
            "✅ Export run finished"
        );
        Ok(report)
    }

    /// Replay entry point shared by inline dispatch and queue workers.
    pub async fn export_job(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError> {
        self.export_job_at(job, Utc::now()).await
    }

    pub async fn export_job_at(
        &self,
        job: &ExportJob,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, ExportError> {
        let window = job.window(self.timezone_offset_hours, now)?;
        let aggregation = job.aggregation()?;

        let raw = match self
            .gateway
            .fetch_series(&job.project_id, &job.filter, &window, &aggregation)
            .await
        {
            Ok(raw) => raw,
            Err(ExportError::NoSeries { filter }) => {
                warn!(
                    project_id = %job.project_id,
                    metric = %job.metric_type,
                    instance = %job.entity_label(),
                    filter = %filter,
                    "⚠️ No series for entity, skipping"
                );
                return Ok(DispatchOutcome::NoData);
            }
            Err(e) => return Err(e),
        };

        let series = align_series(&raw, &window, aggregation.alignment_period);
        let record = ExportRecord {
            local_date_time: window.local_start(),
            project_id: &job.project_id,
            metric_type: &job.metric_type,
            entity_name: &job.instance_name,
            series: &series,
            tag_path: &job.tag_path,
            unit: job.unit.as_deref(),
        };

        let location = self.exporter.export(&record).await?;
        Ok(DispatchOutcome::Exported {
            location,
            points: series.present_count(),
        })
    }

    fn catalog_job(
        &self,
        project_id: &str,
        metric: &CatalogMetric,
        entity: &EntityRef,
        filter: String,
        window: &TimeWindow,
    ) -> ExportJob {
        ExportJob::new(project_id, &metric.metric_type, metric.aligner, filter, &entity.instance_name)
            .with_tag_path(entity.tag_path())
            .with_alignment_period(format!("{}s", self.catalog.alignment_period.num_seconds()))
            .pinned_to(window, self.timezone_offset_hours)
    }
}

#[async_trait]
impl JobExecutor for ExportService {
    async fn execute(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError> {
        self.export_job(job).await
    }
}

/// State of one project within a run. `Err` means the whole run must stop.
struct ProjectRun<'a> {
    service: &'a ExportService,
    project_id: &'a str,
    window: &'a TimeWindow,
    dispatcher: &'a dyn JobDispatcher,
    report: &'a mut ExportRunReport,
}

impl ProjectRun<'_> {
    async fn export_project(
        &mut self,
        now: DateTime<Utc>,
        overrides: &[MetricOverride],
    ) -> Result<(), ExportError> {
        let service = self.service;
        let catalog = &service.catalog;

        // --- Step 1: instance metrics ---
        // outer `None`: discovery metric not listed yet; inner `None`: listing failed
        let mut discovered_instances: Option<Option<BTreeSet<EntityRef>>> = None;
        for metric in catalog.of_kind(MetricKind::Instance) {
            let instances = self.discover(metric, MetricKind::Instance).await?;
            for entity in instances.iter().flatten() {
                let filter = make_instance_filter(&metric.metric_type, &entity.instance_name);
                self.dispatch_catalog(metric, entity, filter).await?;
            }
            if catalog.discovery_metric() == Some(metric) {
                discovered_instances = Some(instances);
            }
        }

        // --- Step 2: agent metrics, listed through the discovery metric ---
        if catalog.of_kind(MetricKind::AgentMemory).next().is_some() {
            let instances = match discovered_instances {
                Some(instances) => instances,
                None => match catalog.discovery_metric() {
                    Some(metric) => self.discover(metric, MetricKind::Instance).await?,
                    None => None,
                },
            };

            for metric in catalog.of_kind(MetricKind::AgentMemory) {
                for entity in instances.iter().flatten() {
                    let filter = make_agent_memory_filter(&metric.metric_type, &entity.instance_name);
                    self.dispatch_catalog(metric, entity, filter).await?;
                }
            }
        }

        // --- Step 3: disk metrics ---
        for metric in catalog.of_kind(MetricKind::Disk) {
            let Some(disks) = self.discover(metric, MetricKind::Disk).await? else {
                continue;
            };
            for entity in &disks {
                let device = entity.device_name.as_deref().unwrap_or_default();
                let filter = make_disk_filter(&metric.metric_type, &entity.instance_name, device);
                self.dispatch_catalog(metric, entity, filter).await?;
            }
        }

        // --- Step 4: configured overrides ---
        for metric in overrides {
            match self.override_job(now, metric) {
                Ok(job) => self.dispatch(&job).await?,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.fail(&metric.metric_type, Some(&metric.title), &e),
            }
        }

        Ok(())
    }

    /// `Ok(None)` when discovery failed for a non-fatal reason.
    async fn discover(
        &mut self,
        metric: &CatalogMetric,
        kind: MetricKind,
    ) -> Result<Option<BTreeSet<EntityRef>>, ExportError> {
        let gateway = &self.service.gateway;
        let result: Result<BTreeSet<EntityRef>, ExportError> = match kind {
            MetricKind::Disk => {
                gateway
                    .discover_instance_disks(self.project_id, &metric.metric_type, self.window)
                    .await
            }
            _ => {
                gateway
                    .discover_instances(self.project_id, &metric.metric_type, self.window)
                    .await
            }
        };

        match result {
            Ok(entities) => Ok(Some(entities)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.fail(&metric.metric_type, None, &e);
                Ok(None)
            }
        }
    }

    async fn dispatch_catalog(
        &mut self,
        metric: &CatalogMetric,
        entity: &EntityRef,
        filter: Result<String, ExportError>,
    ) -> Result<(), ExportError> {
        match filter {
            Ok(filter) => {
                let job = self
                    .service
                    .catalog_job(self.project_id, metric, entity, filter, self.window);
                self.dispatch(&job).await
            }
            Err(e) => {
                self.fail(&metric.metric_type, Some(&entity.instance_name), &e);
                Ok(())
            }
        }
    }

    async fn dispatch(&mut self, job: &ExportJob) -> Result<(), ExportError> {
        match self.dispatcher.dispatch(job).await {
            Ok(DispatchOutcome::Exported { .. }) => self.report.exported += 1,
            Ok(DispatchOutcome::NoData) => self.report.no_data += 1,
            Ok(DispatchOutcome::Enqueued) => self.report.enqueued += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => self.fail(&job.metric_type, Some(&job.entity_label()), &e),
        }
        Ok(())
    }

    fn override_job(&self, now: DateTime<Utc>, metric: &MetricOverride) -> Result<ExportJob, ExportError> {
        let tz = metric.timezone.unwrap_or(self.service.timezone_offset_hours);
        let window = TimeWindow::resolve(now, tz, metric.interval_type)?;
        let filter = with_and_filters(make_discovery_filter(&metric.metric_type)?, &metric.and_filters);

        Ok(ExportJob::new(
            self.project_id,
            &metric.metric_type,
            metric.aggregation_per_series_aligner,
            filter,
            &metric.title,
        )
        .with_alignment_period(metric.aggregation_alignment_period.clone())
        .with_unit(metric.unit.clone())
        .pinned_to(&window, tz))
    }

    fn fail(&mut self, metric: &str, instance: Option<&str>, err: &ExportError) {
        error!(
            project_id = self.project_id,
            metric,
            instance = instance.unwrap_or("-"),
            error = %err,
            "❌ Export job failed"
        );
        self.report.record_failure(self.project_id, metric, instance, err);
    }
}
