//! Export controller: cron trigger and single-job worker replay

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Form, Json};
use chrono::Utc;
use tracing::{error, info};

use crate::api::dto::export_dto::RunExportQuery;
use crate::api::dto::ApiResponse;
use crate::app_state::AppState;
use crate::domain::export::dispatcher::DispatchOutcome;
use crate::domain::export::export_job::ExportJob;
use crate::domain::export::report::ExportRunReport;
use crate::errors::{internal_error, AppError};
use crate::scheduler::tasks::export;

pub struct ExportController;

impl ExportController {
    /// Runs the full fan-out. Any failed job turns the response into a 500.
    pub async fn run_export(
        State(state): State<AppState>,
        Query(query): Query<RunExportQuery>,
    ) -> Result<(StatusCode, Json<ApiResponse<ExportRunReport>>), AppError> {
        let now = query.now.unwrap_or_else(Utc::now);
        let report = export::run(&state, now)
            .await
            .map_err(|e| internal_error(format!("{e:#}")))?;

        let status = if report.has_failures() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        Ok((status, Json(ApiResponse::ok(report))))
    }

    /// Worker endpoint: replays one deferred job posted by the task queue.
    pub async fn export_one(
        State(state): State<AppState>,
        Form(job): Form<ExportJob>,
    ) -> Result<Json<ApiResponse<DispatchOutcome>>, AppError> {
        info!(
            project_id = %job.project_id,
            metric = %job.metric_type,
            instance = %job.entity_label(),
            "Received export task"
        );

        match state.export_service.export_job(&job).await {
            Ok(outcome) => Ok(Json(ApiResponse::ok(outcome))),
            Err(e) => {
                error!(
                    project_id = %job.project_id,
                    metric = %job.metric_type,
                    error = %e,
                    "❌ Export task failed"
                );
                Err(e.into())
            }
        }
    }
}
