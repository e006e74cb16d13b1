//! System controller: runtime configuration summary

use axum::extract::State;
use axum::Json;

use crate::api::dto::system_dto::SystemStatus;
use crate::api::dto::ApiResponse;
use crate::api::util::json::to_json;
use crate::app_state::AppState;
use crate::errors::AppError;
use crate::scheduler::tasks::export::resolve_projects;

pub struct SystemController;

impl SystemController {
    pub async fn status(
        State(state): State<AppState>,
    ) -> Result<Json<ApiResponse<SystemStatus>>, AppError> {
        to_json(Ok(SystemStatus::from_config(&state.config)))
    }

    /// The project order the next run would export.
    pub async fn projects(
        State(state): State<AppState>,
    ) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
        let result = resolve_projects(&state)
            .await
            .map(|projects| projects.into_iter().map(|p| p.project_id).collect());
        to_json(result)
    }
}
