//! Export routes (/api/v1/export and /api/v1/export/run)

use axum::{routing::post, Router};
use crate::api::controller::export::ExportController;
use crate::app_state::AppState;

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/export", post(ExportController::export_one))
        .route("/export/run", post(ExportController::run_export))
}
