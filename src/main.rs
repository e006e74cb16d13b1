use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use stackdriver_exporter::app_state::build_app_state;
use stackdriver_exporter::core::config::app_config::AppConfig;
use stackdriver_exporter::core::logging::{init_logging, LOG_DIR_ENV};
use stackdriver_exporter::debug::{run_debug, DRY_RUN_ENV};
use stackdriver_exporter::routes::app_router;
use stackdriver_exporter::scheduler::{spawn_daily_export, tasks};

const RUN_ONCE_ENV: &str = "EXPORTER_RUN_ONCE";

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let log_dir = std::env::var(LOG_DIR_ENV).ok().map(PathBuf::from);
    let _guard = init_logging(log_dir.as_deref());

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!(error = ?e, "❌ Exporter stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let config = AppConfig::load()?;
    let state = build_app_state(config)?;

    // --- Step 1: one-shot modes ---
    if env_flag(DRY_RUN_ENV) {
        run_debug(&state).await?;
        return Ok(ExitCode::SUCCESS);
    }

    if env_flag(RUN_ONCE_ENV) {
        let report = tasks::export::run(&state, Utc::now()).await?;
        if report.has_failures() {
            warn!(
                run_id = %report.run_id,
                failed = report.failures.len(),
                aborted = ?report.aborted,
                "⚠️ Export finished with failures"
            );
            return Ok(ExitCode::FAILURE);
        }
        return Ok(ExitCode::SUCCESS);
    }

    // --- Step 2: background schedule ---
    let scheduler = state
        .config
        .schedule_daily
        .then(|| spawn_daily_export(state.clone()));

    // --- Step 3: HTTP server ---
    let bind_addr = state.config.bind_addr.clone();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "🚀 Server listening");

    axum::serve(listener, app_router().with_state(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    info!("Server shut down");
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "❌ Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
