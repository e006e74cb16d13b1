pub mod tasks;

use chrono::{DateTime, Days, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::domain::metric::time_window::fixed_offset;
use crate::errors::ExportError;

/// Grace period after midnight so late samples of the last minute are in.
const AFTER_MIDNIGHT_DELAY_SECS: i64 = 300;

/// First local midnight strictly after `now`, in UTC.
pub fn next_local_midnight(now: DateTime<Utc>, tz_offset_hours: i32) -> Result<DateTime<Utc>, ExportError> {
    let offset = fixed_offset(tz_offset_hours)?;
    let local_date = now.with_timezone(&offset).date_naive();

    local_date
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| ExportError::Config(format!("no local midnight after {now}")))
}

/// Runs the export shortly after every local midnight until the task is aborted.
pub fn spawn_daily_export(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tz = state.config.timezone;
        loop {
            let now = Utc::now();
            let next = match next_local_midnight(now, tz) {
                Ok(t) => t + Duration::seconds(AFTER_MIDNIGHT_DELAY_SECS),
                Err(e) => {
                    error!(error = %e, "❌ Daily export scheduler stopped");
                    return;
                }
            };

            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "⏰ Next daily export scheduled");
            tokio::time::sleep(wait).await;

            match tasks::export::run(&state, Utc::now()).await {
                Ok(report) if report.has_failures() => warn!(
                    run_id = %report.run_id,
                    failed = report.failures.len(),
                    "⚠️ Daily export finished with failures"
                ),
                Ok(report) => info!(run_id = %report.run_id, "✅ Daily export finished"),
                Err(e) => error!(error = ?e, "❌ Daily export failed"),
            }
        }
    })
}
