//! Export API DTOs
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RunExportQuery {
    /// Replays the run as if triggered at this instant (defaults to now).
    pub now: Option<DateTime<Utc>>,
}
