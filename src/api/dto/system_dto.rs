//! System API DTOs
use serde::Serialize;

use crate::core::config::app_config::AppConfig;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub exporter: &'static str,
    pub dispatch: &'static str,
    pub timezone: i32,
    pub projects: Vec<String>,
    pub discover_projects: bool,
    pub schedule_daily: bool,
}

impl SystemStatus {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            exporter: config.exporter_class.as_code(),
            dispatch: config.dispatch.as_code(),
            timezone: config.timezone,
            projects: config.project_ids(),
            discover_projects: config.discover_projects,
            schedule_daily: config.schedule_daily,
        }
    }
}
