pub mod dispatcher;
pub mod export_job;
pub mod report;
pub mod service;
