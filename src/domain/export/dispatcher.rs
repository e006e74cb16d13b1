use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::queue::task_queue_trait::TaskQueue;
use crate::domain::export::export_job::ExportJob;
use crate::errors::ExportError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Exported { location: String, points: usize },
    /// The backend had no series for the entity in this window.
    NoData,
    Enqueued,
}

/// Runs one job to completion: fetch, align, export.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError>;
}

/// Hands a job off, either running it now or deferring it.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError>;

    fn mode(&self) -> &'static str;
}

pub struct InlineDispatcher {
    executor: Arc<dyn JobExecutor>,
}

impl InlineDispatcher {
    pub fn new(executor: Arc<dyn JobExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl JobDispatcher for InlineDispatcher {
    async fn dispatch(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError> {
        self.executor.execute(job).await
    }

    fn mode(&self) -> &'static str {
        "inline"
    }
}

pub struct QueueDispatcher {
    queue: Arc<dyn TaskQueue>,
}

impl QueueDispatcher {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl JobDispatcher for QueueDispatcher {
    async fn dispatch(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError> {
        self.queue.enqueue(job).await?;
        Ok(DispatchOutcome::Enqueued)
    }

    fn mode(&self) -> &'static str {
        self.queue.name()
    }
}
