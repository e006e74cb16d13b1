use async_trait::async_trait;

use crate::domain::export::export_job::ExportJob;
use crate::errors::ExportError;

/// Deferred execution of export jobs.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, job: &ExportJob) -> Result<(), ExportError>;

    fn name(&self) -> &'static str;
}
