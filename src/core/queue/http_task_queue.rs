use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use uuid::Uuid;

use crate::core::client::monitoring::retry::RetryPolicy;
use crate::core::queue::task_queue_trait::TaskQueue;
use crate::domain::export::export_job::ExportJob;
use crate::errors::ExportError;

pub const TASK_ID_HEADER: &str = "X-Export-Task-Id";

/// Pushes each job as a form POST to a worker endpoint.
pub struct HttpTaskQueue {
    http: Client,
    worker_url: String,
    retry: RetryPolicy,
}

impl HttpTaskQueue {
    pub fn new(http: Client, worker_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            worker_url: worker_url.into(),
            retry,
        }
    }

    /// Only a refused connection is resent; once the worker has the job,
    /// a timeout or failure status must not run it a second time.
    async fn post(&self, job: &ExportJob, task_id: &str) -> Result<(), ExportError> {
        let resp = self
            .http
            .post(&self.worker_url)
            .header(TASK_ID_HEADER, task_id)
            .form(job)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ExportError::Transport(format!("POST {}: {e}", self.worker_url))
                } else {
                    ExportError::Queue(format!("POST {}: {e}", self.worker_url))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExportError::Worker {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn enqueue(&self, job: &ExportJob) -> Result<(), ExportError> {
        let task_id = Uuid::new_v4().to_string();

        self.retry
            .run("queue.push", || self.post(job, &task_id))
            .await
            .map_err(|e| match e {
                ExportError::Queue(_) => e,
                other => ExportError::Queue(other.to_string()),
            })?;

        debug!(
            task_id = %task_id,
            project_id = %job.project_id,
            metric = %job.metric_type,
            instance = %job.entity_label(),
            "Enqueued export job"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http_queue"
    }
}
