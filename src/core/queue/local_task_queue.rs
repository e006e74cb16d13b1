use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::core::queue::task_queue_trait::TaskQueue;
use crate::domain::export::dispatcher::{DispatchOutcome, JobExecutor};
use crate::domain::export::export_job::ExportJob;
use crate::domain::export::report::JobFailure;
use crate::errors::ExportError;

/// In-process queue: a bounded channel drained by a fixed worker pool.
///
/// Workers stop once every queue handle is dropped and the channel is empty.
#[derive(Clone)]
pub struct LocalTaskQueue {
    tx: mpsc::Sender<ExportJob>,
}

#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    pub exported: usize,
    pub no_data: usize,
    pub failures: Vec<JobFailure>,
}

impl WorkerStats {
    fn merge(&mut self, other: WorkerStats) {
        self.exported += other.exported;
        self.no_data += other.no_data;
        self.failures.extend(other.failures);
    }
}

pub struct LocalQueueWorkers {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl LocalQueueWorkers {
    /// Waits for every worker to drain the queue.
    pub async fn join(self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for result in join_all(self.handles).await {
            match result {
                Ok(stats) => total.merge(stats),
                Err(e) => error!(error = %e, "❌ Export worker stopped abnormally"),
            }
        }
        total
    }
}

impl LocalTaskQueue {
    pub fn start(
        executor: Arc<dyn JobExecutor>,
        workers: usize,
        capacity: usize,
    ) -> (Self, LocalQueueWorkers) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let executor = Arc::clone(&executor);
                tokio::spawn(worker_loop(worker_id, rx, executor))
            })
            .collect();

        info!(workers = workers.max(1), capacity, "Started local export queue");
        (Self { tx }, LocalQueueWorkers { handles })
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<ExportJob>>>,
    executor: Arc<dyn JobExecutor>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        // lock only while waiting, not while exporting
        let next = { rx.lock().await.recv().await };
        let Some(job) = next else { break };

        match executor.execute(&job).await {
            Ok(DispatchOutcome::Exported { .. }) | Ok(DispatchOutcome::Enqueued) => stats.exported += 1,
            Ok(DispatchOutcome::NoData) => stats.no_data += 1,
            Err(e) => {
                error!(
                    worker_id,
                    project_id = %job.project_id,
                    metric = %job.metric_type,
                    instance = %job.entity_label(),
                    error = %e,
                    "❌ Queued export job failed"
                );
                stats.failures.push(JobFailure {
                    project_id: job.project_id.clone(),
                    metric: job.metric_type.clone(),
                    instance: Some(job.entity_label()),
                    error: e.to_string(),
                });
            }
        }
    }

    stats
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, job: &ExportJob) -> Result<(), ExportError> {
        self.tx
            .send(job.clone())
            .await
            .map_err(|_| ExportError::Queue("local queue is closed".into()))
    }

    fn name(&self) -> &'static str {
        "local_queue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::catalog::PerSeriesAligner;
    use std::sync::Mutex as StdMutex;

    /// Fails for `vm-bad`, reports no data for `vm-empty`.
    #[derive(Default)]
    struct ScriptedExecutor {
        seen: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl JobExecutor for ScriptedExecutor {
        async fn execute(&self, job: &ExportJob) -> Result<DispatchOutcome, ExportError> {
            self.seen.lock().unwrap().push(job.instance_name.clone());
            match job.instance_name.as_str() {
                "vm-bad" => Err(ExportError::AmbiguousSeries { filter: job.filter.clone(), count: 2 }),
                "vm-empty" => Ok(DispatchOutcome::NoData),
                _ => Ok(DispatchOutcome::Exported { location: "x".into(), points: 1 }),
            }
        }
    }

    fn job(instance: &str) -> ExportJob {
        ExportJob::new("p1", "m", PerSeriesAligner::Rate, "f", instance)
    }

    #[tokio::test]
    async fn workers_drain_queue_and_collect_stats() {
        let executor = Arc::new(ScriptedExecutor::default());
        let (queue, workers) = LocalTaskQueue::start(executor.clone(), 3, 2);

        for name in ["vm-a", "vm-b", "vm-bad", "vm-empty", "vm-c"] {
            queue.enqueue(&job(name)).await.unwrap();
        }
        drop(queue);

        let stats = workers.join().await;

        assert_eq!(stats.exported, 3);
        assert_eq!(stats.no_data, 1);
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.failures[0].instance.as_deref(), Some("vm-bad"));
        assert_eq!(executor.seen.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn enqueue_after_workers_stop_fails() {
        let (queue, workers) = LocalTaskQueue::start(Arc::new(ScriptedExecutor::default()), 1, 1);
        let probe = queue.clone();
        drop(queue);
        workers.handles.iter().for_each(|h| h.abort());
        let _ = workers.join().await;

        let err = probe.enqueue(&job("vm-a")).await.unwrap_err();
        assert!(matches!(err, ExportError::Queue(_)));
    }
}
