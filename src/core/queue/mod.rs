pub mod http_task_queue;
pub mod local_task_queue;
pub mod task_queue_trait;
