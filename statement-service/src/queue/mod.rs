//! Durable hand-off of per-file work from the submission path to the
//! worker pool. Two backends: an in-process channel for dev/tests and a
//! redis list pair for distributed, at-least-once delivery.

mod memory;
mod redis;

pub use self::memory::MemoryQueue;
pub use self::redis::RedisQueue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// One unit of work: process one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingJob {
    pub file_id: String,
    pub storage_key: String,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns once the job is accepted by the queue. A failure here must
    /// surface to the submission caller; the file is not marked queued.
    async fn enqueue(&self, job: ProcessingJob) -> Result<(), AppError>;

    /// Pull the next job. Competing consumers: one job is delivered to one
    /// worker at a time. Returns `None` when the queue is shut down.
    async fn consume(&self) -> Option<ProcessingJob>;

    /// Acknowledge completion of a delivered job. On the durable backend an
    /// unacknowledged job is redelivered after a crash.
    async fn ack(&self, job: &ProcessingJob) -> Result<(), AppError>;
}
