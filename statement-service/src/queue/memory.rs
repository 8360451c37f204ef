use super::{JobQueue, ProcessingJob};
use async_trait::async_trait;
use service_core::error::AppError;
use tokio::sync::{mpsc, Mutex};

/// Bounded in-process queue. Delivery does not survive a restart; `ack` is
/// a no-op.
pub struct MemoryQueue {
    tx: mpsc::Sender<ProcessingJob>,
    rx: Mutex<mpsc::Receiver<ProcessingJob>>,
}

impl MemoryQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: ProcessingJob) -> Result<(), AppError> {
        self.tx
            .try_send(job)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Job queue full")))
    }

    async fn consume(&self) -> Option<ProcessingJob> {
        self.rx.lock().await.recv().await
    }

    async fn ack(&self, _job: &ProcessingJob) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_order_to_a_single_consumer() {
        let queue = MemoryQueue::new(4);
        for i in 0..3 {
            queue
                .enqueue(ProcessingJob {
                    file_id: format!("file-{i}"),
                    storage_key: format!("key-{i}"),
                })
                .await
                .unwrap();
        }

        for i in 0..3 {
            let job = queue.consume().await.unwrap();
            assert_eq!(job.file_id, format!("file-{i}"));
        }
    }

    #[tokio::test]
    async fn enqueue_fails_when_full() {
        let queue = MemoryQueue::new(1);
        let job = ProcessingJob {
            file_id: "file-1".to_string(),
            storage_key: "key-1".to_string(),
        };
        queue.enqueue(job.clone()).await.unwrap();
        assert!(queue.enqueue(job).await.is_err());
    }
}
