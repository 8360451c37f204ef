use super::{JobQueue, ProcessingJob};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use service_core::error::AppError;
use std::time::Duration;

/// Poll interval for the blocking pop, so shutdown is never stuck behind
/// an indefinite BRPOPLPUSH.
const CONSUME_BLOCK_SECS: usize = 5;

/// Redis-backed queue using the reliable-list pattern: jobs wait on the
/// main list, a consumer atomically moves its job onto the active list,
/// and `ack` removes it. Jobs left on the active list by a crashed worker
/// are pushed back at startup, giving at-least-once delivery.
pub struct RedisQueue {
    conn: ConnectionManager,
    queue_key: String,
    active_key: String,
}

impl RedisQueue {
    pub async fn connect(url: &str, name: &str) -> Result<Self, AppError> {
        tracing::info!(url = %url, queue = %name, "Connecting to redis job queue");
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            queue_key: name.to_string(),
            active_key: format!("{name}:active"),
        })
    }

    /// Requeue jobs that were delivered but never acknowledged. Called once
    /// at startup, before workers begin consuming.
    pub async fn recover_stalled(&self) -> Result<u64, AppError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0u64;
        loop {
            let moved: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(&self.active_key)
                .arg(&self.queue_key)
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            tracing::warn!(recovered, queue = %self.queue_key, "Requeued unacknowledged jobs");
        }
        Ok(recovered)
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: ProcessingJob) -> Result<(), AppError> {
        let payload = serde_json::to_string(&job)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Job serialization: {}", e)))?;
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn consume(&self) -> Option<ProcessingJob> {
        let mut conn = self.conn.clone();
        loop {
            let popped: Result<Option<String>, redis::RedisError> = redis::cmd("BRPOPLPUSH")
                .arg(&self.queue_key)
                .arg(&self.active_key)
                .arg(CONSUME_BLOCK_SECS)
                .query_async(&mut conn)
                .await;

            match popped {
                Ok(Some(payload)) => match serde_json::from_str::<ProcessingJob>(&payload) {
                    Ok(job) => return Some(job),
                    Err(e) => {
                        // Drop the poison message from the active list so it
                        // is not redelivered forever.
                        tracing::error!(error = %e, payload = %payload, "Discarding unparseable job");
                        let _ = redis::cmd("LREM")
                            .arg(&self.active_key)
                            .arg(1)
                            .arg(&payload)
                            .query_async::<_, ()>(&mut conn)
                            .await;
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Queue consume failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn ack(&self, job: &ProcessingJob) -> Result<(), AppError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Job serialization: {}", e)))?;
        let mut conn = self.conn.clone();
        redis::cmd("LREM")
            .arg(&self.active_key)
            .arg(1)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
