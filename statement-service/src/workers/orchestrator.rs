use crate::config::WorkerConfig;
use crate::models::{FileStatus, StatementFile};
use crate::queue::{JobQueue, ProcessingJob};
use crate::services::database::MongoDb;
use crate::workers::{ExtractedRecord, Extractor, FallbackExtractor, GatewayExtractor};
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Owns the worker pool. Workers are competing consumers on the shared
/// queue; each processed job flows through the status state machine
/// pending/queued -> processing -> completed|error, and every terminal
/// completion re-derives the parent project's status from its siblings.
pub struct WorkerOrchestrator {
    config: WorkerConfig,
    db: MongoDb,
    queue: Arc<dyn JobQueue>,
    gateway: Option<Arc<GatewayExtractor>>,
    fallback: Arc<FallbackExtractor>,
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    pub fn new(
        config: WorkerConfig,
        db: MongoDb,
        queue: Arc<dyn JobQueue>,
        gateway: Option<Arc<GatewayExtractor>>,
        fallback: Arc<FallbackExtractor>,
    ) -> Self {
        Self {
            config,
            db,
            queue,
            gateway,
            fallback,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn start(self) {
        if !self.config.enabled {
            tracing::info!("Worker pool disabled by configuration");
            return;
        }

        tracing::info!(
            worker_count = self.config.worker_count,
            gateway_configured = self.gateway.is_some(),
            "Starting worker pool"
        );

        for worker_id in 0..self.config.worker_count {
            let worker = Worker {
                id: worker_id,
                db: self.db.clone(),
                queue: self.queue.clone(),
                gateway: self.gateway.clone(),
                fallback: self.fallback.clone(),
            };
            let shutdown = self.shutdown_token.clone();

            tokio::spawn(async move {
                loop {
                    let job = tokio::select! {
                        _ = shutdown.cancelled() => {
                            tracing::info!(worker_id = worker.id, "Worker shutting down");
                            break;
                        }
                        job = worker.queue.consume() => job,
                    };

                    match job {
                        Some(job) => {
                            worker.process_job(&job).await;
                            if let Err(e) = worker.queue.ack(&job).await {
                                tracing::warn!(
                                    worker_id = worker.id,
                                    file_id = %job.file_id,
                                    error = %e,
                                    "Failed to acknowledge job"
                                );
                            }
                        }
                        None => {
                            tracing::info!(worker_id = worker.id, "Queue closed, worker exiting");
                            break;
                        }
                    }
                }
            });
        }
    }
}

#[derive(Clone)]
struct Worker {
    id: usize,
    db: MongoDb,
    queue: Arc<dyn JobQueue>,
    gateway: Option<Arc<GatewayExtractor>>,
    fallback: Arc<FallbackExtractor>,
}

struct JobOutcome {
    project_id: String,
    transactions: usize,
    extractor: &'static str,
}

impl Worker {
    async fn process_job(&self, job: &ProcessingJob) {
        let start = Instant::now();

        tracing::info!(
            worker_id = self.id,
            file_id = %job.file_id,
            "Processing job started"
        );

        metrics::counter!("statement_processing_total").increment(1);

        match self.handle(job).await {
            Ok(None) => {
                tracing::warn!(
                    worker_id = self.id,
                    file_id = %job.file_id,
                    "Skipping redelivered job for a terminal file"
                );
            }
            Ok(Some(outcome)) => {
                metrics::counter!("statement_processing_success", "extractor" => outcome.extractor)
                    .increment(1);
                metrics::histogram!("statement_processing_duration", "extractor" => outcome.extractor)
                    .record(start.elapsed().as_secs_f64());

                tracing::info!(
                    worker_id = self.id,
                    file_id = %job.file_id,
                    transactions = outcome.transactions,
                    extractor = outcome.extractor,
                    duration_ms = start.elapsed().as_millis(),
                    "Processing succeeded"
                );

                // The project flips to completed only once every sibling is
                // terminal; a failure here leaves it for a later sibling.
                if let Err(e) = self.finalize_project(&outcome.project_id).await {
                    tracing::error!(
                        project_id = %outcome.project_id,
                        error = %e,
                        "Failed to recompute project status"
                    );
                }
            }
            Err(e) => {
                self.mark_file_error(&job.file_id, e.to_string()).await;

                metrics::counter!("statement_processing_failed").increment(1);

                tracing::error!(
                    worker_id = self.id,
                    file_id = %job.file_id,
                    error = %e,
                    "Processing failed"
                );
            }
        }
    }

    async fn handle(&self, job: &ProcessingJob) -> Result<Option<JobOutcome>, AppError> {
        // 1. Visible to pollers immediately. Terminal states are never
        // regressed: a redelivered job for a finished file is a no-op.
        let marked = self
            .db
            .files()
            .update_one(
                doc! {
                    "_id": &job.file_id,
                    "status": { "$nin": ["completed", "error"] },
                },
                doc! { "$set": {
                    "status": "processing",
                    "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                }},
                None,
            )
            .await?;

        if marked.matched_count == 0 {
            let exists = self
                .db
                .files()
                .find_one(doc! { "_id": &job.file_id }, None)
                .await?
                .is_some();
            if !exists {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "File {} not found",
                    job.file_id
                )));
            }
            return Ok(None);
        }

        let file = self
            .db
            .files()
            .find_one(doc! { "_id": &job.file_id }, None)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("File {} not found", job.file_id))
            })?;

        // 2. Gateway when configured, fallback otherwise or on any gateway
        // failure. Extraction never leaves a file stuck in processing.
        let (records, extractor) = self.run_extraction(&file).await;
        let transactions = records.len();

        // 3. One row per extracted record, scoped to the file.
        for record in records {
            let txn = record.into_transaction(&file.id);
            self.db.transactions().insert_one(&txn, None).await?;
        }

        // 4.
        self.update_file_status(&file.id, FileStatus::Completed)
            .await?;

        Ok(Some(JobOutcome {
            project_id: file.project_id,
            transactions,
            extractor,
        }))
    }

    async fn run_extraction(&self, file: &StatementFile) -> (Vec<ExtractedRecord>, &'static str) {
        if let Some(gateway) = &self.gateway {
            match gateway.extract(file).await {
                Ok(records) => return (records, "gateway"),
                Err(e) => {
                    tracing::warn!(
                        file_id = %file.id,
                        error = %e,
                        "Gateway extraction failed, falling back"
                    );
                }
            }
        } else {
            tracing::info!(
                file_id = %file.id,
                "No gateway credential configured, using fallback extraction"
            );
        }

        match self.fallback.extract(file).await {
            Ok(records) => (records, "fallback"),
            // The fallback is infallible today; keep the seam honest anyway.
            Err(e) => {
                tracing::error!(file_id = %file.id, error = %e, "Fallback extraction failed");
                (Vec::new(), "fallback")
            }
        }
    }

    /// If every sibling file is terminal, the project is completed. Runs
    /// after this worker's own terminal write, so the last finisher always
    /// observes a fully terminal set.
    async fn finalize_project(&self, project_id: &str) -> Result<(), AppError> {
        let mut cursor = self
            .db
            .files()
            .find(doc! { "project_id": project_id }, None)
            .await?;

        while let Some(file) = cursor.try_next().await? {
            if !file.status.is_terminal() {
                return Ok(());
            }
        }

        self.db
            .projects()
            .update_one(
                doc! { "_id": project_id },
                doc! { "$set": {
                    "status": "completed",
                    "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                }},
                None,
            )
            .await?;

        tracing::info!(project_id = %project_id, "Project completed");
        Ok(())
    }

    async fn update_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
    ) -> Result<(), AppError> {
        let status_bson = mongodb::bson::to_bson(&status).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize status: {}", e))
        })?;

        self.db
            .files()
            .update_one(
                doc! { "_id": file_id },
                doc! { "$set": {
                    "status": status_bson,
                    "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                }},
                None,
            )
            .await?;
        Ok(())
    }

    async fn mark_file_error(&self, file_id: &str, error: String) {
        let update = doc! {
            "$set": {
                "status": "error",
                "error_message": error,
                "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
            }
        };

        if let Err(e) = self
            .db
            .files()
            .update_one(doc! { "_id": file_id }, update, None)
            .await
        {
            tracing::error!(
                file_id = %file_id,
                error = %e,
                "Failed to update file with error status"
            );
        }
    }
}
