use crate::config::{QueueBackend, StatementConfig};
use crate::handlers;
use crate::queue::{JobQueue, MemoryQueue, RedisQueue};
use crate::services::{LocalStorage, MongoDb, Storage};
use crate::workers::{FallbackExtractor, GatewayExtractor, WorkerOrchestrator};
use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: StatementConfig,
    pub db: MongoDb,
    pub storage: Arc<dyn Storage>,
    pub queue: Arc<dyn JobQueue>,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: StatementConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(&config.storage.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path,
                        e
                    );
                    e
                })?,
        );

        let queue: Arc<dyn JobQueue> = match config.queue.backend {
            QueueBackend::Memory => Arc::new(MemoryQueue::new(config.queue.capacity)),
            QueueBackend::Redis => {
                let queue = RedisQueue::connect(&config.queue.redis_url, &config.queue.name)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to redis queue: {}", e);
                        e
                    })?;
                queue.recover_stalled().await?;
                Arc::new(queue)
            }
        };

        // Without a usable credential every job goes straight to the
        // fallback extractor.
        let gateway = if config.extraction.has_valid_token() {
            Some(Arc::new(GatewayExtractor::new(
                &config.extraction,
                storage.clone(),
            )))
        } else {
            tracing::warn!("Extraction gateway credential missing or placeholder, fallback only");
            None
        };
        let fallback = Arc::new(FallbackExtractor::new(Duration::from_millis(
            config.extraction.fallback_delay_ms,
        )));

        let orchestrator = WorkerOrchestrator::new(
            config.worker.clone(),
            db.clone(),
            queue.clone(),
            gateway,
            fallback,
        );
        tokio::spawn(async move {
            orchestrator.start().await;
        });

        let state = AppState {
            config: config.clone(),
            db: db.clone(),
            storage,
            queue,
        };

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .route(
                "/projects",
                post(handlers::upload_statements).get(handlers::list_projects),
            )
            .route("/projects/:id", get(handlers::get_project))
            .route("/projects/:id/process", post(handlers::process_project))
            .route("/projects/:id/export", get(handlers::export_project))
            .route("/files/:id", get(handlers::download_file))
            .route("/transactions/:id", patch(handlers::update_transaction))
            .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn db(&self) -> &MongoDb {
        &self.state.db
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
