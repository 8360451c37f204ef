use crate::models::{Project, StatementFile, Transaction};
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for statement-service");

        let owner_index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("owner_created_lookup".to_string())
                    .build(),
            )
            .build();

        self.projects()
            .create_index(owner_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create owner index on projects collection: {}", e);
                AppError::from(e)
            })?;

        // The worker re-reads sibling files on every terminal transition.
        let project_index = IndexModel::builder()
            .keys(doc! { "project_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("project_lookup".to_string())
                    .build(),
            )
            .build();

        self.files()
            .create_index(project_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create project index on files collection: {}", e);
                AppError::from(e)
            })?;

        let file_index = IndexModel::builder()
            .keys(doc! { "file_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("file_lookup".to_string())
                    .build(),
            )
            .build();

        self.transactions()
            .create_index(file_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create file index on transactions collection: {}",
                    e
                );
                AppError::from(e)
            })?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }

    pub fn files(&self) -> Collection<StatementFile> {
        self.db.collection("files")
    }

    pub fn transactions(&self) -> Collection<Transaction> {
        self.db.collection("transactions")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
