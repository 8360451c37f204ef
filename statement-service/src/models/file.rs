use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    /// Terminal states end a file's processing attempt; a project completes
    /// once every sibling file is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementFile {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_id: String,
    pub original_name: String,
    pub storage_key: String,
    pub status: FileStatus,
    pub error_message: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl StatementFile {
    pub fn new(project_id: String, original_name: String, storage_key: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            original_name,
            storage_key,
            status: FileStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
