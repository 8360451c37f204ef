use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub status: ProjectStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: String, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            owner_id,
            status: ProjectStatus::Processing,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{to_bson, Bson};

    // Status strings are written verbatim in update documents; keep the
    // serde form in sync with those literals.
    #[test]
    fn project_status_serializes_lowercase() {
        assert_eq!(
            to_bson(&ProjectStatus::Completed).unwrap(),
            Bson::String("completed".to_string())
        );
        assert_eq!(
            to_bson(&ProjectStatus::Processing).unwrap(),
            Bson::String("processing".to_string())
        );
    }
}
