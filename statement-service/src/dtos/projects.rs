use crate::dtos::TransactionResponse;
use crate::models::{FileStatus, Project, ProjectStatus, StatementFile};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a multi-file submission maps to projects: one shared project, or
/// one project per file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    #[default]
    Merge,
    Separate,
}

impl FromStr for UploadMode {
    type Err = std::convert::Infallible;

    // Anything other than an explicit "separate" merges, matching the
    // submission form's default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "separate" => Ok(UploadMode::Separate),
            _ => Ok(UploadMode::Merge),
        }
    }
}

/// Coarse per-file progress derived from status alone. Clients poll this;
/// there is no within-file progress tracking.
pub fn progress_percent(status: &FileStatus) -> u8 {
    match status {
        FileStatus::Pending => 0,
        FileStatus::Queued => 10,
        FileStatus::Processing => 50,
        FileStatus::Completed => 100,
        FileStatus::Error => 0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub status: FileStatus,
    pub progress: u8,
    pub error_message: Option<String>,
}

impl From<StatementFile> for FileResponse {
    fn from(file: StatementFile) -> Self {
        Self {
            id: file.id,
            name: file.original_name,
            progress: progress_percent(&file.status),
            status: file.status,
            error_message: file.error_message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedProject {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
}

impl From<&Project> for CreatedProject {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            status: project.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// First created project, kept for single-project clients.
    pub id: String,
    pub status: ProjectStatus,
    pub projects: Vec<CreatedProject>,
    pub files: Vec<FileResponse>,
}

/// Polling payload: the project with nested file states and the flattened
/// transactions across all files.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub created_at: String,
    pub files: Vec<FileResponse>,
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub date: String,
    pub status: ProjectStatus,
    pub extract_rate: u32,
    pub transaction_count: u64,
    pub total_value: f64,
    pub currency: String,
}
