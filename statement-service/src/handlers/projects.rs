use crate::dtos::{
    CreatedProject, ExportParams, FileResponse, ProjectResponse, ProjectSummary,
    TransactionResponse, UploadMode, UploadResponse,
};
use crate::middleware::UserId;
use crate::models::{Project, ProjectStatus, StatementFile, Transaction};
use crate::queue::ProcessingJob;
use crate::services::export_transactions;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use service_core::error::AppError;
use serde_json::json;
use uuid::Uuid;

const MAX_FILE_SIZE: usize = 20 * 1024 * 1024;

struct UploadedDocument {
    filename: String,
    data: Vec<u8>,
}

pub async fn upload_statements(
    State(state): State<AppState>,
    user_id: UserId,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut project_name: Option<String> = None;
    let mut mode = UploadMode::Merge;
    let mut documents: Vec<UploadedDocument> = Vec::new();

    // Field order in the form is not guaranteed; read everything before
    // creating any records.
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "projectName" => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read project name: {}", e))
                })?;
                if !value.is_empty() {
                    project_name = Some(value);
                }
            }
            "mode" => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read mode: {}", e))
                })?;
                mode = value.parse().unwrap_or_default();
            }
            "files" | "file" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                    })?
                    .to_vec();

                if data.is_empty() {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Uploaded file {} is empty",
                        filename
                    )));
                }
                if data.len() > MAX_FILE_SIZE {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "File too large (max 20MB)"
                    )));
                }

                documents.push(UploadedDocument { filename, data });
            }
            _ => {}
        }
    }

    if documents.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No files uploaded")));
    }

    let project_name =
        project_name.unwrap_or_else(|| format!("Batch {}", Utc::now().to_rfc3339()));

    let mut created_projects: Vec<Project> = Vec::new();
    let mut created_files: Vec<FileResponse> = Vec::new();

    match mode {
        UploadMode::Separate => {
            // One project per file
            let many = documents.len() > 1;
            for document in documents {
                let name = if many {
                    format!("{} - {}", project_name, document.filename)
                } else {
                    project_name.clone()
                };
                let project = create_project(&state, name, &user_id).await?;
                let file = store_and_register(&state, &user_id, &project, document).await?;
                created_files.push(FileResponse::from(file));
                created_projects.push(project);
            }
        }
        UploadMode::Merge => {
            let project = create_project(&state, project_name, &user_id).await?;
            for document in documents {
                let file = store_and_register(&state, &user_id, &project, document).await?;
                created_files.push(FileResponse::from(file));
            }
            created_projects.push(project);
        }
    }

    let response = UploadResponse {
        id: created_projects[0].id.clone(),
        status: ProjectStatus::Processing,
        projects: created_projects.iter().map(CreatedProject::from).collect(),
        files: created_files,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn create_project(
    state: &AppState,
    name: String,
    user_id: &UserId,
) -> Result<Project, AppError> {
    let project = Project::new(name, user_id.0.clone());
    state
        .db
        .projects()
        .insert_one(&project, None)
        .await
        .map_err(AppError::from)?;

    tracing::info!(
        project_id = %project.id,
        name = %project.name,
        "Project created"
    );
    Ok(project)
}

/// Blob first, then the file row, then the job: a storage failure leaves
/// no dangling file, and a queue failure is surfaced before the file can
/// ever be considered queued.
async fn store_and_register(
    state: &AppState,
    user_id: &UserId,
    project: &Project,
    document: UploadedDocument,
) -> Result<StatementFile, AppError> {
    let extension = std::path::Path::new(&document.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");

    let storage_key = format!(
        "{}/{}/{}.{}",
        user_id.0,
        project.id,
        Uuid::new_v4(),
        extension
    );

    state
        .storage
        .upload(&storage_key, document.data)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upload file {} to storage: {}", storage_key, e);
            e
        })?;

    let file = StatementFile::new(project.id.clone(), document.filename, storage_key.clone());

    state
        .db
        .files()
        .insert_one(&file, None)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert file {} into database: {}", file.id, e);
            AppError::from(e)
        })?;

    state
        .queue
        .enqueue(ProcessingJob {
            file_id: file.id.clone(),
            storage_key,
        })
        .await
        .map_err(|e| {
            tracing::error!(file_id = %file.id, error = %e, "Failed to enqueue processing job");
            e
        })?;

    tracing::info!(
        file_id = %file.id,
        project_id = %project.id,
        filename = %file.original_name,
        "File stored and job enqueued"
    );

    Ok(file)
}

pub async fn list_projects(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<impl IntoResponse, AppError> {
    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();

    let mut cursor = state
        .db
        .projects()
        .find(doc! { "owner_id": &user_id.0 }, find_options)
        .await
        .map_err(AppError::from)?;

    let mut summaries = Vec::new();
    while let Some(project) = cursor.try_next().await.map_err(AppError::from)? {
        let files = load_project_files(&state, &project.id).await?;
        let transactions = load_project_transactions(&state, &files).await?;

        let total_value: f64 = transactions.iter().map(|t| t.amount).sum();
        let currency = transactions
            .first()
            .map(|t| t.currency.clone())
            .unwrap_or_else(|| "USD".to_string());

        let completed = files
            .iter()
            .filter(|f| f.status == crate::models::FileStatus::Completed)
            .count();
        let extract_rate = if project.status == ProjectStatus::Completed && !files.is_empty() {
            (completed * 100 / files.len()) as u32
        } else {
            0
        };

        summaries.push(ProjectSummary {
            id: project.id,
            name: project.name,
            date: project.created_at.to_rfc3339(),
            status: project.status,
            extract_rate,
            transaction_count: transactions.len() as u64,
            total_value,
            currency,
        });
    }

    Ok(Json(summaries))
}

pub async fn get_project(
    State(state): State<AppState>,
    _user_id: UserId,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let project = state
        .db
        .projects()
        .find_one(doc! { "_id": &project_id }, None)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let files = load_project_files(&state, &project.id).await?;
    let transactions = load_project_transactions(&state, &files).await?;

    Ok(Json(ProjectResponse {
        id: project.id,
        name: project.name,
        status: project.status,
        created_at: project.created_at.to_rfc3339(),
        files: files.into_iter().map(FileResponse::from).collect(),
        transactions: transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    }))
}

pub async fn process_project(
    State(state): State<AppState>,
    _user_id: UserId,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut cursor = state
        .db
        .files()
        .find(doc! { "project_id": &project_id, "status": "pending" }, None)
        .await
        .map_err(AppError::from)?;

    let mut enqueued = 0usize;
    while let Some(file) = cursor.try_next().await.map_err(AppError::from)? {
        state
            .queue
            .enqueue(ProcessingJob {
                file_id: file.id.clone(),
                storage_key: file.storage_key.clone(),
            })
            .await
            .map_err(|e| {
                tracing::error!(file_id = %file.id, error = %e, "Failed to enqueue processing job");
                e
            })?;

        // Only after the queue has the job.
        state
            .db
            .files()
            .update_one(
                doc! { "_id": &file.id },
                doc! { "$set": {
                    "status": "queued",
                    "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
                }},
                None,
            )
            .await
            .map_err(AppError::from)?;
        enqueued += 1;
    }

    state
        .db
        .projects()
        .update_one(
            doc! { "_id": &project_id },
            doc! { "$set": {
                "status": "processing",
                "updated_at": mongodb::bson::DateTime::from_chrono(Utc::now()),
            }},
            None,
        )
        .await
        .map_err(AppError::from)?;

    tracing::info!(project_id = %project_id, enqueued, "Processing started");

    Ok(Json(json!({ "success": true })))
}

pub async fn export_project(
    State(state): State<AppState>,
    _user_id: UserId,
    Path(project_id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, AppError> {
    let project = state
        .db
        .projects()
        .find_one(doc! { "_id": &project_id }, None)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let files = load_project_files(&state, &project.id).await?;
    let transactions = load_project_transactions(&state, &files).await?;

    let export = export_transactions(params.format, &project.id, &transactions)?;

    tracing::info!(
        project_id = %project.id,
        format = ?params.format,
        transactions = transactions.len(),
        "Project exported"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.bytes,
    ))
}

async fn load_project_files(
    state: &AppState,
    project_id: &str,
) -> Result<Vec<StatementFile>, AppError> {
    let mut cursor = state
        .db
        .files()
        .find(doc! { "project_id": project_id }, None)
        .await
        .map_err(AppError::from)?;

    let mut files = Vec::new();
    while let Some(file) = cursor.try_next().await.map_err(AppError::from)? {
        files.push(file);
    }
    Ok(files)
}

async fn load_project_transactions(
    state: &AppState,
    files: &[StatementFile],
) -> Result<Vec<Transaction>, AppError> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let file_ids: Vec<String> = files.iter().map(|f| f.id.clone()).collect();
    let mut cursor = state
        .db
        .transactions()
        .find(doc! { "file_id": { "$in": file_ids } }, None)
        .await
        .map_err(AppError::from)?;

    let mut transactions = Vec::new();
    while let Some(txn) = cursor.try_next().await.map_err(AppError::from)? {
        transactions.push(txn);
    }
    Ok(transactions)
}
