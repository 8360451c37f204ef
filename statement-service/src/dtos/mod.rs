pub mod export;
pub mod projects;
pub mod transactions;

pub use export::{ExportFormat, ExportParams};
pub use projects::{
    progress_percent, CreatedProject, FileResponse, ProjectResponse, ProjectSummary, UploadMode,
    UploadResponse,
};
pub use transactions::{TransactionResponse, UpdateTransactionRequest};
