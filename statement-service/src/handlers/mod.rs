pub mod files;
pub mod health;
pub mod projects;
pub mod transactions;

pub use files::download_file;
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use projects::{
    export_project, get_project, list_projects, process_project, upload_statements,
};
pub use transactions::update_transaction;
