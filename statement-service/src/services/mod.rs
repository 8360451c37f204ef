pub mod database;
pub mod export;
pub mod metrics;
pub mod storage;

pub use database::MongoDb;
pub use export::{export_transactions, ExportFile};
pub use metrics::{get_metrics, init_metrics};
pub use storage::{LocalStorage, Storage};
