mod extractor;
mod fallback;
mod gateway;
mod orchestrator;

pub use extractor::{ExtractError, ExtractedRecord, Extractor};
pub use fallback::{FallbackExtractor, FALLBACK_DESCRIPTION};
pub use gateway::GatewayExtractor;
pub use orchestrator::WorkerOrchestrator;
