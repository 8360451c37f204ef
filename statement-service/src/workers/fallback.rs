//! Deterministic stand-in extractor.
//!
//! Keeps the pipeline demonstrable without live gateway credentials and
//! guarantees a file never stays stuck in processing when the gateway is
//! unconfigured or failing. The fixed description makes synthetic rows
//! recognizable in stored data.

use super::{ExtractError, ExtractedRecord, Extractor};
use crate::models::StatementFile;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

pub const FALLBACK_DESCRIPTION: &str = "Mock Transaction (No API Key)";

pub struct FallbackExtractor {
    delay: Duration,
}

impl FallbackExtractor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Extractor for FallbackExtractor {
    async fn extract(&self, file: &StatementFile) -> Result<Vec<ExtractedRecord>, ExtractError> {
        tracing::info!(file_id = %file.id, "Running fallback extraction");
        tokio::time::sleep(self.delay).await;

        Ok(vec![ExtractedRecord {
            date: Utc::now().format("%Y-%m-%d").to_string(),
            description: FALLBACK_DESCRIPTION.to_string(),
            amount: 123.45,
            debit: Some(123.45),
            credit: None,
            balance: Some(1000.00),
            currency: Some("USD".to_string()),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_exactly_one_marked_record() {
        let extractor = FallbackExtractor::new(Duration::from_millis(1));
        let file = StatementFile::new(
            "project-1".to_string(),
            "statement.pdf".to_string(),
            "u/p/statement.pdf".to_string(),
        );

        let records = extractor.extract(&file).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, FALLBACK_DESCRIPTION);
        assert_eq!(records[0].amount, 123.45);
        assert_eq!(records[0].debit, Some(123.45));
        assert_eq!(records[0].credit, None);
    }
}
