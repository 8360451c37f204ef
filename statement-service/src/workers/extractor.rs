//! Extraction seam between the worker and whatever turns a stored
//! document into transaction candidates.

use crate::models::{StatementFile, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extractor not configured: {0}")]
    NotConfigured(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// One transaction candidate as returned by an extractor, before
/// normalization. `amount` may still be signed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedRecord {
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub balance: Option<f64>,
    pub currency: Option<String>,
}

impl ExtractedRecord {
    /// Normalize into a stored transaction: the amount becomes absolute,
    /// a missing debit/credit is derived from the sign of the original
    /// amount, and an unparsable date falls back to the current time (the
    /// row is still created).
    pub fn into_transaction(self, file_id: &str) -> Transaction {
        let signed = self.amount;
        let amount = signed.abs();
        let debit = self.debit.or((signed < 0.0).then_some(amount));
        let credit = self.credit.or((signed > 0.0).then_some(amount));

        let date = match parse_record_date(&self.date) {
            Some(date) => date,
            None => {
                tracing::warn!(date = %self.date, "Invalid transaction date, using current date");
                Utc::now()
            }
        };

        Transaction::new(
            file_id.to_string(),
            date,
            self.description,
            amount,
            debit,
            credit,
            self.balance,
            self.currency.unwrap_or_else(|| "USD".to_string()),
        )
    }
}

fn parse_record_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, file: &StatementFile) -> Result<Vec<ExtractedRecord>, ExtractError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn record(amount: f64) -> ExtractedRecord {
        ExtractedRecord {
            date: "2024-05-17".to_string(),
            description: "ACME PAYMENT".to_string(),
            amount,
            debit: None,
            credit: None,
            balance: Some(100.0),
            currency: Some("EUR".to_string()),
        }
    }

    #[test]
    fn negative_amount_becomes_absolute_debit() {
        let txn = record(-42.5).into_transaction("file-1");
        assert_eq!(txn.amount, 42.5);
        assert_eq!(txn.debit, Some(42.5));
        assert_eq!(txn.credit, None);
        assert_eq!(txn.file_id, "file-1");
        assert_eq!(txn.currency, "EUR");
    }

    #[test]
    fn positive_amount_becomes_credit() {
        let txn = record(42.5).into_transaction("file-1");
        assert_eq!(txn.amount, 42.5);
        assert_eq!(txn.debit, None);
        assert_eq!(txn.credit, Some(42.5));
    }

    #[test]
    fn returned_debit_is_kept() {
        let mut rec = record(-42.5);
        rec.debit = Some(40.0);
        let txn = rec.into_transaction("file-1");
        assert_eq!(txn.debit, Some(40.0));
    }

    #[test]
    fn plain_date_is_parsed() {
        let txn = record(1.0).into_transaction("file-1");
        assert_eq!(
            (txn.date.year(), txn.date.month(), txn.date.day()),
            (2024, 5, 17)
        );
    }

    #[test]
    fn invalid_date_falls_back_to_now() {
        let before = Utc::now();
        let mut rec = record(1.0);
        rec.date = "not-a-date".to_string();
        let txn = rec.into_transaction("file-1");
        assert!(txn.date >= before);
    }

    #[test]
    fn missing_currency_defaults_to_usd() {
        let mut rec = record(1.0);
        rec.currency = None;
        assert_eq!(rec.into_transaction("file-1").currency, "USD");
    }
}
