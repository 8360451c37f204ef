use crate::models::{ReviewStatus, Transaction};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionResponse {
    pub id: String,
    pub file_id: String,
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub balance: Option<f64>,
    pub currency: String,
    pub category: Option<String>,
    pub review_status: Option<ReviewStatus>,
}

impl From<Transaction> for TransactionResponse {
    fn from(txn: Transaction) -> Self {
        Self {
            id: txn.id,
            file_id: txn.file_id,
            date: txn.date.to_rfc3339(),
            description: txn.description,
            amount: txn.amount,
            debit: txn.debit,
            credit: txn.credit,
            balance: txn.balance,
            currency: txn.currency,
            category: txn.category,
            review_status: txn.review_status,
        }
    }
}

/// Review edit: every field optional, `file_id` not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTransactionRequest {
    /// RFC 3339 timestamp or a plain YYYY-MM-DD date.
    pub date: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub balance: Option<f64>,
    #[validate(length(min = 3, max = 3))]
    pub currency: Option<String>,
    pub category: Option<String>,
    pub review_status: Option<ReviewStatus>,
}
