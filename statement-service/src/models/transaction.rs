use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review state assigned by the user while checking extracted rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Verified,
    Flagged,
}

/// One extracted financial line item. Created only by the processing
/// worker; `file_id` is fixed at creation, all other fields may be edited
/// through the review endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub file_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
    pub description: String,
    /// Absolute value; direction is carried by `debit`/`credit`.
    pub amount: f64,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub balance: Option<f64>,
    pub currency: String,
    pub category: Option<String>,
    pub review_status: Option<ReviewStatus>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_id: String,
        date: DateTime<Utc>,
        description: String,
        amount: f64,
        debit: Option<f64>,
        credit: Option<f64>,
        balance: Option<f64>,
        currency: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_id,
            date,
            description,
            amount,
            debit,
            credit,
            balance,
            currency,
            category: None,
            review_status: None,
        }
    }
}
