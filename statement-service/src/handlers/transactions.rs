use crate::dtos::{TransactionResponse, UpdateTransactionRequest};
use crate::middleware::UserId;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::{doc, Document};
use service_core::error::AppError;
use validator::Validate;

/// Review edit for a single extracted row. Parentage (`file_id`) is fixed
/// at creation and not editable here.
pub async fn update_transaction(
    State(state): State<AppState>,
    _user_id: UserId,
    Path(transaction_id): Path<String>,
    Json(request): Json<UpdateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let mut set = Document::new();

    if let Some(date) = &request.date {
        let parsed = parse_edit_date(date).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Invalid date: {}", date))
        })?;
        set.insert("date", mongodb::bson::DateTime::from_chrono(parsed));
    }
    if let Some(description) = request.description {
        set.insert("description", description);
    }
    if let Some(amount) = request.amount {
        set.insert("amount", amount);
    }
    if let Some(debit) = request.debit {
        set.insert("debit", debit);
    }
    if let Some(credit) = request.credit {
        set.insert("credit", credit);
    }
    if let Some(balance) = request.balance {
        set.insert("balance", balance);
    }
    if let Some(currency) = request.currency {
        set.insert("currency", currency);
    }
    if let Some(category) = request.category {
        set.insert("category", category);
    }
    if let Some(review_status) = request.review_status {
        let status = mongodb::bson::to_bson(&review_status).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize review status: {}", e))
        })?;
        set.insert("review_status", status);
    }

    if set.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No fields to update")));
    }

    let result = state
        .db
        .transactions()
        .update_one(doc! { "_id": &transaction_id }, doc! { "$set": set }, None)
        .await
        .map_err(AppError::from)?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!("Transaction not found")));
    }

    let transaction = state
        .db
        .transactions()
        .find_one(doc! { "_id": &transaction_id }, None)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    tracing::info!(transaction_id = %transaction_id, "Transaction updated");

    Ok(Json(TransactionResponse::from(transaction)))
}

fn parse_edit_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_date_forms() {
        assert!(parse_edit_date("2024-03-01").is_some());
        assert!(parse_edit_date("2024-03-01T10:30:00Z").is_some());
        assert!(parse_edit_date("03/01/2024").is_none());
    }
}
