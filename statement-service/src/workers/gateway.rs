//! Adapter over the remote AI document-extraction endpoint.
//!
//! Sends the stored document with a strict output schema and maps the
//! response into transaction candidates. Any transport error, non-success
//! status, or malformed body surfaces as an `ExtractError`; the worker
//! falls back on it.

use super::{ExtractError, ExtractedRecord, Extractor};
use crate::config::ExtractionConfig;
use crate::models::StatementFile;
use crate::services::Storage;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub struct GatewayExtractor {
    client: Client,
    endpoint: String,
    api_token: String,
    model: String,
    max_output_tokens: u32,
    timeout_secs: u64,
    storage: Arc<dyn Storage>,
}

impl GatewayExtractor {
    pub fn new(config: &ExtractionConfig, storage: Arc<dyn Storage>) -> Self {
        // Hard client-side abort, independent of whatever timeout the
        // gateway enforces server-side.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.timeout_secs,
            storage,
        }
    }

    /// Required output shape: an array of transaction objects with
    /// nullable debit/credit/balance columns.
    fn output_schema() -> serde_json::Value {
        json!({
            "additionalProperties": false,
            "properties": {
                "transactions": {
                    "type": "array",
                    "items": {
                        "additionalProperties": false,
                        "properties": {
                            "date": {
                                "description": "Transaction date (YYYY-MM-DD)",
                                "type": "string"
                            },
                            "description": {
                                "description": "Description of the transaction",
                                "type": "string"
                            },
                            "amount": {
                                "description": "Transaction amount (absolute value)",
                                "type": "number"
                            },
                            "debit": {
                                "description": "Debit amount (if applicable)",
                                "type": ["number", "null"]
                            },
                            "credit": {
                                "description": "Credit amount (if applicable)",
                                "type": ["number", "null"]
                            },
                            "balance": {
                                "description": "Running balance after transaction",
                                "type": ["number", "null"]
                            },
                            "currency": {
                                "description": "Currency code (e.g. USD)",
                                "type": "string"
                            }
                        },
                        "required": ["date", "description", "amount", "debit", "credit", "balance", "currency"],
                        "type": "object"
                    }
                }
            },
            "required": ["transactions"],
            "title": "BankStatement",
            "type": "object"
        })
    }

    fn payload_type(storage_key: &str) -> &'static str {
        let extension = storage_key
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match extension.as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "tif" | "tiff" => "image",
            _ => "pdf",
        }
    }

    fn build_request_body(&self, storage_key: &str, document: &[u8]) -> serde_json::Value {
        let content = base64::engine::general_purpose::STANDARD.encode(document);

        json!({
            "openai_config": {
                "model": self.model,
                "reasoning_effort": "medium",
                "image_detail": "high",
                "temperature": 0,
                "max_tokens": self.max_output_tokens,
                "timeout": 360,
                "max_retries": 0
            },
            "strict": true,
            "output_schema": Self::output_schema(),
            "payload": {
                "type": Self::payload_type(storage_key),
                "description": "Bank statement file",
                "preprocess_config": {
                    "contrast_factor": 1,
                    "dpi": 300,
                    "grayscale": false,
                    "ocr_enhancement": "all"
                },
                "value": {
                    "content": content,
                    "source": "base64"
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    extraction: Option<Extraction>,
}

#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default)]
    transactions: Vec<ExtractedRecord>,
}

#[async_trait]
impl Extractor for GatewayExtractor {
    async fn extract(&self, file: &StatementFile) -> Result<Vec<ExtractedRecord>, ExtractError> {
        let document = self
            .storage
            .download(&file.storage_key)
            .await
            .map_err(|e| ExtractError::Storage(e.to_string()))?;

        let body = self.build_request_body(&file.storage_key, &document);

        tracing::debug!(
            file_id = %file.id,
            model = %self.model,
            document_size = document.len(),
            "Sending extraction request to gateway"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout(self.timeout_secs)
                } else {
                    ExtractError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractError::Gateway(format!("{} {}", status, error_text)));
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::InvalidResponse(e.to_string()))?;

        let records = parsed
            .extraction
            .map(|e| e.transactions)
            .unwrap_or_default();

        tracing::info!(
            file_id = %file.id,
            transactions = records.len(),
            "Gateway extraction returned"
        );

        Ok(records)
    }
}
