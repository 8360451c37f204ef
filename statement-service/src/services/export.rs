//! Export writers over a project's flattened transactions.
//!
//! Produces the download formats offered after a batch completes: an xlsx
//! workbook, CSV, a JSON array, and a minimal OFX/QBO interchange text.

use crate::dtos::{ExportFormat, TransactionResponse};
use crate::models::Transaction;
use chrono::{DateTime, Utc};
use rust_xlsxwriter::Workbook;
use service_core::error::AppError;

pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

pub fn export_transactions(
    format: ExportFormat,
    project_id: &str,
    transactions: &[Transaction],
) -> Result<ExportFile, AppError> {
    let mut transactions = transactions.to_vec();
    transactions.sort_by_key(|t| t.date);

    let id_prefix: String = project_id.chars().take(8).collect();
    let filename = format!("batch_{}_export.{}", id_prefix, format.extension());

    let bytes = match format {
        ExportFormat::Excel => write_workbook(&transactions)?,
        ExportFormat::Csv => write_csv(&transactions)?,
        ExportFormat::Json => write_json(&transactions)?,
        ExportFormat::Qbo => write_qbo(&transactions).into_bytes(),
    };

    Ok(ExportFile {
        bytes,
        content_type: format.content_type(),
        filename,
    })
}

const COLUMNS: [&str; 8] = [
    "Date",
    "Description",
    "Category",
    "Amount",
    "Debit",
    "Credit",
    "Balance",
    "Currency",
];

fn write_workbook(transactions: &[Transaction]) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Transactions")
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("xlsx worksheet: {}", e)))?;

    for (col, header) in COLUMNS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("xlsx header: {}", e)))?;
    }

    for (i, txn) in transactions.iter().enumerate() {
        let row = (i + 1) as u32;
        let write = |err| AppError::InternalError(anyhow::anyhow!("xlsx row: {}", err));
        worksheet
            .write_string(row, 0, txn.date.format("%Y-%m-%d").to_string())
            .map_err(write)?;
        worksheet.write_string(row, 1, &txn.description).map_err(write)?;
        worksheet
            .write_string(row, 2, txn.category.as_deref().unwrap_or(""))
            .map_err(write)?;
        worksheet.write_number(row, 3, txn.amount).map_err(write)?;
        if let Some(debit) = txn.debit {
            worksheet.write_number(row, 4, debit).map_err(write)?;
        }
        if let Some(credit) = txn.credit {
            worksheet.write_number(row, 5, credit).map_err(write)?;
        }
        if let Some(balance) = txn.balance {
            worksheet.write_number(row, 6, balance).map_err(write)?;
        }
        worksheet.write_string(row, 7, &txn.currency).map_err(write)?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("xlsx save: {}", e)))
}

fn write_csv(transactions: &[Transaction]) -> Result<Vec<u8>, AppError> {
    let csv_err = |e: csv::Error| AppError::InternalError(anyhow::anyhow!("csv write: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS).map_err(csv_err)?;

    for txn in transactions {
        writer
            .write_record([
                txn.date.format("%Y-%m-%d").to_string(),
                txn.description.clone(),
                txn.category.clone().unwrap_or_default(),
                txn.amount.to_string(),
                txn.debit.map(|v| v.to_string()).unwrap_or_default(),
                txn.credit.map(|v| v.to_string()).unwrap_or_default(),
                txn.balance.map(|v| v.to_string()).unwrap_or_default(),
                txn.currency.clone(),
            ])
            .map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("csv flush: {}", e)))
}

fn write_json(transactions: &[Transaction]) -> Result<Vec<u8>, AppError> {
    let rows: Vec<TransactionResponse> = transactions
        .iter()
        .cloned()
        .map(TransactionResponse::from)
        .collect();
    serde_json::to_vec_pretty(&rows)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("json export: {}", e)))
}

fn ofx_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M%S").to_string()
}

/// Signed amount for the interchange format: stored amounts are absolute,
/// direction comes from the debit column.
fn signed_amount(txn: &Transaction) -> f64 {
    if txn.debit.is_some() {
        -txn.amount
    } else {
        txn.amount
    }
}

fn write_qbo(transactions: &[Transaction]) -> String {
    let now = ofx_datetime(Utc::now());
    let currency = transactions
        .first()
        .map(|t| t.currency.as_str())
        .unwrap_or("USD");
    let start = transactions
        .first()
        .map(|t| ofx_datetime(t.date))
        .unwrap_or_else(|| now.clone());
    let end = transactions
        .last()
        .map(|t| ofx_datetime(t.date))
        .unwrap_or_else(|| now.clone());
    let ledger_balance = transactions
        .last()
        .and_then(|t| t.balance)
        .unwrap_or(0.0);

    let mut body = String::new();
    for txn in transactions {
        let amount = signed_amount(txn);
        let trn_type = if amount < 0.0 { "DEBIT" } else { "CREDIT" };
        body.push_str(&format!(
            "<STMTTRN>\n<TRNTYPE>{}\n<DTPOSTED>{}\n<TRNAMT>{}\n<FITID>{}\n<NAME>{}\n<MEMO>{}\n</STMTTRN>\n",
            trn_type,
            ofx_datetime(txn.date),
            amount,
            txn.id,
            txn.description,
            txn.category.as_deref().unwrap_or(""),
        ));
    }

    format!(
        "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\nSECURITY:NONE\nENCODING:USASCII\nCHARSET:1252\nCOMPRESSION:NONE\nOLDFILEUID:NONE\nNEWFILEUID:NONE\n\n\
<OFX>\n<SIGNONMSGSRSV1>\n<SONRS>\n<STATUS>\n<CODE>0\n<SEVERITY>INFO\n</STATUS>\n<DTSERVER>{now}\n<LANGUAGE>ENG\n</SONRS>\n</SIGNONMSGSRSV1>\n\
<BANKMSGSRSV1>\n<STMTTRNRS>\n<TRNUID>1\n<STATUS>\n<CODE>0\n<SEVERITY>INFO\n</STATUS>\n<STMTRS>\n<CURDEF>{currency}\n\
<BANKACCTFROM>\n<BANKID>999999999\n<ACCTID>123456789\n<ACCTTYPE>CHECKING\n</BANKACCTFROM>\n\
<BANKTRANLIST>\n<DTSTART>{start}\n<DTEND>{end}\n{body}</BANKTRANLIST>\n\
<LEDGERBAL>\n<BALAMT>{ledger_balance}\n<DTASOF>{now}\n</LEDGERBAL>\n</STMTRS>\n</STMTTRNRS>\n</BANKMSGSRSV1>\n</OFX>"
    )
}
