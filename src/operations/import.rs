use crate::db::repository;
use crate::error::{Error, Result};
use crate::models::transaction::{NewTransaction, TransactionType, parse_date, start_of_day};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Reads transactions from a file in the export format and stores them all,
/// or none if any line is invalid. Returns how many were imported.
pub fn import_transactions_to_db(conn: &Connection, path: &Path) -> Result<usize> {
    let file = File::open(path).map_err(|e| {
        Error::InvalidInput(format!("Failed to open file '{}': {}", path.display(), e))
    })?;
    let transactions = parse_export(file)?;

    let tx = conn.unchecked_transaction()?;
    for transaction in &transactions {
        repository::add_transaction(&tx, transaction)?;
    }
    tx.commit()?;

    info!(path = %path.display(), count = transactions.len(), "Imported transactions");
    Ok(transactions.len())
}

/// Parses CSV written by the exporter. The `ID` column is ignored since the
/// store assigns new ids; `Note` may be missing.
pub fn parse_export<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let missing = |name: &str| Error::InvalidInput(format!("Missing '{}' column in header", name));

    let type_idx = column("Type").ok_or_else(|| missing("Type"))?;
    let category_idx = column("Category").ok_or_else(|| missing("Category"))?;
    let amount_idx = column("Amount").ok_or_else(|| missing("Amount"))?;
    let date_idx = column("Date").ok_or_else(|| missing("Date"))?;
    let note_idx = column("Note").or_else(|| column("Description"));

    let mut transactions = Vec::new();
    for (line_index, result) in reader.records().enumerate() {
        let line = line_index + 1;
        let record = result.map_err(|e| Error::InvalidInput(format!("Line {}: {}", line, e)))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let kind = TransactionType::from_str(field(type_idx))
            .map_err(|e| Error::InvalidInput(format!("Line {}: {}", line, e)))?;
        let amount = parse_amount(field(amount_idx))
            .map_err(|e| Error::InvalidInput(format!("Line {}: {}", line, e)))?;
        let date = parse_date(field(date_idx))
            .map_err(|e| Error::InvalidInput(format!("Line {}: {}", line, e)))?;
        let note = note_idx.map(field).unwrap_or("");

        let transaction = NewTransaction::new(
            amount,
            kind,
            field(category_idx),
            note,
            Some(start_of_day(date)),
        );
        transaction
            .normalized()
            .map_err(|e| Error::InvalidInput(format!("Line {}: {}", line, e)))?;
        transactions.push(transaction);
    }

    Ok(transactions)
}

/// Accepts plain numbers and amounts with a leading currency sign.
fn parse_amount(raw: &str) -> Result<Decimal> {
    let digits = raw.trim().replacen('$', "", 1);
    Decimal::from_str(digits.trim()).map_err(|_| {
        Error::InvalidInput(format!(
            "Invalid amount format {}. Please provide a valid decimal number.",
            raw
        ))
    })
}
