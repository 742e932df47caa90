//! Conversion between rows of the `transactions` table and [`Transaction`] values.
//!
//! Databases written by older versions of the app hold dates as text and
//! expenses as negative amounts. Migrations rewrite those rows, but the mapper
//! still reads both shapes so a half-migrated file never breaks a listing.

use crate::models::transaction::{Transaction, TransactionType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{Row, Statement};
use rusqlite::types::{Type, ValueRef};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Columns selected by every transaction query. The mapper reads them by name.
pub const TRANSACTION_COLUMNS: &str = "id, amount, type, category, date, note";

const LEGACY_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const LEGACY_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

pub fn map_transaction_row(row: &Row) -> rusqlite::Result<Transaction> {
    let raw_amount: f64 = row.get("amount")?;
    let amount = decode_amount(raw_amount)
        .ok_or_else(|| conversion_error(row, "amount", Type::Real, format!("amount {} is not a number", raw_amount)))?;

    let type_str: Option<String> = row.get("type")?;
    let kind = match type_str.as_deref().map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("income") => TransactionType::Income,
        Some(s) if s.eq_ignore_ascii_case("expense") => TransactionType::Expense,
        // Rows from before the type column existed carry the sign instead.
        None | Some("") if amount.is_sign_negative() => TransactionType::Expense,
        None | Some("") => TransactionType::Income,
        Some(other) => {
            return Err(conversion_error(
                row,
                "type",
                Type::Text,
                format!("unknown transaction type '{}'", other),
            ));
        }
    };

    let date = decode_stored_date(row.get_ref("date")?).ok_or_else(|| {
        conversion_error(row, "date", Type::Integer, "unreadable date".to_string())
    })?;

    Ok(Transaction {
        id: row.get("id")?,
        amount: amount.abs(),
        kind,
        category: row.get::<_, Option<String>>("category")?.unwrap_or_default(),
        note: row.get::<_, Option<String>>("note")?.unwrap_or_default(),
        date,
    })
}

pub fn decode_amount(raw: f64) -> Option<Decimal> {
    Decimal::from_f64(raw).map(|amount| amount.round_dp(2))
}

/// Reads a stored date in any representation the app has ever written:
/// integer or real milliseconds, digit strings, ISO date-times, `yyyy-MM-dd`
/// and `dd/MM/yyyy`. Text dates are taken as UTC.
pub fn decode_stored_date(value: ValueRef<'_>) -> Option<DateTime<Utc>> {
    match value {
        ValueRef::Integer(millis) => DateTime::from_timestamp_millis(millis),
        ValueRef::Real(millis) => DateTime::from_timestamp_millis(millis as i64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_date_text),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

pub fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }
    if let Some(datetime) = LEGACY_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(datetime.and_utc());
    }
    LEGACY_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn conversion_error(row: &Row, column: &str, ty: Type, message: String) -> rusqlite::Error {
    let stmt: &Statement<'_> = row.as_ref();
    let index = stmt.column_index(column).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(index, ty, message.into())
}
