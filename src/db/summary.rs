use super::mapper::decode_amount;
use crate::error::{Error, Result};
use rusqlite::{Connection, Params};
use rust_decimal::Decimal;

/// Running totals over every stored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

pub fn total_income(conn: &Connection) -> Result<Decimal> {
    sum_amounts(conn, "WHERE type = 'income'", [])
}

/// Expenses as a positive number.
pub fn total_expense(conn: &Connection) -> Result<Decimal> {
    sum_amounts(conn, "WHERE type = 'expense'", [])
}

pub fn total_balance(conn: &Connection) -> Result<Decimal> {
    Ok(totals(conn)?.balance)
}

pub fn totals(conn: &Connection) -> Result<Totals> {
    let income = total_income(conn)?;
    let expense = total_expense(conn)?;
    Ok(Totals {
        income,
        expense,
        balance: income - expense,
    })
}

pub fn total_expense_by_category(conn: &Connection, category: &str) -> Result<Decimal> {
    sum_amounts(
        conn,
        "WHERE type = 'expense' AND LOWER(category) = LOWER(?1)",
        [category.trim()],
    )
}

/// Expense totals per category, largest first.
pub fn expense_totals_by_category(conn: &Connection) -> Result<Vec<(String, Decimal)>> {
    let mut stmt = conn.prepare(
        "SELECT category, SUM(ABS(amount)) AS total FROM transactions
         WHERE type = 'expense'
         GROUP BY category
         ORDER BY total DESC, category ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        let category: String = row.get(0)?;
        let total: f64 = row.get(1)?;
        Ok((category, total))
    })?;

    let mut totals = Vec::new();
    for row in rows {
        let (category, total) = row?;
        totals.push((category, to_decimal(total)?));
    }
    Ok(totals)
}

// ABS keeps rows written with the old negative-expense convention correct.
fn sum_amounts<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Decimal> {
    let sql = format!(
        "SELECT IFNULL(SUM(ABS(amount)), 0.0) FROM transactions {}",
        filter
    );
    let total: f64 = conn.query_row(&sql, params, |row| row.get(0))?;
    to_decimal(total)
}

fn to_decimal(total: f64) -> Result<Decimal> {
    decode_amount(total).ok_or_else(|| Error::CorruptRecord(format!("total {} is not a number", total)))
}
