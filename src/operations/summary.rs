use crate::db::summary::{Totals, totals};
use crate::error::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

/// The balance overview shown in the daily reminder.
pub fn daily_summary(conn: &Connection) -> Result<String> {
    Ok(format_summary(&totals(conn)?))
}

pub fn format_summary(totals: &Totals) -> String {
    format!(
        "Current Balance: {}\nTotal Income: {}\nTotal Expenses: {}",
        format_money(totals.balance),
        format_money(totals.income),
        format_money(totals.expense)
    )
}

/// `$1234.50`, or `-$12.00` for negative values.
pub fn format_money(amount: Decimal) -> String {
    if amount.is_sign_negative() && !amount.is_zero() {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::establish_test_connection;
    use crate::db::repository::add_transaction;
    use crate::models::transaction::{NewTransaction, TransactionType};

    #[test]
    fn test_daily_summary_empty_store() {
        let conn = establish_test_connection().unwrap();
        assert_eq!(
            daily_summary(&conn).unwrap(),
            "Current Balance: $0.00\nTotal Income: $0.00\nTotal Expenses: $0.00"
        );
    }

    #[test]
    fn test_daily_summary_with_negative_balance() {
        let conn = establish_test_connection().unwrap();
        add_transaction(&conn, &NewTransaction::new(Decimal::new(1000, 2), TransactionType::Income, "Gift", "", None)).unwrap();
        add_transaction(&conn, &NewTransaction::new(Decimal::new(2550, 2), TransactionType::Expense, "Food", "", None)).unwrap();

        let summary = daily_summary(&conn).unwrap();
        assert!(summary.starts_with("Current Balance: -$15.50\n"));
        assert!(summary.contains("Total Income: $10.00"));
        assert!(summary.ends_with("Total Expenses: $25.50"));
    }

    #[test]
    fn test_format_money_negative_zero() {
        assert_eq!(format_money(-Decimal::ZERO), "$0.00");
    }
}
