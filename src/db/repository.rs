use super::mapper::{TRANSACTION_COLUMNS, map_transaction_row};
use crate::error::{Error, Result};
use crate::models::transaction::{
    NewTransaction, Transaction, TransactionType, start_of_day, truncate_to_millis,
};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, Params, params};
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

/// Newest first; rows sharing a timestamp come back in reverse insertion order.
const ORDER_NEWEST_FIRST: &str = "ORDER BY date DESC, id DESC";

pub fn add_transaction(conn: &Connection, transaction: &NewTransaction) -> Result<i64> {
    let transaction = transaction.normalized()?;
    let date = match transaction.date {
        Some(date) => date,
        None => truncate_to_millis(Utc::now())?,
    };

    conn.execute(
        "INSERT INTO transactions (amount, type, category, date, note) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            amount_to_sql(&transaction)?,
            transaction.kind.as_str(),
            transaction.category,
            date.timestamp_millis(),
            transaction.note,
        ],
    )?;

    let id = conn.last_insert_rowid();
    info!(id, kind = %transaction.kind, "Added transaction");
    Ok(id)
}

/// Replaces every editable field of the transaction with `id`.
///
/// Returns `Ok(false)` when no such transaction exists.
pub fn update_transaction(conn: &Connection, id: i64, transaction: &NewTransaction) -> Result<bool> {
    let transaction = transaction.normalized()?;
    let amount = amount_to_sql(&transaction)?;

    let rows_affected = match transaction.date {
        Some(date) => conn.execute(
            "UPDATE transactions SET amount = ?1, type = ?2, category = ?3, note = ?4, date = ?5 WHERE id = ?6",
            params![
                amount,
                transaction.kind.as_str(),
                transaction.category,
                transaction.note,
                date.timestamp_millis(),
                id,
            ],
        )?,
        None => conn.execute(
            "UPDATE transactions SET amount = ?1, type = ?2, category = ?3, note = ?4 WHERE id = ?5",
            params![
                amount,
                transaction.kind.as_str(),
                transaction.category,
                transaction.note,
                id,
            ],
        )?,
    };

    if rows_affected == 0 {
        debug!(id, "Update matched no transaction");
        return Ok(false);
    }
    info!(id, "Updated transaction");
    Ok(true)
}

/// Returns `Ok(false)` when no such transaction exists, so deleting twice is harmless.
pub fn delete_transaction(conn: &Connection, id: i64) -> Result<bool> {
    let rows_affected = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        debug!(id, "Delete matched no transaction");
        return Ok(false);
    }
    info!(id, "Deleted transaction");
    Ok(true)
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let mut transactions = query_transactions(conn, "WHERE id = ?1", [id])?;
    Ok(transactions.pop())
}

pub fn get_all_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    query_transactions(conn, "", [])
}

pub fn get_transactions_by_type(conn: &Connection, kind: TransactionType) -> Result<Vec<Transaction>> {
    query_transactions(conn, "WHERE type = ?1", [kind.as_str()])
}

pub fn get_transactions_by_category(conn: &Connection, category: &str) -> Result<Vec<Transaction>> {
    query_transactions(conn, "WHERE LOWER(category) = LOWER(?1)", [category.trim()])
}

/// Transactions dated on any day from `start` to `end`, both inclusive (UTC).
pub fn get_transactions_by_date_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Transaction>> {
    if start > end {
        return Err(Error::InvalidDateRange);
    }
    let from = start_of_day(start).timestamp_millis();
    let until = match end.succ_opt() {
        Some(next_day) => start_of_day(next_day).timestamp_millis(),
        None => i64::MAX,
    };

    query_transactions(conn, "WHERE date >= ?1 AND date < ?2", [from, until])
}

/// Transactions whose category or note contains `query`.
///
/// Matching uses SQLite's `LIKE`, so it ignores ASCII case. The query is
/// matched as given, whitespace included, and wildcard characters in it are
/// matched literally.
pub fn search_transactions(conn: &Connection, query: &str) -> Result<Vec<Transaction>> {
    let pattern = format!("%{}%", escape_like(query));
    query_transactions(
        conn,
        "WHERE category LIKE ?1 ESCAPE '\\' OR note LIKE ?1 ESCAPE '\\'",
        [pattern],
    )
}

fn query_transactions<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {} FROM transactions {} {}",
        TRANSACTION_COLUMNS, filter, ORDER_NEWEST_FIRST
    );
    debug!(%sql, "Querying transactions");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, map_transaction_row)?;

    let mut transactions = Vec::new();
    for transaction in rows {
        transactions.push(transaction?);
    }
    Ok(transactions)
}

fn amount_to_sql(transaction: &NewTransaction) -> Result<f64> {
    transaction
        .amount
        .to_f64()
        .ok_or_else(|| Error::InvalidInput(format!("Amount {} is out of range.", transaction.amount)))
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::establish_test_connection;
    use crate::models::transaction::MAX_AMOUNT;
    use chrono::{DateTime, Duration};
    use rust_decimal::Decimal;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_transaction(
        amount: i64,
        kind: TransactionType,
        category: &str,
        note: &str,
        date: NaiveDate,
    ) -> NewTransaction {
        NewTransaction::new(Decimal::new(amount, 0), kind, category, note, Some(start_of_day(date)))
    }

    fn seed(conn: &Connection) -> (i64, i64, i64) {
        let salary = add_transaction(
            conn,
            &create_test_transaction(1000, TransactionType::Income, "Salary", "", day(2025, 1, 1)),
        )
        .unwrap();
        let lunch = add_transaction(
            conn,
            &create_test_transaction(25, TransactionType::Expense, "Food", "Lunch with Sam", day(2025, 1, 3)),
        )
        .unwrap();
        let bus = add_transaction(
            conn,
            &create_test_transaction(3, TransactionType::Expense, "Transport", "Bus ticket", day(2025, 1, 2)),
        )
        .unwrap();
        (salary, lunch, bus)
    }

    #[test]
    fn test_add_then_get_returns_inputs() {
        let conn = establish_test_connection().unwrap();
        let date = DateTime::from_timestamp_millis(1_736_000_123_456).unwrap();
        let input = NewTransaction::new(
            Decimal::new(1999, 2),
            TransactionType::Expense,
            "Books",
            "Paperback, \"used\"",
            Some(date),
        );

        let id = add_transaction(&conn, &input).unwrap();
        let stored = get_transaction(&conn, id).unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.amount, Decimal::new(1999, 2));
        assert_eq!(stored.kind, TransactionType::Expense);
        assert_eq!(stored.category, "Books");
        assert_eq!(stored.note, "Paperback, \"used\"");
        assert_eq!(stored.date, date);
    }

    #[test]
    fn test_add_without_date_uses_now() {
        let conn = establish_test_connection().unwrap();
        let before = Utc::now() - Duration::seconds(1);
        let input = NewTransaction::new(Decimal::ONE, TransactionType::Income, "Gift", "", None);

        let id = add_transaction(&conn, &input).unwrap();
        let stored = get_transaction(&conn, id).unwrap().unwrap();

        assert!(stored.date >= before);
        assert!(stored.date <= Utc::now());
    }

    #[test]
    fn test_add_stores_negative_expense_as_magnitude() {
        let conn = establish_test_connection().unwrap();
        let input = create_test_transaction(-40, TransactionType::Expense, "Fuel", "", day(2025, 2, 1));

        let id = add_transaction(&conn, &input).unwrap();
        let raw: f64 = conn
            .query_row("SELECT amount FROM transactions WHERE id = ?1", [id], |row| row.get(0))
            .unwrap();
        assert_eq!(raw, 40.0);
    }

    #[test]
    fn test_add_rejects_invalid_input() {
        let conn = establish_test_connection().unwrap();
        let input = create_test_transaction(0, TransactionType::Income, "Salary", "", day(2025, 1, 1));

        let result = add_transaction(&conn, &input);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(get_all_transactions(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_add_max_amount_reads_back_unchanged() {
        let conn = establish_test_connection().unwrap();
        let input = NewTransaction::new(
            MAX_AMOUNT,
            TransactionType::Income,
            "Lottery",
            "",
            Some(start_of_day(day(2025, 1, 1))),
        );

        let id = add_transaction(&conn, &input).unwrap();
        assert_eq!(get_transaction(&conn, id).unwrap().unwrap().amount, MAX_AMOUNT);
    }

    #[test]
    fn test_oversized_amount_is_rejected_and_store_stays_readable() {
        let conn = establish_test_connection().unwrap();
        let (salary, lunch, bus) = seed(&conn);

        let huge = NewTransaction::new(Decimal::MAX, TransactionType::Expense, "Food", "", None);
        assert!(matches!(add_transaction(&conn, &huge), Err(Error::InvalidInput(_))));

        let lossy = NewTransaction::new(
            Decimal::new(1_234_567_890_123_456_789, 2),
            TransactionType::Income,
            "Salary",
            "",
            None,
        );
        assert!(matches!(add_transaction(&conn, &lossy), Err(Error::InvalidInput(_))));
        assert!(matches!(update_transaction(&conn, salary, &huge), Err(Error::InvalidInput(_))));

        let ids: Vec<i64> = get_all_transactions(&conn).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![lunch, bus, salary]);
        assert_eq!(get_transaction(&conn, salary).unwrap().unwrap().amount, Decimal::new(1000, 0));
    }

    #[test]
    fn test_get_all_transactions_empty() {
        let conn = establish_test_connection().unwrap();
        assert!(get_all_transactions(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_get_all_transactions_newest_first() {
        let conn = establish_test_connection().unwrap();
        let (salary, lunch, bus) = seed(&conn);

        let ids: Vec<i64> = get_all_transactions(&conn).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![lunch, bus, salary]);
    }

    #[test]
    fn test_same_date_orders_by_latest_insert() {
        let conn = establish_test_connection().unwrap();
        let first = add_transaction(
            &conn,
            &create_test_transaction(5, TransactionType::Expense, "Food", "", day(2025, 1, 1)),
        )
        .unwrap();
        let second = add_transaction(
            &conn,
            &create_test_transaction(6, TransactionType::Expense, "Food", "", day(2025, 1, 1)),
        )
        .unwrap();

        let ids: Vec<i64> = get_all_transactions(&conn).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_get_transaction_not_found() {
        let conn = establish_test_connection().unwrap();
        assert!(get_transaction(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_update_transaction_replaces_fields() {
        let conn = establish_test_connection().unwrap();
        let (_, lunch, _) = seed(&conn);

        let replacement =
            create_test_transaction(30, TransactionType::Expense, "Dining", "Dinner", day(2025, 1, 4));
        assert!(update_transaction(&conn, lunch, &replacement).unwrap());

        let stored = get_transaction(&conn, lunch).unwrap().unwrap();
        assert_eq!(stored.id, lunch);
        assert_eq!(stored.amount, Decimal::new(30, 0));
        assert_eq!(stored.category, "Dining");
        assert_eq!(stored.note, "Dinner");
        assert_eq!(stored.calendar_date(), day(2025, 1, 4));
    }

    #[test]
    fn test_update_without_date_keeps_stored_date() {
        let conn = establish_test_connection().unwrap();
        let (salary, _, _) = seed(&conn);

        let replacement = NewTransaction::new(Decimal::new(1200, 0), TransactionType::Income, "Salary", "raise", None);
        assert!(update_transaction(&conn, salary, &replacement).unwrap());

        let stored = get_transaction(&conn, salary).unwrap().unwrap();
        assert_eq!(stored.calendar_date(), day(2025, 1, 1));
        assert_eq!(stored.amount, Decimal::new(1200, 0));
    }

    #[test]
    fn test_update_transaction_not_found() {
        let conn = establish_test_connection().unwrap();
        let replacement = create_test_transaction(1, TransactionType::Income, "Gift", "", day(2025, 1, 1));

        assert!(!update_transaction(&conn, 404, &replacement).unwrap());
        assert!(get_all_transactions(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_delete_transaction_success() {
        let conn = establish_test_connection().unwrap();
        let (salary, _, _) = seed(&conn);

        assert!(delete_transaction(&conn, salary).unwrap());
        assert!(get_transaction(&conn, salary).unwrap().is_none());
        assert!(get_all_transactions(&conn).unwrap().iter().all(|t| t.id != salary));
    }

    #[test]
    fn test_delete_transaction_twice_reports_failure() {
        let conn = establish_test_connection().unwrap();
        let (salary, _, _) = seed(&conn);

        assert!(delete_transaction(&conn, salary).unwrap());
        assert!(!delete_transaction(&conn, salary).unwrap());
    }

    #[test]
    fn test_get_transactions_by_type_is_stable() {
        let conn = establish_test_connection().unwrap();
        seed(&conn);

        let first = get_transactions_by_type(&conn, TransactionType::Expense).unwrap();
        let second = get_transactions_by_type(&conn, TransactionType::Expense).unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|t| t.kind == TransactionType::Expense));
        assert_eq!(first, second);
    }

    #[test]
    fn test_get_transactions_by_category_case_insensitive() {
        let conn = establish_test_connection().unwrap();
        seed(&conn);

        let result = get_transactions_by_category(&conn, "FOOD").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].category, "Food");
        assert!(get_transactions_by_category(&conn, "Shopping").unwrap().is_empty());
    }

    #[test]
    fn test_get_transactions_by_date_range_inclusive() {
        let conn = establish_test_connection().unwrap();
        let (salary, _, bus) = seed(&conn);
        let late = add_transaction(
            &conn,
            &NewTransaction::new(
                Decimal::ONE,
                TransactionType::Expense,
                "Snacks",
                "",
                Some(start_of_day(day(2025, 1, 2)) + Duration::hours(23) + Duration::minutes(59)),
            ),
        )
        .unwrap();

        let ids: Vec<i64> = get_transactions_by_date_range(&conn, day(2025, 1, 1), day(2025, 1, 2))
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![late, bus, salary]);
    }

    #[test]
    fn test_get_transactions_by_date_range_rejects_reversed_range() {
        let conn = establish_test_connection().unwrap();
        let result = get_transactions_by_date_range(&conn, day(2025, 2, 1), day(2025, 1, 1));
        assert!(matches!(result, Err(Error::InvalidDateRange)));
    }

    #[test]
    fn test_search_matches_category_or_note() {
        let conn = establish_test_connection().unwrap();
        let (_, lunch, bus) = seed(&conn);

        let by_note: Vec<i64> = search_transactions(&conn, "sam").unwrap().iter().map(|t| t.id).collect();
        assert_eq!(by_note, vec![lunch]);

        let by_category: Vec<i64> = search_transactions(&conn, "trans").unwrap().iter().map(|t| t.id).collect();
        assert_eq!(by_category, vec![bus]);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let conn = establish_test_connection().unwrap();
        seed(&conn);
        add_transaction(
            &conn,
            &create_test_transaction(10, TransactionType::Expense, "Fees", "100% markup", day(2025, 1, 5)),
        )
        .unwrap();

        let result = search_transactions(&conn, "%").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].category, "Fees");
        assert!(search_transactions(&conn, "_").unwrap().is_empty());
    }

    #[test]
    fn test_search_matches_whitespace_as_given() {
        let conn = establish_test_connection().unwrap();
        let (_, lunch, bus) = seed(&conn);

        let with_space: Vec<i64> = search_transactions(&conn, " ").unwrap().iter().map(|t| t.id).collect();
        assert_eq!(with_space, vec![lunch, bus]);

        assert!(search_transactions(&conn, " sam ").unwrap().is_empty());
        assert_eq!(search_transactions(&conn, "").unwrap().len(), 3);
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let conn = establish_test_connection().unwrap();
        conn.execute(
            "INSERT INTO transactions (amount, type, category, date, note) VALUES (1, 'income', 'Gift', 'not a date', '')",
            [],
        )
        .unwrap();

        let result = get_all_transactions(&conn);
        assert!(matches!(result, Err(Error::CorruptRecord(_))));
    }
}
