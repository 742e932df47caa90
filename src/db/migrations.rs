//! Forward-only schema migrations keyed by `PRAGMA user_version`.
//!
//! Each migration runs in its own SQL transaction together with the version
//! bump, so a failure leaves the database at the last good version.

use super::mapper::decode_stored_date;
use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction as SqlTransaction};
use tracing::{info, warn};

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub apply: fn(&SqlTransaction) -> rusqlite::Result<()>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create transactions table",
        apply: create_transactions_table,
    },
    Migration {
        version: 2,
        description: "rebuild legacy rows into the canonical schema",
        apply: rebuild_legacy_table,
    },
    Migration {
        version: 3,
        description: "index transactions by date",
        apply: index_by_date,
    },
];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Applies every migration newer than the database's current version.
/// Returns the version the database ends up at.
pub fn run_migrations(conn: &mut Connection) -> Result<u32> {
    let mut current = schema_version(conn)?;
    if current > latest_version() {
        return Err(Error::UnsupportedSchema(current));
    }

    let start = current;
    for migration in MIGRATIONS.iter().filter(|m| m.version > start) {
        info!(
            version = migration.version,
            "Applying migration: {}", migration.description
        );
        let tx = conn.transaction()?;
        (migration.apply)(&tx)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        current = migration.version;
    }

    Ok(current)
}

fn create_transactions_table(tx: &SqlTransaction) -> rusqlite::Result<()> {
    // Databases from before versioning already have a table; keep it for
    // migration 2 to rebuild.
    create_canonical_table(tx, "transactions")
}

fn create_canonical_table(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category TEXT NOT NULL,
                date INTEGER NOT NULL,
                note TEXT
            )",
            name
        ),
        [],
    )?;
    Ok(())
}

fn rebuild_legacy_table(tx: &SqlTransaction) -> rusqlite::Result<()> {
    let columns = table_columns(tx)?;
    let has = |name: &str| columns.iter().any(|c| c.eq_ignore_ascii_case(name));

    let type_expr = if has("type") { "type" } else { "NULL" };
    let note_expr = match (has("note"), has("description")) {
        (true, true) => "COALESCE(NULLIF(note, ''), description)",
        (true, false) => "note",
        (false, true) => "description",
        (false, false) => "NULL",
    };

    let rows: Vec<LegacyRow> = {
        let mut stmt = tx.prepare(&format!(
            "SELECT id, amount, {} AS type, category, date, {} AS note FROM transactions",
            type_expr, note_expr
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(LegacyRow {
                id: row.get(0)?,
                amount: row.get::<_, Option<f64>>(1)?.unwrap_or_default(),
                kind: row.get(2)?,
                category: row.get(3)?,
                date: decode_stored_date(row.get_ref(4)?).map(|d| d.timestamp_millis()),
                note: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    create_canonical_table(tx, "transactions_rebuilt")?;
    let mut insert = tx.prepare(
        "INSERT INTO transactions_rebuilt (id, amount, type, category, date, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut flipped = 0;
    for row in &rows {
        let kind = match row.kind.as_deref().map(|k| k.trim().to_lowercase()) {
            Some(k) if k == "income" || k == "expense" => k,
            _ if row.amount < 0.0 => "expense".to_string(),
            _ => "income".to_string(),
        };
        if row.amount < 0.0 {
            flipped += 1;
        }
        let date = row.date.unwrap_or_else(|| {
            warn!(id = row.id, "Unreadable legacy date, storing the Unix epoch");
            0
        });
        insert.execute(rusqlite::params![
            row.id,
            row.amount.abs(),
            kind,
            row.category.as_deref().unwrap_or_default(),
            date,
            row.note,
        ])?;
    }
    drop(insert);

    tx.execute("DROP TABLE transactions", [])?;
    tx.execute("ALTER TABLE transactions_rebuilt RENAME TO transactions", [])?;

    info!(rows = rows.len(), flipped, "Rebuilt transactions table");
    Ok(())
}

struct LegacyRow {
    id: i64,
    amount: f64,
    kind: Option<String>,
    category: Option<String>,
    date: Option<i64>,
    note: Option<String>,
}

fn index_by_date(tx: &SqlTransaction) -> rusqlite::Result<()> {
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)",
        [],
    )?;
    Ok(())
}

fn table_columns(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('transactions')")?;
    let names = stmt.query_map([], |row| row.get(0))?;
    names.collect()
}
