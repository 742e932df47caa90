use super::migrations::run_migrations;
use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use tracing::{info, warn};

/// Opens (creating if needed) the database file and brings its schema up to
/// date. The returned handle is meant to live for the whole session and be
/// passed by reference to every store operation.
pub fn establish_connection(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(path)?;
    let version = run_migrations(&mut conn)?;
    info!(path = %path.display(), schema_version = version, "Opened transaction database");
    Ok(conn)
}

/// Releases the native handle. Dropping the connection does the same but
/// swallows errors; this reports them.
pub fn close_connection(conn: Connection) -> Result<()> {
    conn.close().map_err(|(_, e)| {
        warn!(error = %e, "Failed to close transaction database");
        e.into()
    })
}

#[cfg(test)]
pub fn establish_test_connection() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    run_migrations(&mut conn)?;
    Ok(conn)
}
