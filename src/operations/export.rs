use crate::config::ExportConfig;
use crate::db::repository;
use crate::error::{Error, Result};
use crate::models::transaction::Transaction;
use chrono::Local;
use rusqlite::Connection;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const EXPORT_HEADER: [&str; 6] = ["ID", "Type", "Category", "Amount", "Date", "Note"];
const FILE_PREFIX: &str = "expense_tracker_export_";
/// How many `_N` suffixes to try when the timestamped name is already taken.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Something that should be told about newly exported files so other
/// programs can find them (on a phone, the media index).
pub trait FileIndex {
    fn register(&self, path: &Path) -> Result<()>;
}

/// Records exported files in the log.
pub struct LogFileIndex;

impl FileIndex for LogFileIndex {
    fn register(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Export available");
        Ok(())
    }
}

/// Writes every transaction to a new timestamped CSV file in the configured
/// export directory and returns its path.
///
/// Fails with [`Error::NothingToExport`] without creating a file when the
/// store is empty.
pub fn export_all(conn: &Connection, config: &ExportConfig, index: &dyn FileIndex) -> Result<PathBuf> {
    let transactions = repository::get_all_transactions(conn)?;
    if transactions.is_empty() {
        return Err(Error::NothingToExport);
    }

    fs::create_dir_all(&config.directory)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let (path, file) = create_export_file(&config.directory, &stamp)?;

    if let Err(e) = write_file(file, &transactions) {
        if fs::remove_file(&path).is_err() {
            warn!(path = %path.display(), "Could not remove partial export");
        }
        return Err(e);
    }

    info!(path = %path.display(), rows = transactions.len(), "Exported transactions");
    index.register(&path)?;
    Ok(path)
}

/// Creates `<prefix><stamp>.csv`, or `<prefix><stamp>_N.csv` when earlier
/// names exist. An existing file is never opened.
fn create_export_file(directory: &Path, stamp: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let file_name = match attempt {
            0 => format!("{}{}.csv", FILE_PREFIX, stamp),
            n => format!("{}{}_{}.csv", FILE_PREFIX, stamp, n),
        };
        let path = directory.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free export file name for {}", stamp),
    )))
}

fn write_file(mut file: File, transactions: &[Transaction]) -> Result<()> {
    write_csv(&mut file, transactions)?;
    file.sync_all()?;
    Ok(())
}

/// Serializes transactions with a header row. Fields holding a comma, quote
/// or line break are quoted, with inner quotes doubled.
pub fn write_csv<W: Write>(writer: W, transactions: &[Transaction]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    writer.write_record(EXPORT_HEADER)?;
    for transaction in transactions {
        writer.write_record([
            transaction.id.to_string(),
            transaction.kind.to_string(),
            transaction.category.clone(),
            format!("{:.2}", transaction.amount),
            transaction.calendar_date().format("%Y-%m-%d").to_string(),
            transaction.note.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
