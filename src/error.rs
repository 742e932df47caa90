use thiserror::Error;

/// Errors produced by the transaction store and the operations built on it.
///
/// A missing id on update or delete is not an error: those operations report
/// `Ok(false)` instead.
#[derive(Debug, Error)]
pub enum Error {
    /// User input that was rejected before reaching the database.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date '{0}'. Use YYYY-MM-DD or DD/MM/YYYY.")]
    InvalidDate(String),

    #[error("Start date must not be after end date.")]
    InvalidDateRange,

    /// A stored row that cannot be turned into a transaction.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The database was written by a newer version of the app.
    #[error("Database schema version {0} is newer than this program supports.")]
    UnsupportedSchema(u32),

    #[error("There are no transactions to export.")]
    NothingToExport,

    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::FromSqlConversionFailure(column, _, inner) => {
                Error::CorruptRecord(format!("column {}: {}", column, inner))
            }
            e => Error::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
