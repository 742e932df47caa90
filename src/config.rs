//! Runtime settings resolved from command-line flags and environment variables.

use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH: &str = "expense_tracker.db";
pub const DEFAULT_EXPORT_DIR: &str = "exports";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub export: ExportConfig,
}

/// Where CSV exports are written.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub directory: PathBuf,
}
