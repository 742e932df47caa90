//! Income and expense tracking over a local SQLite database.
//!
//! Open a handle with [`db::connection::establish_connection`] once per
//! session and pass it to the functions in [`db::repository`],
//! [`db::summary`] and [`operations`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod operations;

pub use error::{Error, Result};
