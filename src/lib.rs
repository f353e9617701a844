//! Local data layer for performers: bits, setlists, setlist items and shows,
//! persisted as whole JSON collections in a key-value store, with CSV backup.

pub mod app;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use db::{KeyValueStore, MemoryStore, Repository, SqliteStore};
pub use error::{AppError, Result};
