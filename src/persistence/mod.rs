//! Persistence - SQLite gallery storage and JSON run reports

mod database;
pub mod report;

pub use database::Database;
