//! Storage layer for hound.
//!
//! Finished sessions are kept in a local `SQLite` database; live sessions
//! never touch it.

mod database;
mod migrations;
mod record;
mod repository;

pub use database::Database;
pub use record::{SessionRecord, StepRecord, SuccessLevel};
#[cfg(test)]
pub use repository::MockSessionRepository;
pub use repository::{SessionRepository, SessionStats, SqliteRepository};
