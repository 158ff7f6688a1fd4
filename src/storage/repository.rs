//! Session history storage.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::record::{SessionRecord, StepRecord};
use super::Database;
use crate::error::HoundError;

/// Aggregates over a user's finished sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    /// Sessions rated `ok` or `great`
    pub successful_count: u64,
    /// Mean target in seconds
    pub average_target: f64,
    /// Sum of targets in seconds
    pub total_train_time: u64,
    /// Percentage of successful sessions
    pub success_rate: f64,
}

/// Persistence for finished sessions.
#[cfg_attr(test, mockall::automock)]
pub trait SessionRepository {
    /// Store a finished session.
    ///
    /// # Errors
    ///
    /// Fails if a session with the same id was already saved.
    fn save_session(&self, record: &SessionRecord) -> Result<(), HoundError>;

    /// All sessions of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn sessions_by_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, HoundError>;

    /// Sessions of a user completed at or after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn recent_sessions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, HoundError>;

    /// Aggregate statistics for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn session_stats(&self, user_id: &str) -> Result<SessionStats, HoundError>;
}

/// [`SessionRepository`] backed by the local `SQLite` database.
pub struct SqliteRepository {
    db: Database,
}

const SELECT_SESSIONS: &str = r"SELECT id, user_id, target_sec, success, comment,
                                       started_at, completed_at, steps_json
                                FROM sessions";

impl SqliteRepository {
    /// Create storage with an existing database connection.
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }

    fn query(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<SessionRecord>, HoundError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| HoundError::Database(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params, row_to_record)
            .map_err(|e| HoundError::Database(format!("Failed to query sessions: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

impl SessionRepository for SqliteRepository {
    fn save_session(&self, record: &SessionRecord) -> Result<(), HoundError> {
        let steps_json = serde_json::to_string(&record.steps)?;

        self.db
            .connection()
            .execute(
                r"INSERT INTO sessions
                  (id, user_id, target_sec, success, comment, started_at, completed_at, steps_json)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.user_id,
                    record.target_sec,
                    record.success.as_str(),
                    record.comment,
                    encode_time(record.started_at),
                    encode_time(record.completed_at),
                    steps_json,
                ],
            )
            .map_err(|e| HoundError::Database(format!("Failed to save session {}: {e}", record.id)))?;

        Ok(())
    }

    fn sessions_by_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, HoundError> {
        self.query(
            &format!("{SELECT_SESSIONS} WHERE user_id = ?1 ORDER BY completed_at DESC"),
            &[&user_id],
        )
    }

    fn recent_sessions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, HoundError> {
        self.query(
            &format!(
                "{SELECT_SESSIONS} WHERE user_id = ?1 AND completed_at >= ?2 \
                 ORDER BY completed_at DESC"
            ),
            &[&user_id, &encode_time(since)],
        )
    }

    #[allow(clippy::cast_precision_loss)]
    fn session_stats(&self, user_id: &str) -> Result<SessionStats, HoundError> {
        let (total_sessions, successful_count, average_target, total_train_time) = self
            .db
            .connection()
            .query_row(
                r"SELECT COUNT(*),
                         COALESCE(SUM(CASE WHEN success IN ('ok', 'great') THEN 1 ELSE 0 END), 0),
                         AVG(target_sec),
                         COALESCE(SUM(target_sec), 0)
                  FROM sessions
                  WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, u64>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, u64>(3)?,
                    ))
                },
            )
            .map_err(|e| HoundError::Database(format!("Failed to query stats: {e}")))?;

        let success_rate = if total_sessions > 0 {
            successful_count as f64 / total_sessions as f64 * 100.0
        } else {
            0.0
        };

        Ok(SessionStats {
            total_sessions,
            successful_count,
            average_target: average_target.unwrap_or(0.0),
            total_train_time,
            success_rate,
        })
    }
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_time(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> Result<SessionRecord, rusqlite::Error> {
    let success: String = row.get(3)?;
    let steps_json: String = row.get(7)?;

    let success = success
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let steps: Vec<StepRecord> = serde_json::from_str(&steps_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(SessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        target_sec: row.get(2)?,
        success,
        comment: row.get(4)?,
        started_at: decode_time(row, 5)?,
        completed_at: decode_time(row, 6)?,
        steps,
    })
}
