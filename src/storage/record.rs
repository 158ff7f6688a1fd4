//! Persisted form of finished sessions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Session;
use crate::error::HoundError;

/// How the trainee rated a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SuccessLevel {
    Fail,
    #[default]
    Ok,
    Great,
}

impl SuccessLevel {
    /// Database and display form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Ok => "ok",
            Self::Great => "great",
        }
    }
}

impl fmt::Display for SuccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuccessLevel {
    type Err = HoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "ok" => Ok(Self::Ok),
            "great" => Ok(Self::Great),
            other => Err(HoundError::InvalidArgument(format!(
                "unknown success level '{other}' (expected fail, ok or great)"
            ))),
        }
    }
}

/// Outcome of one step of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    /// Planned seconds
    pub duration: u64,
    /// Seconds actually run, pauses excluded
    pub actual_sec: u64,
    pub completed: bool,
}

/// A finished session as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub target_sec: u64,
    pub success: SuccessLevel,
    pub comment: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
}

impl SessionRecord {
    /// Build a record from a finalized session snapshot.
    #[must_use]
    pub fn from_session(
        session: &Session,
        success: SuccessLevel,
        comment: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let steps = session
            .steps
            .iter()
            .map(|step| StepRecord {
                index: step.index,
                duration: step.duration,
                actual_sec: step.elapsed_so_far,
                completed: step.completed,
            })
            .collect();

        Self {
            id: session.id.clone(),
            user_id: session.user_id.clone(),
            target_sec: session.target_sec,
            success,
            comment: comment.into(),
            started_at: session.started_at,
            completed_at,
            steps,
        }
    }

    /// Seconds actually trained across all steps.
    #[must_use]
    pub fn actual_total(&self) -> u64 {
        self.steps.iter().map(|s| s.actual_sec).sum()
    }

    /// Number of steps that ran to completion.
    #[must_use]
    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }
}
