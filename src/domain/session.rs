//! Interval session and step types.
//!
//! These are plain values. The live copy of a session is owned by its
//! runner; everything handed out to callers is a snapshot of these types.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan;
use crate::error::HoundError;

/// Lifecycle state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    /// Never started.
    #[default]
    Idle,
    /// Timer is counting.
    Running,
    /// Started at least once, currently stopped.
    Paused,
    /// Ran for its full duration. Terminal.
    Completed,
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

/// One timed interval within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Position in the plan (0-based)
    pub index: usize,
    /// Planned length in seconds
    pub duration: u64,
    /// First activation time
    pub started_at: Option<DateTime<Utc>>,
    /// Set once the step has run for its full duration
    pub completed: bool,
    /// Seconds run so far, summed across activations
    pub elapsed_so_far: u64,
    /// State at the time this value was taken
    pub state: StepState,
}

impl Step {
    /// Create an idle step.
    #[must_use]
    pub const fn new(index: usize, duration: u64) -> Self {
        Self {
            index,
            duration,
            started_at: None,
            completed: false,
            elapsed_so_far: 0,
            state: StepState::Idle,
        }
    }

    /// Whether this step is a warmup (anything but the last step of its plan).
    #[must_use]
    pub const fn is_warmup(&self, step_count: usize) -> bool {
        self.index + 1 < step_count
    }
}

/// One interval workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique, externally visible id
    pub id: String,
    /// Opaque owner id (empty when anonymous)
    pub user_id: String,
    /// Length of the final step in seconds
    pub target_sec: u64,
    /// Ordered plan; index-stable
    pub steps: Vec<Step>,
    /// Last step that was started
    pub current_index: Option<usize>,
    /// Creation time
    pub started_at: DateTime<Utc>,
    /// Set when every step completed or the session was explicitly finalized
    pub completed: bool,
}

impl Session {
    /// Create a session from an existing plan.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::InvalidDuration`] for a zero target and
    /// [`HoundError::InvalidPlan`] if the plan is empty, mis-indexed, contains
    /// a zero-length step, or does not end with a step of `target_sec`.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        target_sec: u64,
        steps: Vec<Step>,
    ) -> Result<Self, HoundError> {
        if target_sec == 0 {
            return Err(HoundError::InvalidDuration(0));
        }

        let Some(last) = steps.last() else {
            return Err(HoundError::InvalidPlan("plan has no steps".to_string()));
        };
        if last.duration != target_sec {
            return Err(HoundError::InvalidPlan(format!(
                "final step lasts {}s, target is {target_sec}s",
                last.duration
            )));
        }
        if let Some((pos, step)) = steps.iter().enumerate().find(|(i, s)| s.index != *i) {
            return Err(HoundError::InvalidPlan(format!(
                "step at position {pos} has index {}",
                step.index
            )));
        }
        if let Some(step) = steps.iter().find(|s| s.duration == 0) {
            return Err(HoundError::InvalidPlan(format!(
                "step {} has zero duration",
                step.index
            )));
        }

        Ok(Self {
            id: id.into(),
            user_id: user_id.into(),
            target_sec,
            steps,
            current_index: None,
            started_at: Utc::now(),
            completed: false,
        })
    }

    /// Plan a fresh session for `target_sec`.
    ///
    /// A random id is generated when `id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::InvalidDuration`] if `target_sec` is not positive.
    pub fn planned<R: Rng + ?Sized>(
        target_sec: i64,
        id: Option<String>,
        user_id: Option<String>,
        rng: &mut R,
    ) -> Result<Self, HoundError> {
        let steps = plan::generate(target_sec, rng)?;
        let target = steps.last().map_or(0, |s| s.duration);
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

        Self::new(id, user_id.unwrap_or_default(), target, steps)
    }

    /// Whether every step has run to completion.
    #[must_use]
    pub fn all_steps_completed(&self) -> bool {
        self.steps.iter().all(|s| s.completed)
    }

    /// Number of completed steps.
    #[must_use]
    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }

    /// Lightweight status view.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id.clone(),
            completed: self.completed,
            current_step: self.current_index,
        }
    }
}

/// Status summary of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: String,
    pub completed: bool,
    pub current_step: Option<usize>,
}
