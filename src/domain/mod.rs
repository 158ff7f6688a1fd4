//! Interval session domain.
//!
//! - Sessions and steps
//! - Step plan generation
//! - Duration parsing and formatting

pub mod duration;
pub mod plan;
pub mod session;

pub use duration::{format_clock, format_duration, parse_duration, render_progress_bar};
pub use plan::{generate, max_warmup_duration, warmup_step_count};
pub use session::{Session, SessionStatus, Step, StepState};
