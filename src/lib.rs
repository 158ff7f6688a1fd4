//! hound - interval training sessions with pausable steps
//!
//! A session is a generated plan of short warmup steps ending in one step
//! of the target length. [`runner::SessionRegistry`] keeps live sessions,
//! each driven by its own [`runner::SessionRunner`], and finished sessions
//! are stored through [`storage::SessionRepository`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod output;
pub mod runner;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use domain::{Session, SessionStatus, Step, StepState};
pub use error::{ErrorKind, HoundError};
pub use runner::{EventStream, SessionRegistry, SessionRunner, StepEvent};
