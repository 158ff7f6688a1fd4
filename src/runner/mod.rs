//! Live session execution.
//!
//! - [`SessionRegistry`] maps session ids to runners and evicts finished
//!   sessions in the background.
//! - [`SessionRunner`] owns one session and drives its step timers.
//! - [`EventStream`] delivers progress ticks and the terminal
//!   [`StepEvent::SessionDone`].

mod event;
mod registry;
mod session_runner;

pub use event::{EventStream, StepEvent};
pub use registry::SessionRegistry;
pub use session_runner::SessionRunner;
