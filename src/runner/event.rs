//! Per-session step event stream.
//!
//! Progress ticks go through a bounded queue and are dropped when it is full;
//! they are presentation only. The end of a session is signalled separately,
//! so every stream observes [`StepEvent::SessionDone`] after draining the
//! queue, however far behind its consumer is.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Event emitted by a session runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    /// Progress of the running step. `completed` is set on the tick that
    /// finishes the step.
    Tick {
        index: usize,
        elapsed: u64,
        duration: u64,
        completed: bool,
    },
    /// Terminal sentinel: no further events will follow.
    SessionDone,
}

impl StepEvent {
    /// Whether this is the terminal sentinel.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionDone)
    }
}

/// Producer side, owned by the runner.
pub(crate) struct EventQueue {
    tx: mpsc::Sender<StepEvent>,
    rx: Arc<Mutex<mpsc::Receiver<StepEvent>>>,
    finished: CancellationToken,
    closed: CancellationToken,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` undelivered ticks.
    ///
    /// `closed` is the session's cancellation token; once it fires every
    /// stream ends.
    pub(crate) fn new(capacity: usize, closed: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            finished: CancellationToken::new(),
            closed,
        }
    }

    /// Enqueue without waiting. Returns `false` if the event was dropped.
    pub(crate) fn publish(&self, event: StepEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }

    /// Mark the session finished; streams yield `SessionDone` once drained.
    pub(crate) fn finish(&self) {
        self.finished.cancel();
    }

    pub(crate) fn subscribe(&self) -> EventStream {
        EventStream {
            rx: Arc::clone(&self.rx),
            finished: self.finished.clone(),
            closed: self.closed.clone(),
            done: false,
        }
    }
}

/// Consumer handle for a session's events.
///
/// Streams of the same session share one queue, so concurrent consumers
/// compete for ticks; each still receives its own `SessionDone`.
pub struct EventStream {
    rx: Arc<Mutex<mpsc::Receiver<StepEvent>>>,
    finished: CancellationToken,
    closed: CancellationToken,
    done: bool,
}

impl EventStream {
    /// Wait for the next event.
    ///
    /// Returns `None` once the session has been stopped, or after
    /// `SessionDone` has been delivered.
    pub async fn next(&mut self) -> Option<StepEvent> {
        if self.done {
            return None;
        }

        let event = tokio::select! {
            biased;
            () = self.closed.cancelled() => None,
            event = Self::receive(&self.rx, &self.finished) => event,
        };

        if event.map_or(true, |e| e.is_terminal()) {
            self.done = true;
        }
        event
    }

    async fn receive(
        rx: &Mutex<mpsc::Receiver<StepEvent>>,
        finished: &CancellationToken,
    ) -> Option<StepEvent> {
        let mut rx = rx.lock().await;
        tokio::select! {
            biased;
            event = rx.recv() => event,
            () = finished.cancelled() => Some(rx.try_recv().unwrap_or(StepEvent::SessionDone)),
        }
    }
}
