//! Per-session step state machine.
//!
//! A [`SessionRunner`] exclusively owns one [`Session`]. All mutation happens
//! under its lock; readers get deep copies. Each time a step goes from idle
//! or paused to running it gets a fresh activation token and its own timer
//! task, so a pause can only ever cancel the run it was issued for.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::event::{EventQueue, EventStream, StepEvent};
use crate::domain::{Session, SessionStatus, StepState};
use crate::error::HoundError;

/// One run of a step, from start/resume until pause or completion.
struct Activation {
    token: CancellationToken,
    resumed_at: Instant,
}

/// Runtime bookkeeping for one step.
#[derive(Default)]
struct StepControl {
    activation: Option<Activation>,
    elapsed: Duration,
}

impl StepControl {
    fn total_elapsed(&self) -> Duration {
        self.activation
            .as_ref()
            .map_or(self.elapsed, |a| self.elapsed + a.resumed_at.elapsed())
    }

    /// Cancel the current activation and bank its running time.
    fn pause(&mut self) -> Option<Duration> {
        let activation = self.activation.take()?;
        activation.token.cancel();
        self.elapsed += activation.resumed_at.elapsed();
        Some(self.elapsed)
    }
}

struct RunnerState {
    session: Session,
    controls: Vec<StepControl>,
    /// Set by an explicit `complete`.
    finalized: bool,
}

impl RunnerState {
    fn pause_all(&mut self) {
        for (step, control) in self.session.steps.iter_mut().zip(&mut self.controls) {
            if let Some(elapsed) = control.pause() {
                step.elapsed_so_far = elapsed.as_secs();
                step.state = StepState::Paused;
            }
        }
    }
}

/// Owner and driver of one live session.
pub struct SessionRunner {
    id: String,
    state: Mutex<RunnerState>,
    /// Whole-session context; cancelled by `stop`.
    cancel: CancellationToken,
    events: EventQueue,
    tick_interval: Duration,
    runtime: Handle,
}

impl SessionRunner {
    /// Take ownership of `session`. Step timers are spawned on `runtime`.
    #[must_use]
    pub fn new(session: Session, tick_interval: Duration, runtime: Handle) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let events = EventQueue::new(session.steps.len() + 1, cancel.clone());
        let controls = session
            .steps
            .iter()
            .map(|s| StepControl {
                activation: None,
                elapsed: Duration::from_secs(s.elapsed_so_far),
            })
            .collect();

        Arc::new(Self {
            id: session.id.clone(),
            state: Mutex::new(RunnerState {
                session,
                controls,
                finalized: false,
            }),
            cancel,
            events,
            tick_interval,
            runtime,
        })
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of steps in the plan.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.lock().session.steps.len()
    }

    /// Whether the session has been finalized, and when it began.
    #[must_use]
    pub fn completion(&self) -> (bool, DateTime<Utc>) {
        let state = self.lock();
        (state.session.completed, state.session.started_at)
    }

    /// Start or resume a step.
    ///
    /// # Errors
    ///
    /// - [`HoundError::SessionStopped`] after `stop`
    /// - [`HoundError::SessionCompleted`] after an explicit `complete`
    /// - [`HoundError::InvalidStep`] if `index` is out of range
    /// - [`HoundError::StepCompleted`] if the step already finished
    /// - [`HoundError::StepAlreadyRunning`] if the step is running
    pub fn start_step(self: &Arc<Self>, index: usize) -> Result<(), HoundError> {
        let (token, resumed_at, banked, duration) = {
            let mut state = self.lock();
            if self.cancel.is_cancelled() {
                return Err(HoundError::SessionStopped(self.id.clone()));
            }
            if state.finalized {
                return Err(HoundError::SessionCompleted(self.id.clone()));
            }

            let RunnerState {
                session, controls, ..
            } = &mut *state;
            let len = session.steps.len();
            let (Some(step), Some(control)) =
                (session.steps.get_mut(index), controls.get_mut(index))
            else {
                return Err(HoundError::InvalidStep {
                    index: i64::try_from(index).unwrap_or(i64::MAX),
                    len,
                });
            };

            if step.completed {
                return Err(HoundError::StepCompleted(index));
            }
            if control.activation.is_some() {
                return Err(HoundError::StepAlreadyRunning(index));
            }

            let token = CancellationToken::new();
            let resumed_at = Instant::now();
            control.activation = Some(Activation {
                token: token.clone(),
                resumed_at,
            });

            if step.started_at.is_none() {
                step.started_at = Some(Utc::now());
            }
            step.state = StepState::Running;
            session.current_index = Some(index);

            (token, resumed_at, control.elapsed, step.duration)
        };

        debug!(
            session = %self.id,
            step = index,
            banked_secs = banked.as_secs(),
            "step started"
        );

        let runner = Arc::clone(self);
        self.runtime.spawn(async move {
            runner
                .drive_step(index, token, resumed_at, banked, duration)
                .await;
        });

        Ok(())
    }

    /// Pause a running step, keeping its elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::InvalidStep`] if `index` is out of range and
    /// [`HoundError::StepNotRunning`] if the step has no active run.
    pub fn stop_step(&self, index: usize) -> Result<(), HoundError> {
        let mut state = self.lock();
        let RunnerState {
            session, controls, ..
        } = &mut *state;
        let len = session.steps.len();
        let (Some(step), Some(control)) = (session.steps.get_mut(index), controls.get_mut(index))
        else {
            return Err(HoundError::InvalidStep {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                len,
            });
        };

        let elapsed = control
            .pause()
            .ok_or(HoundError::StepNotRunning(index))?;
        step.elapsed_so_far = elapsed.as_secs();
        step.state = StepState::Paused;

        debug!(session = %self.id, step = index, elapsed_secs = step.elapsed_so_far, "step paused");
        Ok(())
    }

    /// Stop the whole session.
    ///
    /// Any running step timer exits without completing its step and every
    /// event stream ends. `completed` is left untouched.
    pub fn stop(&self) {
        {
            let mut state = self.lock();
            self.cancel.cancel();
            state.pause_all();
        }
        info!(session = %self.id, "session stopped");
    }

    /// Finalize the session without waiting for its steps.
    ///
    /// Running steps are paused and event streams receive `SessionDone`.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionStopped`] if the session was stopped.
    pub fn complete(&self) -> Result<Session, HoundError> {
        let snapshot = {
            let mut state = self.lock();
            if self.cancel.is_cancelled() {
                return Err(HoundError::SessionStopped(self.id.clone()));
            }
            state.pause_all();
            state.finalized = true;
            state.session.completed = true;
            state.session.clone()
        };
        self.events.finish();

        info!(
            session = %self.id,
            completed_steps = snapshot.completed_steps(),
            "session completed explicitly"
        );
        Ok(snapshot)
    }

    /// Independent copy of the session.
    ///
    /// Running steps report their live elapsed time.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        let state = self.lock();
        let mut session = state.session.clone();
        for (step, control) in session.steps.iter_mut().zip(&state.controls) {
            if control.activation.is_some() {
                step.elapsed_so_far = control.total_elapsed().as_secs();
            }
        }
        session
    }

    /// Status summary.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock().session.status()
    }

    /// Subscribe to this session's events.
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Timer loop for one activation.
    async fn drive_step(
        self: Arc<Self>,
        index: usize,
        activation: CancellationToken,
        resumed_at: Instant,
        banked: Duration,
        duration: u64,
    ) {
        let mut ticker = time::interval_at(resumed_at + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!(session = %self.id, step = index, "step timer cancelled with session");
                    return;
                }
                () = activation.cancelled() => {
                    debug!(session = %self.id, step = index, "step timer cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let elapsed = banked + resumed_at.elapsed();
            let elapsed_secs = elapsed.as_secs();

            if elapsed_secs < duration {
                self.events.publish(StepEvent::Tick {
                    index,
                    elapsed: elapsed_secs,
                    duration,
                    completed: false,
                });
                continue;
            }

            let Some(session_done) = self.complete_step(index, &activation, elapsed) else {
                return;
            };

            self.events.publish(StepEvent::Tick {
                index,
                elapsed: elapsed_secs,
                duration,
                completed: true,
            });
            debug!(session = %self.id, step = index, "step completed");

            if session_done {
                self.events.finish();
                info!(session = %self.id, "all steps completed");
            }
            return;
        }
    }

    /// Mark a step completed unless its activation was cancelled meanwhile.
    ///
    /// Returns whether this completion finished the session, or `None` if the
    /// activation is stale.
    fn complete_step(
        &self,
        index: usize,
        activation: &CancellationToken,
        elapsed: Duration,
    ) -> Option<bool> {
        let mut state = self.lock();
        if activation.is_cancelled() || self.cancel.is_cancelled() {
            return None;
        }

        let RunnerState {
            session, controls, ..
        } = &mut *state;
        let control = controls.get_mut(index)?;
        let step = session.steps.get_mut(index)?;

        control.activation = None;
        control.elapsed = elapsed;
        step.completed = true;
        step.state = StepState::Completed;
        step.elapsed_so_far = elapsed.as_secs();

        if session.completed || !session.all_steps_completed() {
            return Some(false);
        }
        session.completed = true;
        Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Step;

    fn runner(durations: &[u64]) -> Arc<SessionRunner> {
        let steps = durations
            .iter()
            .enumerate()
            .map(|(i, d)| Step::new(i, *d))
            .collect();
        let target = *durations.last().unwrap();
        let session = Session::new("test-session", "tester", target, steps).unwrap();
        SessionRunner::new(session, Duration::from_secs(1), Handle::current())
    }

    /// Read events until the completion tick for `index`.
    async fn wait_step_completed(stream: &mut EventStream, index: usize) -> u64 {
        loop {
            match stream.next().await {
                Some(StepEvent::Tick {
                    index: i,
                    elapsed,
                    completed: true,
                    ..
                }) if i == index => return elapsed,
                Some(StepEvent::Tick { .. }) => {}
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_steps_run_to_completion() {
        let runner = runner(&[1, 1]);
        let mut stream = runner.events();

        runner.start_step(0).unwrap();
        assert_eq!(
            stream.next().await,
            Some(StepEvent::Tick {
                index: 0,
                elapsed: 1,
                duration: 1,
                completed: true
            })
        );
        assert!(!runner.snapshot().completed);

        runner.start_step(1).unwrap();
        assert_eq!(
            stream.next().await,
            Some(StepEvent::Tick {
                index: 1,
                elapsed: 1,
                duration: 1,
                completed: true
            })
        );
        assert_eq!(stream.next().await, Some(StepEvent::SessionDone));
        assert_eq!(stream.next().await, None);

        let session = runner.snapshot();
        assert!(session.completed);
        assert!(session.all_steps_completed());
        assert_eq!(session.current_index, Some(1));
        assert!(session.steps.iter().all(|s| s.state == StepState::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_ticks() {
        let runner = runner(&[3]);
        let mut stream = runner.events();

        runner.start_step(0).unwrap();
        for expected in 1..3 {
            assert_eq!(
                stream.next().await,
                Some(StepEvent::Tick {
                    index: 0,
                    elapsed: expected,
                    duration: 3,
                    completed: false
                })
            );
        }
        assert_eq!(wait_step_completed(&mut stream, 0).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_preserves_elapsed_and_resume_completes_once() {
        let runner = runner(&[10]);
        let mut stream = runner.events();

        runner.start_step(0).unwrap();
        time::sleep(Duration::from_millis(3500)).await;
        runner.stop_step(0).unwrap();

        let paused = runner.snapshot();
        let step = &paused.steps[0];
        assert!(!step.completed);
        assert_eq!(step.state, StepState::Paused);
        assert_eq!(step.elapsed_so_far, 3);
        assert!(step.started_at.is_some());

        // Stays put while paused
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runner.snapshot().steps[0].elapsed_so_far, 3);

        runner.start_step(0).unwrap();
        let elapsed = wait_step_completed(&mut stream, 0).await;
        assert_eq!(elapsed, 10);
        assert_eq!(stream.next().await, Some(StepEvent::SessionDone));
        assert_eq!(stream.next().await, None);

        let session = runner.snapshot();
        assert!(session.steps[0].completed);
        assert!(session.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_activation_does_not_complete_resumed_run() {
        let runner = runner(&[2, 5]);
        let mut stream = runner.events();

        runner.start_step(0).unwrap();
        runner.stop_step(0).unwrap();
        runner.start_step(0).unwrap();

        assert_eq!(wait_step_completed(&mut stream, 0).await, 2);

        let session = runner.snapshot();
        assert!(session.steps[0].completed);
        assert!(!session.completed);
        assert_eq!(runner.stop_step(0).unwrap_err().kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_errors() {
        let runner = runner(&[1, 5]);

        assert!(matches!(
            runner.start_step(2),
            Err(HoundError::InvalidStep { index: 2, len: 2 })
        ));
        assert!(matches!(
            runner.stop_step(9),
            Err(HoundError::InvalidStep { index: 9, len: 2 })
        ));
        assert!(matches!(runner.stop_step(1), Err(HoundError::StepNotRunning(1))));

        runner.start_step(1).unwrap();
        assert!(matches!(
            runner.start_step(1),
            Err(HoundError::StepAlreadyRunning(1))
        ));

        runner.stop_step(1).unwrap();
        assert!(matches!(runner.stop_step(1), Err(HoundError::StepNotRunning(1))));

        let mut stream = runner.events();
        runner.start_step(0).unwrap();
        wait_step_completed(&mut stream, 0).await;
        assert!(matches!(runner.start_step(0), Err(HoundError::StepCompleted(0))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_completed_false() {
        let runner = runner(&[1, 10]);
        let mut stream = runner.events();

        runner.start_step(0).unwrap();
        wait_step_completed(&mut stream, 0).await;
        runner.start_step(1).unwrap();
        time::sleep(Duration::from_millis(2500)).await;

        runner.stop();
        assert_eq!(stream.next().await, None);

        let session = runner.snapshot();
        assert!(!session.completed);
        assert!(session.steps[0].completed);
        assert!(!session.steps[1].completed);
        assert_eq!(session.steps[1].state, StepState::Paused);
        assert_eq!(session.steps[1].elapsed_so_far, 2);

        // Timer is gone: nothing completes later
        time::sleep(Duration::from_secs(20)).await;
        assert!(!runner.snapshot().steps[1].completed);

        assert!(matches!(
            runner.start_step(1),
            Err(HoundError::SessionStopped(_))
        ));
        assert!(matches!(runner.complete(), Err(HoundError::SessionStopped(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_pauses_running_step() {
        let runner = runner(&[5, 30]);
        let mut stream = runner.events();

        runner.start_step(0).unwrap();
        time::sleep(Duration::from_millis(1500)).await;

        let finalized = runner.complete().unwrap();
        assert!(finalized.completed);
        assert!(!finalized.steps[0].completed);
        assert_eq!(finalized.steps[0].state, StepState::Paused);
        assert_eq!(finalized.steps[0].elapsed_so_far, 1);

        loop {
            match stream.next().await {
                Some(StepEvent::SessionDone) => break,
                Some(StepEvent::Tick { completed, .. }) => assert!(!completed),
                None => panic!("stream closed before SessionDone"),
            }
        }
        assert!(matches!(
            runner.start_step(1),
            Err(HoundError::SessionCompleted(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_independent() {
        let runner = runner(&[4]);
        runner.start_step(0).unwrap();
        time::sleep(Duration::from_millis(2500)).await;

        let mut copy = runner.snapshot();
        assert_eq!(copy.steps[0].elapsed_so_far, 2);
        assert_eq!(copy.steps[0].state, StepState::Running);

        copy.completed = true;
        copy.steps[0].completed = true;

        let fresh = runner.snapshot();
        assert!(!fresh.completed);
        assert!(!fresh.steps[0].completed);
        assert_eq!(runner.status().current_step, Some(0));
    }
}
