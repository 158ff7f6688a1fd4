//! Process-wide registry of live sessions.
//!
//! The registry lock only guards map membership. It is never held while a
//! runner does work, so sessions never contend with each other.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::runtime::Handle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::event::EventStream;
use super::session_runner::SessionRunner;
use crate::config::RuntimeConfig;
use crate::domain::{Session, SessionStatus};
use crate::error::HoundError;

struct RegistryInner {
    sessions: Mutex<HashMap<String, Arc<SessionRunner>>>,
    rng: Mutex<StdRng>,
    config: RuntimeConfig,
    runtime: Handle,
}

impl RegistryInner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionRunner>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn runner(&self, id: &str) -> Result<Arc<SessionRunner>, HoundError> {
        self.sessions()
            .get(id)
            .cloned()
            .ok_or_else(|| HoundError::SessionNotFound(id.to_string()))
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.config.retention()) else {
            return 0;
        };

        let candidates: Vec<Arc<SessionRunner>> = self.sessions().values().cloned().collect();
        let expired: Vec<Arc<SessionRunner>> = candidates
            .into_iter()
            .filter(|runner| {
                let (completed, started_at) = runner.completion();
                completed && started_at <= cutoff
            })
            .collect();

        let evicted: Vec<Arc<SessionRunner>> = {
            let mut sessions = self.sessions();
            expired
                .into_iter()
                .filter(|runner| {
                    // Skip ids that were stopped and re-registered meanwhile
                    let unchanged = sessions
                        .get(runner.id())
                        .is_some_and(|current| Arc::ptr_eq(current, runner));
                    if unchanged {
                        sessions.remove(runner.id());
                    }
                    unchanged
                })
                .collect()
        };

        for runner in &evicted {
            runner.stop();
            debug!(session = %runner.id(), "evicted expired session");
        }
        evicted.len()
    }
}

/// Owner of every live [`SessionRunner`].
///
/// Dropping the registry stops its background sweep; sessions still held
/// elsewhere keep running until stopped.
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
    sweeper: CancellationToken,
}

impl SessionRegistry {
    /// Create a registry and start its sweep task on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::Internal`] when called outside a Tokio runtime.
    pub fn new(config: RuntimeConfig) -> Result<Self, HoundError> {
        let runtime = Handle::try_current()
            .map_err(|e| HoundError::Internal(format!("no async runtime available: {e}")))?;

        let rng = config
            .plan_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        let inner = Arc::new(RegistryInner {
            sessions: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
            config,
            runtime,
        });

        let sweeper = CancellationToken::new();
        Self::spawn_sweeper(&inner, sweeper.clone());

        Ok(Self { inner, sweeper })
    }

    fn spawn_sweeper(inner: &Arc<RegistryInner>, shutdown: CancellationToken) {
        let period = inner.config.sweep_interval();
        let registry: Weak<RegistryInner> = Arc::downgrade(inner);

        inner.runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = registry.upgrade() else { break };
                        let evicted = inner.sweep_expired(Utc::now());
                        if evicted > 0 {
                            info!(evicted, "swept expired sessions");
                        }
                    }
                }
            }
            debug!("session sweeper stopped");
        });
    }

    /// Plan and register a new session.
    ///
    /// A random id is generated when `id` is `None` or empty.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::InvalidDuration`] for a non-positive target and
    /// [`HoundError::SessionExists`] if the id is taken.
    pub fn start_session(
        &self,
        target_sec: i64,
        id: Option<String>,
        user_id: Option<String>,
    ) -> Result<Session, HoundError> {
        let id = id.filter(|id| !id.is_empty());
        let session = {
            let mut rng = self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner);
            Session::planned(target_sec, id, user_id, &mut *rng)?
        };
        self.register(session)
    }

    /// Register a session with an existing plan.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionExists`] if the id is taken.
    pub fn register(&self, session: Session) -> Result<Session, HoundError> {
        let tick_interval = self.inner.config.tick_interval();
        let snapshot = {
            let mut sessions = self.inner.sessions();
            match sessions.entry(session.id.clone()) {
                Entry::Occupied(_) => return Err(HoundError::SessionExists(session.id)),
                Entry::Vacant(slot) => {
                    let snapshot = session.clone();
                    slot.insert(SessionRunner::new(
                        session,
                        tick_interval,
                        self.inner.runtime.clone(),
                    ));
                    snapshot
                }
            }
        };

        info!(
            session = %snapshot.id,
            user = %snapshot.user_id,
            target_sec = snapshot.target_sec,
            steps = snapshot.steps.len(),
            "session started"
        );
        Ok(snapshot)
    }

    /// Snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionNotFound`] for an unknown id.
    pub fn get_session(&self, id: &str) -> Result<Session, HoundError> {
        Ok(self.inner.runner(id)?.snapshot())
    }

    /// Status summary of a session.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionNotFound`] for an unknown id.
    pub fn status(&self, id: &str) -> Result<SessionStatus, HoundError> {
        Ok(self.inner.runner(id)?.status())
    }

    /// Subscribe to a session's events.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionNotFound`] for an unknown id.
    pub fn events(&self, id: &str) -> Result<EventStream, HoundError> {
        Ok(self.inner.runner(id)?.events())
    }

    /// Stop a session and remove it from the registry.
    ///
    /// Returns the final snapshot; `completed` is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionNotFound`] for an unknown id.
    pub fn stop_session(&self, id: &str) -> Result<Session, HoundError> {
        let runner = self
            .inner
            .sessions()
            .remove(id)
            .ok_or_else(|| HoundError::SessionNotFound(id.to_string()))?;
        runner.stop();
        Ok(runner.snapshot())
    }

    /// Start or resume a step.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionNotFound`], [`HoundError::InvalidStep`],
    /// or any error of [`SessionRunner::start_step`].
    pub fn start_step(&self, id: &str, index: i64) -> Result<(), HoundError> {
        let runner = self.inner.runner(id)?;
        let index = checked_index(index, runner.step_count())?;
        runner.start_step(index)
    }

    /// Pause a running step.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionNotFound`], [`HoundError::InvalidStep`],
    /// or [`HoundError::StepNotRunning`].
    pub fn stop_step(&self, id: &str, index: i64) -> Result<(), HoundError> {
        let runner = self.inner.runner(id)?;
        let index = checked_index(index, runner.step_count())?;
        runner.stop_step(index)
    }

    /// Finalize a session, pausing any running step.
    ///
    /// The session stays registered until swept or stopped.
    ///
    /// # Errors
    ///
    /// Returns [`HoundError::SessionNotFound`] for an unknown id.
    pub fn complete_session(&self, id: &str) -> Result<Session, HoundError> {
        self.inner.runner(id)?.complete()
    }

    /// Evict completed sessions that started before `now - retention`.
    ///
    /// Returns the number of sessions evicted.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        self.inner.sweep_expired(now)
    }

    /// Ids of all live sessions, sorted.
    #[must_use]
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions().len()
    }

    /// Whether no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.sessions().is_empty()
    }

    /// Stop the sweep task and every live session.
    pub fn shutdown(&self) {
        self.sweeper.cancel();
        let runners: Vec<Arc<SessionRunner>> =
            self.inner.sessions().drain().map(|(_, r)| r).collect();
        for runner in &runners {
            runner.stop();
        }
        info!(stopped = runners.len(), "session registry shut down");
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.sweeper.cancel();
    }
}

fn checked_index(index: i64, len: usize) -> Result<usize, HoundError> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or(HoundError::InvalidStep { index, len })
}
