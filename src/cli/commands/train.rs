//! Interactive training command.
//!
//! Runs one session on a private runtime: steps are started in order as the
//! previous one completes, stdin lines toggle pause, and `q` or Ctrl-C
//! abandons. Progress goes to stderr so stdout only carries the result.

use std::future::Future;
use std::io::Write;

use chrono::Utc;
use serde_json::json;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use super::{open_repository, resolve_user};
use crate::cli::args::{parse_target, OutputFormat, TrainArgs};
use crate::config::{Config, Paths};
use crate::domain::{Session, StepState};
use crate::error::{ErrorKind, HoundError};
use crate::output::{
    format_abandoned_pretty, format_plan_pretty, format_progress, format_record_pretty, to_json,
};
use crate::runner::{SessionRegistry, StepEvent};
use crate::storage::{SessionRecord, SessionRepository, SuccessLevel};

/// How often the loop re-checks step progress when events are missing.
const RESYNC_PERIOD: Duration = Duration::from_secs(1);

/// How a session ended.
#[derive(Debug)]
enum Outcome {
    /// Every step ran to completion.
    Finished(Session),
    /// Stopped early by the trainee.
    Abandoned(Session),
}

/// Run a training session to the end.
///
/// # Errors
///
/// Returns an error if the target is invalid, the database cannot be opened,
/// or the finished session cannot be saved.
pub fn train(
    args: &TrainArgs,
    config: &Config,
    paths: &Paths,
    format: OutputFormat,
) -> Result<String, HoundError> {
    let target = parse_target(&args.target)?;
    let user = resolve_user(args.user.as_deref(), config);
    let repository = if args.no_save {
        None
    } else {
        Some(open_repository(config, paths)?)
    };

    let mut runtime_config = config.runtime.clone();
    if args.seed.is_some() {
        runtime_config.plan_seed = args.seed;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let outcome = runtime.block_on(async {
        let registry = SessionRegistry::new(runtime_config)?;
        let session = registry.start_session(target, args.id.clone(), Some(user))?;

        let mut progress = std::io::stderr();
        if format == OutputFormat::Pretty {
            writeln!(progress, "{}", format_plan_pretty(&session.steps))?;
            writeln!(progress, "Enter: pause/resume   q + Enter: abandon\n")?;
        }

        let input = BufReader::new(tokio::io::stdin());
        let outcome = run_session(
            &registry,
            &session.id,
            input,
            interrupted(),
            &mut progress,
            format,
        )
        .await;
        registry.shutdown();
        outcome
    });
    // Stdin reads block a worker thread; don't wait for them.
    runtime.shutdown_background();

    let repository = repository.as_ref().map(|r| r as &dyn SessionRepository);
    render_outcome(outcome?, args.success, &args.comment, repository, format)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn wire_index(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

/// Drive a registered session step by step until it finishes or is abandoned.
async fn run_session<R, S>(
    registry: &SessionRegistry,
    id: &str,
    input: R,
    shutdown: S,
    progress: &mut dyn Write,
    format: OutputFormat,
) -> Result<Outcome, HoundError>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let step_count = registry.get_session(id)?.steps.len();
    let mut events = registry.events(id)?;
    let mut lines = input.lines();
    let mut input_open = true;
    let mut current = 0;
    let mut paused = false;
    let mut resync = time::interval(RESYNC_PERIOD);
    resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    advance(registry, id, &mut current)?;

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    return abandon(registry, id);
                };
                report(progress, format, step_count, &event)?;

                match event {
                    StepEvent::Tick { .. } => advance(registry, id, &mut current)?,
                    StepEvent::SessionDone => {
                        return Ok(Outcome::Finished(registry.complete_session(id)?));
                    }
                }
            }
            _ = resync.tick() => advance(registry, id, &mut current)?,
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) if line.trim().eq_ignore_ascii_case("q") => {
                    return abandon(registry, id);
                }
                Ok(Some(_)) => {
                    let toggled = if paused {
                        registry.start_step(id, wire_index(current))
                    } else {
                        registry.stop_step(id, wire_index(current))
                    };
                    match toggled {
                        Ok(()) => {
                            paused = !paused;
                            if paused && format == OutputFormat::Pretty {
                                let snapshot = registry.get_session(id)?;
                                if let Some(step) = snapshot.steps.get(current) {
                                    write!(
                                        progress,
                                        "\r{}",
                                        format_progress(
                                            step_count,
                                            current,
                                            step.elapsed_so_far,
                                            step.duration,
                                            true,
                                        )
                                    )?;
                                    progress.flush()?;
                                }
                            }
                        }
                        // The step finished between keypress and toggle
                        Err(e) if e.kind() != ErrorKind::Internal => {
                            debug!(error = %e, "pause toggle ignored");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(None) => input_open = false,
                Err(e) => {
                    debug!(error = %e, "stdin closed");
                    input_open = false;
                }
            },
            () = &mut shutdown => return abandon(registry, id),
        }
    }
}

/// Move `current` past completed steps and start it if it never ran.
///
/// Works from a snapshot rather than the completion tick, which the event
/// queue drops when the reader falls behind.
fn advance(registry: &SessionRegistry, id: &str, current: &mut usize) -> Result<(), HoundError> {
    let snapshot = registry.get_session(id)?;
    while *current + 1 < snapshot.steps.len() && snapshot.steps[*current].completed {
        *current += 1;
    }
    match snapshot.steps.get(*current) {
        Some(step) if step.state == StepState::Idle => {
            debug!(session = %id, step = *current, "starting step");
            registry.start_step(id, wire_index(*current))
        }
        _ => Ok(()),
    }
}

fn abandon(registry: &SessionRegistry, id: &str) -> Result<Outcome, HoundError> {
    let session = registry.stop_session(id)?;
    debug!(session = %id, completed_steps = session.completed_steps(), "session abandoned");
    Ok(Outcome::Abandoned(session))
}

fn report(
    progress: &mut dyn Write,
    format: OutputFormat,
    step_count: usize,
    event: &StepEvent,
) -> Result<(), HoundError> {
    match (format, event) {
        (OutputFormat::Json, event) => {
            writeln!(progress, "{}", serde_json::to_string(event)?)?;
        }
        (
            OutputFormat::Pretty,
            StepEvent::Tick {
                index,
                elapsed,
                duration,
                completed,
            },
        ) => {
            write!(
                progress,
                "\r{}",
                format_progress(step_count, *index, *elapsed, *duration, false)
            )?;
            if *completed {
                writeln!(progress)?;
            }
        }
        (OutputFormat::Pretty, StepEvent::SessionDone) => writeln!(progress)?,
    }
    progress.flush()?;
    Ok(())
}

/// Save a finished session and render the command result.
fn render_outcome(
    outcome: Outcome,
    success: SuccessLevel,
    comment: &str,
    repository: Option<&dyn SessionRepository>,
    format: OutputFormat,
) -> Result<String, HoundError> {
    match outcome {
        Outcome::Finished(session) => {
            let record = SessionRecord::from_session(&session, success, comment, Utc::now());
            let saved = match repository {
                Some(repository) => {
                    repository.save_session(&record)?;
                    true
                }
                None => false,
            };

            match format {
                OutputFormat::Json => to_json(&json!({
                    "status": "completed",
                    "saved": saved,
                    "session": record,
                })),
                OutputFormat::Pretty => Ok(format_record_pretty(&record, saved)),
            }
        }
        Outcome::Abandoned(session) => match format {
            OutputFormat::Json => to_json(&json!({
                "status": "abandoned",
                "saved": false,
                "session": session,
            })),
            OutputFormat::Pretty => Ok(format_abandoned_pretty(&session)),
        },
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::time::Instant;

    use super::*;
    use crate::config::RuntimeConfig;
    use crate::domain::Step;
    use crate::storage::MockSessionRepository;

    fn registry_with(durations: &[u64]) -> SessionRegistry {
        let registry = SessionRegistry::new(RuntimeConfig::default()).unwrap();
        let steps = durations
            .iter()
            .enumerate()
            .map(|(i, d)| Step::new(i, *d))
            .collect();
        let session =
            Session::new("train", "alice", *durations.last().unwrap(), steps).unwrap();
        registry.register(session).unwrap();
        registry
    }

    fn finished_session() -> Session {
        let mut session = Session::new("done", "alice", 20, vec![Step::new(0, 5), Step::new(1, 20)]).unwrap();
        for step in &mut session.steps {
            step.completed = true;
            step.elapsed_so_far = step.duration;
        }
        session.completed = true;
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_all_steps_in_order() {
        let registry = registry_with(&[1, 2, 3]);
        let mut progress = Vec::new();

        let outcome = run_session(
            &registry,
            "train",
            &b""[..],
            std::future::pending(),
            &mut progress,
            OutputFormat::Json,
        )
        .await
        .unwrap();

        let Outcome::Finished(session) = outcome else {
            panic!("expected a finished session");
        };
        assert!(session.completed);
        assert!(session.all_steps_completed());
        assert_eq!(
            session.steps.iter().map(|s| s.elapsed_so_far).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let progress = String::from_utf8(progress).unwrap();
        let lines: Vec<&str> = progress.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[6].contains("session_done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_after_completion_tick_is_dropped() {
        let registry = registry_with(&[10, 1]);
        registry.start_step("train", 0).unwrap();
        // Nobody reads while step 0 runs, so the queue fills and the
        // completion tick is lost.
        time::sleep(Duration::from_secs(12)).await;
        assert!(registry.get_session("train").unwrap().steps[0].completed);

        let mut progress = Vec::new();
        let outcome = time::timeout(
            Duration::from_secs(60),
            run_session(
                &registry,
                "train",
                &b""[..],
                std::future::pending(),
                &mut progress,
                OutputFormat::Json,
            ),
        )
        .await
        .expect("session stalled")
        .unwrap();

        let Outcome::Finished(session) = outcome else {
            panic!("expected a finished session");
        };
        assert!(session.all_steps_completed());
        assert_eq!(session.steps[1].elapsed_so_far, 1);

        let progress = String::from_utf8(progress).unwrap();
        assert!(progress.lines().last().unwrap().contains("session_done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_abandons() {
        let registry = registry_with(&[2, 10]);
        let mut progress = Vec::new();

        let outcome = run_session(
            &registry,
            "train",
            &b"q\n"[..],
            std::future::pending(),
            &mut progress,
            OutputFormat::Pretty,
        )
        .await
        .unwrap();

        let Outcome::Abandoned(session) = outcome else {
            panic!("expected an abandoned session");
        };
        assert!(!session.completed);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_pauses_and_resumes() {
        let registry = registry_with(&[3]);
        let (mut keyboard, input) = tokio::io::duplex(64);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(1500)).await;
            keyboard.write_all(b"\n").await.unwrap();
            time::sleep(Duration::from_secs(5)).await;
            keyboard.write_all(b"\n").await.unwrap();
        });

        let started = Instant::now();
        let mut progress = Vec::new();
        let outcome = run_session(
            &registry,
            "train",
            BufReader::new(input),
            std::future::pending(),
            &mut progress,
            OutputFormat::Pretty,
        )
        .await
        .unwrap();

        let Outcome::Finished(session) = outcome else {
            panic!("expected a finished session");
        };
        assert_eq!(session.steps[0].elapsed_so_far, 3);
        assert!(started.elapsed() >= Duration::from_secs(8));
        assert!(String::from_utf8(progress).unwrap().contains("paused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_abandons() {
        let registry = registry_with(&[1, 30]);
        let mut progress = Vec::new();

        let outcome = run_session(
            &registry,
            "train",
            &b""[..],
            time::sleep(Duration::from_secs(5)),
            &mut progress,
            OutputFormat::Pretty,
        )
        .await
        .unwrap();

        let Outcome::Abandoned(session) = outcome else {
            panic!("expected an abandoned session");
        };
        assert!(session.steps[0].completed);
        assert!(!session.steps[1].completed);
        assert!(!session.completed);
    }

    #[test]
    fn test_finished_session_is_saved() {
        let mut repository = MockSessionRepository::new();
        repository
            .expect_save_session()
            .withf(|record| {
                record.id == "done"
                    && record.success == SuccessLevel::Great
                    && record.comment == "strong finish"
                    && record.steps.iter().all(|s| s.completed)
            })
            .times(1)
            .returning(|_| Ok(()));

        let output = render_outcome(
            Outcome::Finished(finished_session()),
            SuccessLevel::Great,
            "strong finish",
            Some(&repository),
            OutputFormat::Json,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["saved"], true);
        assert_eq!(value["session"]["user_id"], "alice");
    }

    #[test]
    fn test_abandoned_session_is_not_saved() {
        let mut repository = MockSessionRepository::new();
        repository.expect_save_session().never();

        let output = render_outcome(
            Outcome::Abandoned(finished_session()),
            SuccessLevel::Ok,
            "",
            Some(&repository),
            OutputFormat::Pretty,
        )
        .unwrap();
        assert!(output.contains("abandoned"));
    }

    #[test]
    fn test_save_failure_is_reported() {
        let mut repository = MockSessionRepository::new();
        repository
            .expect_save_session()
            .returning(|_| Err(HoundError::Database("disk full".to_string())));

        let result = render_outcome(
            Outcome::Finished(finished_session()),
            SuccessLevel::Ok,
            "",
            Some(&repository),
            OutputFormat::Pretty,
        );
        assert!(matches!(result, Err(HoundError::Database(_))));
    }

    #[test]
    fn test_no_save() {
        let output = render_outcome(
            Outcome::Finished(finished_session()),
            SuccessLevel::Ok,
            "",
            None,
            OutputFormat::Pretty,
        )
        .unwrap();
        assert!(output.contains("Not saved"));
    }
}
