//! Session history command.

use chrono::{Duration, Utc};

use super::{open_repository, resolve_user};
use crate::cli::args::{HistoryArgs, OutputFormat};
use crate::config::{Config, Paths};
use crate::error::HoundError;
use crate::output::format_history;
use crate::storage::SessionRepository;

/// List finished sessions for a user.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub fn history(
    args: &HistoryArgs,
    config: &Config,
    paths: &Paths,
    format: OutputFormat,
) -> Result<String, HoundError> {
    let user = resolve_user(args.user.as_deref(), config);
    let repository = open_repository(config, paths)?;
    list_history(&repository, &user, args.days, args.limit, format)
}

fn list_history(
    repository: &dyn SessionRepository,
    user: &str,
    days: Option<u32>,
    limit: usize,
    format: OutputFormat,
) -> Result<String, HoundError> {
    let mut records = match days {
        Some(days) => {
            let since = Utc::now() - Duration::days(i64::from(days));
            repository.recent_sessions(user, since)?
        }
        None => repository.sessions_by_user(user)?,
    };
    records.truncate(limit);

    format_history(&records, user, format)
}
