//! Statistics command.

use super::{open_repository, resolve_user};
use crate::cli::args::{OutputFormat, StatsArgs};
use crate::config::{Config, Paths};
use crate::error::HoundError;
use crate::output::format_stats;
use crate::storage::SessionRepository;

/// Show aggregate statistics for a user.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub fn stats(
    args: &StatsArgs,
    config: &Config,
    paths: &Paths,
    format: OutputFormat,
) -> Result<String, HoundError> {
    let user = resolve_user(args.user.as_deref(), config);
    let repository = open_repository(config, paths)?;
    summarize(&repository, &user, format)
}

fn summarize(
    repository: &dyn SessionRepository,
    user: &str,
    format: OutputFormat,
) -> Result<String, HoundError> {
    let stats = repository.session_stats(user)?;
    format_stats(&stats, user, format)
}
