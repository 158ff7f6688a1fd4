//! Command implementations for hound.
//!
//! Every handler returns the text to print on stdout.

mod completions;
mod history;
mod plan;
mod stats;
mod train;

pub use completions::completions;
pub use history::history;
pub use plan::plan;
pub use stats::stats;
pub use train::train;

use crate::config::{Config, Paths};
use crate::error::HoundError;
use crate::storage::{Database, SqliteRepository};

/// User id from `--user`, falling back to `training.default_user`.
fn resolve_user(user: Option<&str>, config: &Config) -> String {
    user.map_or_else(|| config.training.default_user.clone(), str::to_string)
}

/// Open the session history database.
fn open_repository(config: &Config, paths: &Paths) -> Result<SqliteRepository, HoundError> {
    let db = Database::open_at(&config.database_path(paths))?;
    Ok(SqliteRepository::with_database(db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user() {
        let mut config = Config::default();
        assert_eq!(resolve_user(None, &config), "");

        config.training.default_user = "alice".to_string();
        assert_eq!(resolve_user(None, &config), "alice");
        assert_eq!(resolve_user(Some("bob"), &config), "bob");
    }

    #[test]
    fn test_open_repository_honours_storage_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let paths = Paths::with_root(temp_dir.path().join(".hound"));
        let mut config = Config::default();
        config.storage.database = Some(temp_dir.path().join("elsewhere.db"));

        open_repository(&config, &paths).unwrap();

        assert!(temp_dir.path().join("elsewhere.db").exists());
        assert!(!paths.database.exists());
    }
}
