//! Path resolution for hound configuration and data files.
//!
//! All hound data is stored in `~/.hound/`:
//! - `config.yaml` - Main configuration file
//! - `hound.db` - SQLite database of finished sessions

use std::path::PathBuf;

use crate::error::HoundError;

/// Paths to hound configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.hound/`
    pub root: PathBuf,
    /// Config file: `~/.hound/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.hound/hound.db`
    pub database: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, HoundError> {
        let home = std::env::var("HOME")
            .map_err(|_| HoundError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".hound")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("hound.db"),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_with_root() {
        let root = PathBuf::from("/tmp/test-hound");
        let paths = Paths::with_root(root.clone());

        assert_eq!(paths.root, root);
        assert_eq!(paths.config_file, root.join("config.yaml"));
        assert_eq!(paths.database, root.join("hound.db"));
    }
}
