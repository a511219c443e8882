//! File system paths for the dispatch daemon.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the daemon.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.courier)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.courier`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".courier"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.courier).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.courier/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the job store database path (~/.courier/courier.sqlite).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("courier.sqlite")
    }

    /// Get the session credentials blob path (~/.courier/credentials.json).
    pub fn credentials_file(&self) -> PathBuf {
        self.base_dir.join("credentials.json")
    }

    /// Get the logs directory (~/.courier/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().expect("Failed to determine home directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_with_base_dir() {
        let base = PathBuf::from("/tmp/test-courier");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.database_file(), base.join("courier.sqlite"));
        assert_eq!(paths.credentials_file(), base.join("credentials.json"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
    }

    #[test]
    fn paths_default_base() {
        let paths = Paths::new().unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(paths.base_dir(), &home.join(".courier"));
    }

    #[test]
    fn ensure_dirs_creates_directories() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("courier");
        let paths = Paths::with_base_dir(base.clone());

        assert!(!base.exists());
        paths.ensure_dirs().unwrap();

        assert!(base.is_dir());
        assert!(paths.logs_dir().is_dir());
    }

    #[test]
    fn ensure_dirs_idempotent() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(paths.base_dir().exists());
        assert!(paths.logs_dir().exists());
    }
}
