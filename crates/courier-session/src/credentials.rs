//! On-disk credentials persistence.

use crate::{SessionError, SessionResult};
use courier_transport::Credentials;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Stores the transport's opaque credentials blob as a JSON file.
#[derive(Debug, Clone)]
pub struct CredentialsStore {
    path: PathBuf,
}

impl CredentialsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load stored credentials.
    ///
    /// A missing file means no session exists yet. An unreadable or corrupt
    /// file is logged and treated the same way, which forces a fresh
    /// pairing instead of wedging startup.
    pub fn load(&self) -> Option<Credentials> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Failed to read credentials file");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(creds) => Some(creds),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Corrupt credentials file, ignoring");
                None
            }
        }
    }

    /// Persist credentials, replacing any existing blob.
    pub fn save(&self, credentials: &Credentials) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::CredentialsStore(e.to_string()))?;
        }

        let raw = serde_json::to_string(credentials)
            .map_err(|e| SessionError::CredentialsStore(e.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| SessionError::CredentialsStore(e.to_string()))?;

        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    /// Remove stored credentials. Removing an absent file is not an error.
    pub fn clear(&self) -> SessionResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credentials cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SessionError::CredentialsStore(err.to_string())),
        }
    }
}
