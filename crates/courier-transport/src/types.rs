//! Transport event and credential types.

use serde::{Deserialize, Serialize};

/// Opaque session credentials.
///
/// The transport owns the shape of this blob; the session layer only
/// persists and replays it. Stored as JSON on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(pub serde_json::Value);

impl Credentials {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Presence shown to a recipient while a message is being prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Composing,
    Paused,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Composing => "composing",
            Self::Paused => "paused",
        }
    }
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server invalidated the session. Credentials are dead.
    LoggedOut,
    /// Network-level interruption.
    NetworkError,
    /// Server-initiated restart.
    ServerRestart,
    /// The stream ended without a protocol-level reason.
    StreamEnded,
    /// Anything else, with the raw reason for logging.
    Other(String),
}

impl CloseReason {
    /// Whether reconnecting with the same credentials can succeed.
    ///
    /// Only `LoggedOut` is unrecoverable: the credentials are invalid and a
    /// fresh pairing is required. Every other close is treated as transient.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::LoggedOut)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::NetworkError => write!(f, "network error"),
            Self::ServerRestart => write!(f, "server restart"),
            Self::StreamEnded => write!(f, "stream ended"),
            Self::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Events emitted by a live connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is open and ready to send.
    ConnectionOpen,
    /// The connection closed; no further events follow.
    ConnectionClosed { reason: CloseReason },
    /// The transport rotated the session credentials; persist them.
    CredentialsUpdated(Credentials),
    /// A pairing code for linking a new session is available.
    PairingCodeAvailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_logged_out_is_unrecoverable() {
        assert!(!CloseReason::LoggedOut.is_recoverable());
        assert!(CloseReason::NetworkError.is_recoverable());
        assert!(CloseReason::ServerRestart.is_recoverable());
        assert!(CloseReason::StreamEnded.is_recoverable());
        assert!(CloseReason::Other("conflict".to_string()).is_recoverable());
    }

    #[test]
    fn credentials_round_trip_through_json() {
        let creds = Credentials::new(serde_json::json!({"noise_key": "abc", "me": "628123"}));
        let raw = serde_json::to_string(&creds).unwrap();
        let parsed: Credentials = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, creds);
    }
}
