//! Session lifecycle management over the messaging transport.
//!
//! The session manager owns one transport connection at a time, persists
//! credentials across restarts, and reconnects with capped exponential
//! backoff when a connection drops. All lifecycle decisions run inside a
//! single control loop fed by a channel, so transport events and caller
//! requests are serialized and reconnects never re-enter each other.

mod credentials;
mod error;
mod manager;
mod sender;

pub use credentials::CredentialsStore;
pub use error::{SessionError, SessionResult};
pub use manager::{SessionConfig, SessionEvent, SessionManager, SessionStatus};
pub use sender::MessageSender;
