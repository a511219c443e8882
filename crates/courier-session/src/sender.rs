//! Sending seam consumed by the dispatcher.

use crate::{SessionManager, SessionResult};
use async_trait::async_trait;
use courier_transport::PresenceState;

/// What the dispatcher needs from a session: one send call and a
/// best-effort presence update. Implemented by [`SessionManager`]; tests
/// substitute their own.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send one message. No internal retry; the queue owns retries.
    async fn send(&self, recipient: &str, body: &str) -> SessionResult<()>;

    /// Update presence. Infallible by contract; implementations swallow
    /// transport failures.
    async fn presence(&self, recipient: &str, state: PresenceState);
}

#[async_trait]
impl MessageSender for SessionManager {
    async fn send(&self, recipient: &str, body: &str) -> SessionResult<()> {
        SessionManager::send(self, recipient, body).await
    }

    async fn presence(&self, recipient: &str, state: PresenceState) {
        SessionManager::presence(self, recipient, state).await
    }
}
