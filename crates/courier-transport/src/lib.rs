//! Messaging transport boundary.
//!
//! This crate defines the seam between the session layer and whatever
//! concrete wire protocol carries messages. The session manager drives a
//! [`Transport`] to establish connections and consumes [`TransportEvent`]s;
//! everything protocol-specific lives behind the trait.

mod address;
mod error;
mod types;

pub use address::canonical_address;
pub use error::{TransportError, TransportResult};
pub use types::{CloseReason, Credentials, PresenceState, TransportEvent};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Factory for transport connections.
///
/// `connect` performs one connection attempt. On success it hands back a
/// handle for outbound operations and the event stream for that connection.
/// The event stream ends after `ConnectionClosed` is delivered.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
    ) -> TransportResult<(Box<dyn TransportHandle>, mpsc::Receiver<TransportEvent>)>;
}

/// Outbound operations on a live connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Send a text message to a canonical address.
    async fn send_text(&self, address: &str, body: &str) -> TransportResult<()>;

    /// Update the presence shown to a recipient. Best-effort.
    async fn send_presence(&self, address: &str, state: PresenceState) -> TransportResult<()>;

    /// Close the connection locally. The session stays valid server-side.
    async fn end(&self) -> TransportResult<()>;

    /// Terminate the session on the server side, invalidating credentials.
    async fn logout(&self) -> TransportResult<()>;
}
