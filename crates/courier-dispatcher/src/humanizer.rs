//! Humanized send sequence.

use courier_session::{MessageSender, SessionResult};
use courier_transport::PresenceState;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Jitter bounds for the pause between "composing" and the actual send.
#[derive(Debug, Clone)]
pub struct HumanizerConfig {
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl Default for HumanizerConfig {
    fn default() -> Self {
        Self {
            jitter_min: Duration::from_secs(2),
            jitter_max: Duration::from_secs(5),
        }
    }
}

impl HumanizerConfig {
    pub fn from_config(config: &courier_core::Config) -> Self {
        Self {
            jitter_min: Duration::from_millis(config.jitter_min_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
        }
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        rand::thread_rng().gen_range(self.jitter_min..=self.jitter_max)
    }
}

/// Wraps a send in a typing simulation: show "composing", wait a random
/// beat, send, then show "paused". The presence legs are best-effort; only
/// the send itself can fail.
pub struct Humanizer {
    config: HumanizerConfig,
}

impl Humanizer {
    pub fn new(config: HumanizerConfig) -> Self {
        Self { config }
    }

    pub async fn run(
        &self,
        sender: &dyn MessageSender,
        recipient: &str,
        body: &str,
    ) -> SessionResult<()> {
        sender.presence(recipient, PresenceState::Composing).await;

        let jitter = self.config.sample_jitter();
        debug!(jitter_ms = jitter.as_millis() as u64, "Simulating typing");
        tokio::time::sleep(jitter).await;

        sender.send(recipient, body).await?;
        sender.presence(recipient, PresenceState::Paused).await;
        Ok(())
    }
}
