//! Dispatch rate pacing.

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between dispatch starts.
///
/// [`acquire`](Self::acquire) returns once the current slot opens and
/// immediately re-arms the next slot at `acquired + spacing`, so the
/// interval is measured between dispatch starts and does not stretch with
/// attempt duration.
pub struct DispatchPacer {
    spacing: Duration,
    next_slot: Option<Instant>,
}

impl DispatchPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: None,
        }
    }

    /// Wait for the next dispatch slot. The first call returns immediately.
    pub async fn acquire(&mut self) {
        if let Some(slot) = self.next_slot {
            tokio::time::sleep_until(slot).await;
        }
        self.next_slot = Some(Instant::now() + self.spacing);
    }
}
