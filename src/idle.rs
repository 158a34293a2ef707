//! Purpose: Track inbound activity so the service can exit once it goes quiet.
//! Exports: `IdleTimer`, `DEFAULT_INACTIVITY_TIMEOUT`.
//! Invariants: `expired` resolves only after `timeout` passes with no `reset`.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(20_000);

#[derive(Debug)]
pub struct IdleTimer {
    timeout: Duration,
    last_activity: watch::Sender<Instant>,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        let (last_activity, _) = watch::channel(Instant::now());
        Self {
            timeout,
            last_activity,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Records activity now, postponing expiry by a full timeout.
    pub fn reset(&self) {
        self.last_activity.send_replace(Instant::now());
    }

    pub async fn expired(&self) {
        let mut activity = self.last_activity.subscribe();
        loop {
            let deadline = *activity.borrow_and_update() + self.timeout;
            tokio::select! {
                _ = sleep_until(deadline) => return,
                changed = activity.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVITY_TIMEOUT)
    }
}
