//! Background maintenance for the message cache.
//!
//! Reads already hide expired messages; the sweeper only reclaims the space
//! they occupy. With `ttl_seconds = 0` each tick is a no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::cache::MessageCache;

/// Sweep period used when a zero interval is requested.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a task that calls [`MessageCache::cleanup_expired`] every `interval`.
///
/// The task stops when `shutdown` becomes `true` or its sender is dropped.
/// Sweep errors are logged and the next tick tries again.
pub fn spawn_expiry_sweeper(
    cache: Arc<MessageCache>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = if interval.is_zero() { DEFAULT_SWEEP_INTERVAL } else { interval };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        debug!(period_ms = period.as_millis() as u64, "Expiry sweeper started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match cache.cleanup_expired().await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "Swept expired messages"),
                        Err(e) => error!(error = %e, "Expiry sweep failed"),
                    }
                }
            }
        }

        debug!("Expiry sweeper stopped");
    })
}
