use super::{SharedStore, Store, SweepStats};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
pub struct ExpirySettings {
    pub interval: Duration,
    pub sample_size: usize,
    pub max_iterations: usize,
}

impl Default for ExpirySettings {
    fn default() -> Self {
        ExpirySettings {
            interval: Duration::from_millis(100),
            sample_size: 20,
            max_iterations: 2,
        }
    }
}

/// One scheduled tick: sample, and keep sampling while more than a quarter
/// of the sample turned out to be expired, up to `max_iterations` passes.
pub fn expire_cycle(store: &mut Store, settings: &ExpirySettings) -> SweepStats {
    let mut total = SweepStats::default();
    for _ in 0..settings.max_iterations {
        let stats = store.sweep_expired(settings.sample_size);
        total.sampled += stats.sampled;
        total.expired += stats.expired;
        if stats.expired * 4 <= stats.sampled {
            break;
        }
    }
    total
}

/// Background sweep. Runs until `cancel` fires; each tick takes the store
/// lock like any other writer.
pub async fn run_active_expiry(store: SharedStore, settings: ExpirySettings, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let stats = {
                    let mut store = store.lock().await;
                    expire_cycle(&mut store, &settings)
                };
                if stats.expired > 0 {
                    trace!(sampled = stats.sampled, expired = stats.expired, "active expiry tick");
                }
            }
        }
    }
    debug!("active expiry stopped");
}
