//! Background sweep of abandoned pending receipts.
//!
//! A crash between placeholder creation and commit leaves a receipt pending
//! forever. The sweeper periodically fails every pending receipt that has
//! not been touched within the configured age.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::SweepConfig;
use crate::store::RecordStore;

/// Spawn the periodic sweeper. The first sweep runs immediately, which
/// also reclaims receipts orphaned by a previous process.
pub fn spawn_sweeper(store: Arc<dyn RecordStore>, config: SweepConfig) -> JoinHandle<()> {
    let period = Duration::from_secs(config.interval_secs.max(1));
    let stale_after = chrono::Duration::seconds(config.stale_after_secs as i64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - stale_after;
            match store.fail_stale_pending(cutoff).await {
                Ok(0) => {}
                Ok(swept) => info!(swept, "failed stale pending receipts"),
                Err(err) => warn!(error = %err, "stale receipt sweep failed"),
            }
        }
    })
}
