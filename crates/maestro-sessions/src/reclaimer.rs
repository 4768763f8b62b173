//! Background session reclamation.

use std::sync::Arc;

use crate::store::ContextStore;

/// Spawn the periodic sweep that evicts idle sessions. Runs for the
/// lifetime of the process; safe to run concurrently with request
/// handling (the store serializes internally).
pub fn spawn_reclaimer(store: Arc<ContextStore>, interval_sec: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_sec.max(1)));
        // The first tick fires immediately; skip it so a fresh boot
        // doesn't log a no-op sweep.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = store.reclaim_idle();
            if removed > 0 {
                tracing::info!(removed, "reclaimed idle sessions");
            }
        }
    });
}
