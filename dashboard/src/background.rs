use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::config::PRUNE_INTERVAL;
use crate::state::AppState;

/// Spawns the periodic retention pass over the reading store.
pub fn spawn_background_workers(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;

            let removed = {
                let mut readings = state.readings.write().unwrap();
                readings.prune(Utc::now())
            };
            debug!(removed, "pruned expired readings");
        }
    });
}
