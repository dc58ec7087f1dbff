use std::time::Duration;
use tokio::time;

use super::suggestions::{now_ms, SuggestionStore};

/// Background task that deletes expired suggestion rows.
///
/// Lookups already ignore expired rows; this only reclaims disk space.
pub async fn prune_loop(store: SuggestionStore, interval_secs: u64) {
    let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        match store.prune_expired_at(now_ms()).await {
            Ok(deleted) if deleted > 0 => {
                tracing::info!(deleted, "pruned expired suggestions");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "suggestion prune failed"),
        }
    }
}
