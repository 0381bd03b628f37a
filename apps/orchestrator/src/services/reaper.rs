use std::time::Duration;

use gradecore_db::QueueRepository;
use tokio::time::interval;
use tracing::warn;

use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const STALE_WORKER_SECONDS: i64 = 300;

/// Background housekeeping daemon: evicts workers that stopped
/// heartbeating and surfaces a count of jobs stuck past retry exhaustion
/// (§4.5 step 4, §6 "admin-visible"). Zombie lease reclamation itself
/// happens lazily inside `QueueRepository::claim_next`, so this loop
/// only needs to handle state nothing else touches on its own.
pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;

            let evicted = state.evict_stale_workers(STALE_WORKER_SECONDS);
            if evicted > 0 {
                warn!(evicted, "dropped workers that stopped heartbeating");
            }

            let conn = match state.db.connection() {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(%error, "reaper could not open a connection");
                    continue;
                }
            };
            match QueueRepository::new(conn).count_stuck().await {
                Ok(0) => {}
                Ok(count) => warn!(count, "jobs escalated to stuck awaiting admin reevaluate"),
                Err(error) => warn!(%error, "reaper failed to query stuck jobs"),
            }
        }
    });
}
