use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::modules::video::jobs::JobManager;

/// Periodically closes jobs stuck in `running`. Runs until the task is dropped.
pub async fn run_stale_sweeper(jobs: JobManager, every: Duration) {
    info!("Starting stale job sweeper (interval: {:?})", every);

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match jobs.expire_stale_jobs(OffsetDateTime::now_utc()).await {
            Ok(0) => {}
            Ok(n) => info!("⏱️ Stale sweep closed {} jobs", n),
            Err(e) => error!("Stale job sweep failed: {}", e),
        }
    }
}
