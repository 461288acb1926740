//! Midnight rollover task.

use crate::dispatcher::SharedState;
use chrono::{Local, NaiveDateTime, TimeDelta};
use std::time::Duration;

/// Slack added after midnight so the reset never fires a moment early.
const ROLLOVER_SLACK: Duration = Duration::from_secs(1);

/// Time left until the next midnight after `now`.
pub fn until_next_midnight(now: NaiveDateTime) -> Duration {
    let next_midnight = now
        .date()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now + TimeDelta::days(1));
    (next_midnight - now)
        .to_std()
        .unwrap_or(Duration::from_secs(24 * 60 * 60))
}

/// Clear the daily fact every local midnight. Runs until the task is dropped.
pub async fn run_daily_reset(state: SharedState) {
    loop {
        let wait = until_next_midnight(Local::now().naive_local()) + ROLLOVER_SLACK;
        log::debug!("Next daily reset in {}s", wait.as_secs());
        tokio::time::sleep(wait).await;

        state.lock().facts.reset();
        log::info!("Day rolled over, daily fact reset");
    }
}
