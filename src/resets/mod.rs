//! Calendar counter resets
//!
//! All boundaries are midnight UTC: daily every day, weekly on Sunday,
//! monthly on the 1st. A reset marks state dirty and flushes right away.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use crate::state::ResetPeriod;
use crate::persistence::PersistenceSync;
use crate::state::BotState;

/// First reset boundary strictly after `now`
pub fn next_boundary(period: ResetPeriod, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = now.date_naive();
    let date = match period {
        ResetPeriod::Daily => today.checked_add_days(Days::new(1))?,
        ResetPeriod::Weekly => {
            let days = 7 - u64::from(today.weekday().num_days_from_sunday());
            today.checked_add_days(Days::new(days))?
        }
        ResetPeriod::Monthly => {
            if today.month() == 12 {
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)?
            }
        }
    };
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Apply one reset and persist it
pub async fn run_reset(period: ResetPeriod, state: &BotState, sync: &PersistenceSync) {
    state.reset_counters(period).await;
    info!(period = period.as_str(), "Counters reset");

    if let Err(e) = sync.flush_now().await {
        error!(period = period.as_str(), error = %e, "Failed to persist counter reset");
    }
}

/// Run `period` resets forever on their calendar boundaries
pub fn spawn_reset_task(
    period: ResetPeriod,
    state: Arc<BotState>,
    sync: Arc<PersistenceSync>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = next_boundary(period, now) else {
                error!(period = period.as_str(), "No next reset boundary, stopping");
                return;
            };
            let delay = (next - now).to_std().unwrap_or_default();
            info!(period = period.as_str(), next = %next, "Next counter reset scheduled");

            tokio::time::sleep(delay).await;
            run_reset(period, &state, &sync).await;
        }
    })
}
