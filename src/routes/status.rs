//! Status endpoint
//!
//! Runtime view of the queue, reminders and persistence.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::fanout::DeliveryReport;
use crate::queue::QueueStats;
use crate::server::AppState;

/// Status response payload
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub node_id: String,
    pub dev_mode: bool,
    pub uptime_secs: u64,
    pub communities: usize,
    pub queue: QueueStats,
    pub deliveries: DeliveryReport,
    pub rate_limited_actors: usize,
    pub pending_reminders: usize,
    pub reminders_fired: u64,
    /// Unsaved mutations exist
    pub dirty: bool,
    pub autosave_running: bool,
    pub flushes: u64,
    pub flush_failures: u64,
}

pub async fn status_check(state: &AppState) -> Response<Full<Bytes>> {
    let bot = &state.bot;
    let status = StatusResponse {
        service: "exobump",
        version: env!("CARGO_PKG_VERSION"),
        node_id: state.args.node_id.to_string(),
        dev_mode: state.args.dev_mode,
        uptime_secs: bot.uptime_secs(),
        communities: bot.state().community_count().await,
        queue: bot.queue_stats(),
        deliveries: bot.delivery_totals(),
        rate_limited_actors: bot.rate_limited_actors(),
        pending_reminders: bot.reminders().pending_count(),
        reminders_fired: bot.reminders().fired_count(),
        dirty: bot.state().dirty().is_dirty(),
        autosave_running: state.sync.is_running().await,
        flushes: state.sync.flush_count(),
        flush_failures: state.sync.failure_count(),
    };
    json_response(StatusCode::OK, &status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app_state, body_json};
    use crate::types::CommunityId;

    #[tokio::test]
    async fn test_status_reflects_state() {
        let state = app_state();
        state
            .bot
            .state()
            .ensure_community(&CommunityId::from("g"))
            .await;

        let json = body_json(status_check(&state).await).await;
        assert_eq!(json["service"], "exobump");
        assert_eq!(json["communities"], 1);
        assert_eq!(json["dirty"], true);
        assert_eq!(json["queue"]["depth"], 0);
        assert_eq!(json["autosave_running"], false);
        assert_eq!(json["deliveries"]["succeeded"], 0);
    }
}
