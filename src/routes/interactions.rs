//! Command and platform event intake
//!
//! `POST /interactions` takes an [`Interaction`] and answers with its
//! [`Reply`](crate::commands::Reply). Declines and validation failures
//! are ordinary replies, so the status is 200 whenever the body parses.
//! `POST /events` takes a [`PlatformEvent`].

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::warn;

use super::{error_response, json_response};
use crate::bot::PlatformEvent;
use crate::commands::Interaction;
use crate::server::AppState;

pub async fn handle_interaction(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid interaction: {}", e),
            )
        }
    };

    let reply = state.bot.dispatch(interaction).await;
    json_response(StatusCode::OK, &reply)
}

pub async fn handle_event(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    let event: PlatformEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid event: {}", e))
        }
    };

    match state.bot.handle_event(event).await {
        Ok(()) => json_response(StatusCode::ACCEPTED, &serde_json::json!({ "accepted": true })),
        Err(e) => {
            warn!(error = %e, "Platform event failed");
            let (status, message) = e.into_status_code_and_body();
            error_response(status, &message)
        }
    }
}
