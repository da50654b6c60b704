//! HTTP routes for exobump

pub mod health;
pub mod interactions;
pub mod status;

pub use health::health_check;
pub use interactions::{handle_event, handle_interaction};
pub use status::status_check;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Serialize `value` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_json(status, body),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to serialize response: {}", e),
        ),
    }
}

/// JSON error body: `{"error": <reason>, "message": <message>}`
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message,
    });
    with_json(status, body.to_string().into_bytes())
}

fn with_json(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = error_response(StatusCode::NOT_FOUND, "No route for /x");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let json = test_support::body_json(response).await;
        assert_eq!(json["error"], "Not Found");
        assert_eq!(json["message"], "No route for /x");
    }
}
