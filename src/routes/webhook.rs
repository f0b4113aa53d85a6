//! Webhook ingress endpoint

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use serde::Serialize;
use tracing::warn;

use calhook_core::WebhookPayload;

use crate::dispatch;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive))
}

/// Acknowledgment body; the provider only looks at the status code
#[derive(Serialize)]
struct Ack {
    ok: bool,
}

/// POST /webhook - Accept a delivery, acknowledge, process detached
///
/// The provider re-delivers on any non-2xx answer, and a redelivered
/// payload would fail the same way, so this handler always answers 200:
/// undecodable bodies are logged and dropped, and processing outcomes
/// only ever reach the logs. Decoding happens by hand rather than via
/// the Json extractor so a malformed body cannot turn into a 4xx.
async fn receive(State(state): State<AppState>, body: Bytes) -> Json<Ack> {
    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => {
            tokio::spawn(async move {
                dispatch::process_delivery(&state, payload).await;
            });
        }
        Err(err) => {
            warn!(%err, "undecodable webhook payload");
        }
    }

    Json(Ack { ok: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use calhook_core::{AppConfig, LinkTable};
    use tower::ServiceExt;

    fn test_router() -> Router {
        // Nothing listens on port 9; spawned processing fails in the
        // background while the handler's answer is what gets asserted
        let config = AppConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            api_key: "test-key".to_string(),
            calendar_id: "cal".to_string(),
            custom_field: "meeting_link".to_string(),
            listen_addr: "127.0.0.1:0".parse().expect("Should parse addr"),
            links: LinkTable::from_iter([(1, "https://meet.example.com".to_string())]),
        };
        let state = AppState::new(config).expect("Should build state");
        router().with_state(state)
    }

    fn post_webhook(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Should build request")
    }

    #[tokio::test]
    async fn acknowledges_a_valid_delivery() {
        let response = test_router()
            .oneshot(post_webhook(
                r#"{"action":"create","event":{"id":1,"subcalendar_id":1,"start_dt":"2024-01-05T09:00:00+00:00","end_dt":"2024-01-05T10:00:00+00:00"}}"#,
            ))
            .await
            .expect("Should get response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn acknowledges_an_undecodable_delivery() {
        let response = test_router()
            .oneshot(post_webhook("this is not json"))
            .await
            .expect("Should get response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn acknowledges_an_empty_body() {
        let response = test_router()
            .oneshot(post_webhook(""))
            .await
            .expect("Should get response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
