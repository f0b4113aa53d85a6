//! HTTP client for the calendar provider's REST API.
//!
//! One client per configured calendar. Every failed call comes back
//! classified as a `FailureKind` so the executor can decide whether a
//! different payload shape is worth trying; nothing above this layer
//! looks at raw HTTP statuses.

use std::time::Duration;

use calhook_core::error::{CalHookError, CalHookResult};
use calhook_core::{AppConfig, UpdatePayload};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Upper bound for one provider call; a hung upstream must not stall
/// webhook processing indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key.
const TOKEN_HEADER: &str = "Provider-Token";

/// Longest error-body excerpt worth carrying into logs.
const BODY_EXCERPT_LEN: usize = 200;

/// Classified provider failure, driving the executor's fallback decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The write collided with an existing schedule
    Overlap,
    /// Any other client-side rejection
    Validation,
    /// Credentials rejected
    Auth,
    /// The event is gone or never existed under this calendar
    NotFound,
    /// Provider-side 5xx
    Server,
    /// Transport failure or timeout, no HTTP answer at all
    Network,
}

impl FailureKind {
    /// Whether a different payload shape could plausibly change the
    /// provider's answer. Auth, missing events, provider outages and
    /// transport failures cannot be fixed by reshaping the body.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Overlap | FailureKind::Validation)
    }
}

/// A single failed provider call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiFailure {
    pub kind: FailureKind,
    /// HTTP status, when the provider answered at all
    pub status: Option<StatusCode>,
    pub message: String,
}

/// Error body the provider attaches to non-2xx answers:
/// `{"error": {"id": ..., "title": ..., "message": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    id: Option<String>,
    title: Option<String>,
    message: Option<String>,
}

/// Authenticated client for one provider calendar.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    calendar_id: String,
}

impl ProviderClient {
    /// Build a client from validated configuration.
    ///
    /// Credentials and the base URL are fatal preconditions, checked
    /// here so no webhook can be accepted without them.
    pub fn new(config: &AppConfig) -> CalHookResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CalHookError::Config("'api_key' must not be empty".into()));
        }
        if config.calendar_id.trim().is_empty() {
            return Err(CalHookError::Config(
                "'calendar_id' must not be empty".into(),
            ));
        }

        let base = Url::parse(&config.api_base).map_err(|e| {
            CalHookError::Config(format!("Invalid api_base '{}': {e}", config.api_base))
        })?;
        if base.cannot_be_a_base() {
            return Err(CalHookError::Config(format!(
                "Invalid api_base '{}': not a usable base URL",
                config.api_base
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CalHookError::Config(format!("Could not build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            api_key: config.api_key.clone(),
            calendar_id: config.calendar_id.clone(),
        })
    }

    /// Send one update to `{calendar}/events/{event_id}`.
    ///
    /// The primary verb is PUT; a 405 answer triggers a single PATCH
    /// retry with the identical body before the result is classified.
    pub async fn update_event(
        &self,
        event_id: &str,
        payload: &UpdatePayload,
    ) -> Result<(), ApiFailure> {
        let url = self.event_url(event_id);

        let response = self.send(Method::PUT, url.clone(), payload).await?;

        let response = if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(%url, "PUT not allowed, retrying as PATCH");
            self.send(Method::PATCH, url, payload).await?
        } else {
            response
        };

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiFailure {
            kind: classify(status, &body),
            status: Some(status),
            message: error_message(status, &body),
        })
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        payload: &UpdatePayload,
    ) -> Result<reqwest::Response, ApiFailure> {
        self.http
            .request(method, url)
            .header(TOKEN_HEADER, &self.api_key)
            .json(&payload.fields)
            .send()
            .await
            .map_err(|e| ApiFailure {
                kind: FailureKind::Network,
                status: None,
                message: e.to_string(),
            })
    }

    fn event_url(&self, event_id: &str) -> Url {
        let mut url = self.base.clone();
        // Guarded by the cannot_be_a_base check in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([self.calendar_id.as_str(), "events", event_id]);
        }
        url
    }
}

/// Classify a non-2xx answer.
///
/// The provider shares status 400 between schedule collisions and
/// ordinary validation failures, so overlap is detected from the error
/// text rather than the status alone.
fn classify(status: StatusCode, body: &str) -> FailureKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Auth,
        StatusCode::NOT_FOUND => FailureKind::NotFound,
        s if s.is_client_error() => {
            if body.to_ascii_lowercase().contains("overlap") {
                FailureKind::Overlap
            } else {
                FailureKind::Validation
            }
        }
        _ => FailureKind::Server,
    }
}

/// Best human-readable message for a rejected call.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed
            .error
            .message
            .or(parsed.error.title)
            .or(parsed.error.id)
        {
            return format!("HTTP {status}: {message}");
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", excerpt(trimmed))
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
