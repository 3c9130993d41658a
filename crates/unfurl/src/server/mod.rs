// ABOUTME: axum HTTP surface: bearer-token pre-check, input validation and the JSON envelope.
// ABOUTME: Maps pipeline errors onto envelope codes; the HTTP status always equals the code.

//! HTTP server for the unfurl service.
//!
//! Endpoints:
//! - `GET /?url=<url>&cleanUrl=<flag>` - unfurl a page
//! - `GET /healthz` - liveness probe

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::client::Unfurler;
use crate::error::{ErrorCode, UnfurlError};

const MISSING_URL_HINT: &str =
    "Please provide a `url` query parameter, e.g. ?url=https://example.com";

/// Shared per-process state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub unfurler: Arc<Unfurler>,
    /// Required bearer token; requests are open when `None`.
    pub api_token: Option<String>,
}

impl AppState {
    pub fn new(unfurler: Unfurler, api_token: Option<String>) -> Self {
        Self {
            unfurler: Arc::new(unfurler),
            api_token: api_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Query parameters of the unfurl endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnfurlQuery {
    pub url: Option<String>,
    #[serde(rename = "cleanUrl")]
    pub clean_url: Option<String>,
}

impl UnfurlQuery {
    /// `cleanUrl` counts as set unless absent, empty, `false` or `0`.
    fn wants_clean_url(&self) -> bool {
        self.clean_url
            .as_deref()
            .map(str::trim)
            .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case("false") && v != "0")
    }
}

/// Response envelope `{code, message, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    fn new(code: u16, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

fn unauthorized() -> Envelope<Value> {
    Envelope::new(ErrorCode::Unauthorized.status(), "Unauthorized", None)
}

fn missing_url() -> Envelope<Value> {
    Envelope::new(
        ErrorCode::InvalidInput.status(),
        "Bad Request",
        Some(Value::String(MISSING_URL_HINT.to_string())),
    )
}

/// Returns the 401 envelope when a token is configured and not presented.
fn check_token(state: &AppState, authorization: Option<&str>) -> Option<Envelope<Value>> {
    let token = state.api_token.as_ref()?;
    let expected = format!("Bearer {}", token);
    (authorization != Some(expected.as_str())).then(unauthorized)
}

fn fetch_failure_message(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Timeout => "Timed out fetching URL",
        ErrorCode::Ssrf => "URL is not allowed",
        _ => "Failed to fetch URL",
    }
}

/// Converts a pipeline error into its envelope.
pub fn error_envelope(err: &UnfurlError) -> Envelope<Value> {
    let status = err.code.status();
    if err.is_fetch_stage() {
        warn!(url = %err.url, reason = %err.reason(), "fetch failed");
        return Envelope::new(
            status,
            fetch_failure_message(err.code),
            Some(json!({ "url": err.url, "reason": err.reason() })),
        );
    }
    if err.is_invalid_input() {
        return Envelope::new(status, "Bad Request", Some(Value::String(err.reason())));
    }
    error!(error = %err, "unfurl failed");
    Envelope::new(
        ErrorCode::Unexpected.status(),
        "Internal Server Error",
        None,
    )
}

/// Runs one unfurl request: auth, validation, pipeline, envelope.
pub async fn handle_request(
    state: &AppState,
    query: UnfurlQuery,
    authorization: Option<&str>,
) -> Envelope<Value> {
    if let Some(denied) = check_token(state, authorization) {
        return denied;
    }

    let url = match query.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => return missing_url(),
    };

    let result = match state.unfurler.unfurl(url, query.wants_clean_url()).await {
        Ok(result) => result,
        Err(err) => return error_envelope(&err),
    };

    match serde_json::to_value(&result) {
        Ok(data) => Envelope::new(200, "OK", Some(data)),
        Err(e) => error_envelope(&UnfurlError::unexpected(
            url,
            "Serialize",
            Some(anyhow::anyhow!(e)),
        )),
    }
}

async fn unfurl_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<UnfurlQuery>, QueryRejection>,
) -> Envelope<Value> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match query {
        Ok(Query(query)) => handle_request(&state, query, authorization).await,
        Err(rejection) => {
            if let Some(denied) = check_token(&state, authorization) {
                return denied;
            }
            debug!(error = %rejection, "rejected query string");
            missing_url()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(unfurl_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    info!("unfurl server listening on http://{}/", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
    Ok(())
}
