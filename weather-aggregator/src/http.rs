/**
 * HTTP ADAPTER - one request per connection
 *
 * ROLE:
 * Decodes the request framing (method, Lamport-Clock header, bounded body)
 * and hands it to the RequestCoordinator; maps outcomes to status codes.
 *
 * ROUTES:
 * - PUT <any path>   producer update  -> 201 | 200 | 204 | 422 | 500
 * - GET <any path>   snapshot query   -> 200 + JSON array
 * - anything else                     -> 400
 *
 * Every response carries `Lamport-Clock` and `Connection: close`.
 * A body that does not arrive within `body_timeout` gets 408; one larger
 * than `max_body_bytes` gets 413. Neither touches the clock.
 */

use axum::body::{self, Body};
use axum::extract::{Request, State};
use axum::http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::time::Duration;
use tracing::{debug, warn};
use weather_protocol::{parse_clock, payload, LAMPORT_CLOCK_HEADER};

use crate::coordinator::{RequestCoordinator, UpdateRequest, UpdateStatus};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: RequestCoordinator,
    pub body_timeout: Duration,
    pub max_body_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    match method {
        Method::PUT => handle_put(&state, request).await,
        Method::GET => handle_get(&state),
        other => {
            debug!(method = %other, "[http] unsupported method");
            respond(StatusCode::BAD_REQUEST, state.coordinator.clock().value(), Body::empty())
        }
    }
}

async fn handle_put(state: &AppState, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let current = || state.coordinator.clock().value();

    let foreign_clock = match foreign_clock(&parts.headers) {
        Ok(clock) => clock,
        Err(raw) => {
            warn!(header = %raw, "[http] malformed Lamport-Clock header");
            return respond(StatusCode::UNPROCESSABLE_ENTITY, current(), Body::empty());
        }
    };

    if declared_length(&parts.headers).is_some_and(|len| len > state.max_body_bytes) {
        warn!("[http] declared body exceeds limit");
        return respond(StatusCode::PAYLOAD_TOO_LARGE, current(), Body::empty());
    }

    let bytes = match tokio::time::timeout(state.body_timeout, body::to_bytes(body, state.max_body_bytes)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!("[http] body rejected: {}", e);
            return respond(StatusCode::PAYLOAD_TOO_LARGE, current(), Body::empty());
        }
        Err(_) => {
            warn!(timeout = ?state.body_timeout, "[http] body read timed out");
            return respond(StatusCode::REQUEST_TIMEOUT, current(), Body::empty());
        }
    };

    let outcome = state
        .coordinator
        .ingest(UpdateRequest {
            foreign_clock,
            body: bytes.to_vec(),
        })
        .await;

    let status = match outcome.status {
        UpdateStatus::Created => StatusCode::CREATED,
        UpdateStatus::Ok => StatusCode::OK,
        UpdateStatus::NoContent => StatusCode::NO_CONTENT,
        UpdateStatus::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
        UpdateStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    respond(status, outcome.clock, Body::empty())
}

fn handle_get(state: &AppState) -> Response {
    let outcome = state.coordinator.query();
    let mut response = respond(
        StatusCode::OK,
        outcome.clock,
        Body::from(payload::encode_snapshot(&outcome.readings)),
    );
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// `Ok(None)` when absent, `Err(raw)` when present but not an unsigned
/// integer within `MAX_CLOCK`.
fn foreign_clock(headers: &HeaderMap) -> Result<Option<u64>, String> {
    let Some(value) = headers.get(LAMPORT_CLOCK_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(parse_clock)
        .map(Some)
        .ok_or_else(|| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

fn respond(status: StatusCode, clock: u64, body: Body) -> Response {
    (
        status,
        [
            (HeaderName::from_static(LAMPORT_CLOCK_HEADER), clock.to_string()),
            (CONNECTION, "close".to_string()),
        ],
        body,
    )
        .into_response()
}
