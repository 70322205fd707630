/// Route handlers for the gateway front door.
///
/// Endpoint behaviour mirrors the privacy contract: outer-envelope failures
/// (bad method, bad content type, decapsulation failure, unknown key) map to
/// status codes, everything else is sealed and returns 200. Descriptive
/// error bodies are only written in debug mode.
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;
use serde::Serialize;

use super::AppState;
use crate::error::GatewayError;
use crate::metrics::{MetricsResult, GATEWAY_REQUEST_EVENT};

/// Content type of an encapsulated request body.
pub const REQUEST_CONTENT_TYPE: &str = "message/ohttp-req";
/// Content type of an encapsulated response body.
pub const RESPONSE_CONTENT_TYPE: &str = "message/ohttp-res";
/// Content type of the marshalled key configurations.
pub const CONFIG_CONTENT_TYPE: &str = "application/ohttp-keys";

const TWELVE_HOURS_SECS: u64 = 12 * 60 * 60;
const TWENTY_FOUR_HOURS_SECS: u64 = 24 * 60 * 60;

/// Health check response.
#[derive(Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Cache lifetime for the config endpoint: uniform in [12 h, 36 h).
///
/// Randomised so client refetches do not synchronise across the population;
/// injectable RNG keeps it testable.
fn config_max_age(rng: &mut impl Rng) -> u64 {
    rng.gen_range(TWELVE_HOURS_SECS..TWELVE_HOURS_SECS + TWENTY_FOUR_HOURS_SECS)
}

/// GET /ohttp-configs — the advertised public key configurations.
pub(super) async fn config(State(state): State<Arc<AppState>>) -> Response {
    let max_age = config_max_age(&mut rand::thread_rng());
    (
        [
            (header::CONTENT_TYPE, CONFIG_CONTENT_TYPE.to_string()),
            (
                header::CACHE_CONTROL,
                format!("max-age={max_age}, private"),
            ),
        ],
        state.gateway.registry().marshal_public(),
    )
        .into_response()
}

/// POST on any configured encapsulation endpoint.
pub(super) async fn gateway(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(handler) = state.handlers.get(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut event = state.metrics.create(GATEWAY_REQUEST_EVENT);

    if method != Method::POST {
        event.fire(MetricsResult::InvalidMethod);
        return error_response(
            StatusCode::BAD_REQUEST,
            state.debug_response,
            format!("Invalid method: {method}"),
        );
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != REQUEST_CONTENT_TYPE {
        event.fire(MetricsResult::InvalidContentType);
        return error_response(
            StatusCode::BAD_REQUEST,
            state.debug_response,
            format!("Invalid content type: {content_type}"),
        );
    }

    match handler.handle(&body, &mut event).await {
        Ok(sealed) => {
            if !event.is_fired() {
                event.fire(MetricsResult::Success);
            }
            (
                [(header::CONTENT_TYPE, RESPONSE_CONTENT_TYPE)],
                sealed,
            )
                .into_response()
        }
        Err(err) => {
            let (status, result) = translate_error(&err);
            event.fire(result);
            error_response(status, state.debug_response, err.to_string())
        }
    }
}

/// Outer-envelope error translation, per the privacy contract.
fn translate_error(err: &GatewayError) -> (StatusCode, MetricsResult) {
    match err {
        GatewayError::UnknownKey(_) => (
            StatusCode::UNAUTHORIZED,
            MetricsResult::ConfigurationMismatch,
        ),
        _ => (StatusCode::BAD_REQUEST, MetricsResult::DecapsulationFailed),
    }
}

fn error_response(status: StatusCode, debug: bool, message: String) -> Response {
    if debug {
        (status, message).into_response()
    } else {
        status.into_response()
    }
}
