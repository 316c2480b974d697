use std::time::Instant;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::{errors::AppError, state::AppState};

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Response headers that describe the hop, not the payload.
const HOP_BY_HOP_HEADERS: [&str; 4] = [
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
];

/// Fallback handler: any request the proxy has no opinion about is forwarded
/// verbatim to the primary backend.
pub async fn forward(State(state): State<AppState>, request: Request) -> Response {
    let started = Instant::now();
    let _inflight = state.metrics.inflight_guard();
    let method = request.method().to_string();

    let (parts, body) = request.into_parts();
    let response = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => forward_parts(&state, parts, bytes).await,
        Err(error) => AppError::BadRequest(format!("unreadable request body: {error}"))
            .into_response(),
    };

    state.metrics.observe_request(
        "passthrough",
        &method,
        false,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

/// Replays an already-read request against the primary backend and streams
/// the reply back with hop-by-hop headers stripped. The backend's status is
/// returned verbatim; only an unreachable backend maps to a gateway error.
pub async fn forward_parts(state: &AppState, parts: Parts, body: Bytes) -> Response {
    let primary = state.registry.primary();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", primary.address, path_and_query);

    let mut headers = parts.headers.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    debug!(%url, method = %parts.method, "passthrough forwarding");
    let upstream = match state
        .http
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(upstream) => upstream,
        Err(error) => {
            warn!(%url, %error, "passthrough backend unreachable");
            state.metrics.observe_backend_error("passthrough");
            return AppError::Gateway(format!(
                "error reaching backend {}: {error}",
                primary.address
            ))
            .into_response();
        }
    };

    let status = upstream.status();
    let mut builder = Response::builder().status(status);
    if let Some(response_headers) = builder.headers_mut() {
        for (name, value) in upstream.headers() {
            let dropped = HOP_BY_HOP_HEADERS
                .iter()
                .any(|hop| name.as_str().eq_ignore_ascii_case(hop));
            if !dropped {
                response_headers.append(name.clone(), value.clone());
            }
        }
    }

    match builder.body(Body::from_stream(upstream.bytes_stream())) {
        Ok(response) => response,
        Err(error) => {
            AppError::Internal(format!("passthrough response build failed: {error}"))
                .into_response()
        }
    }
}
