use std::{convert::Infallible, time::Instant};

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tracing::warn;

use crate::{
    errors::AppError, models::CompletionRequest, passthrough, scheduler, state::AppState,
};

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(error) => AppError::Internal(format!("metrics render failed: {error}")).into_response(),
    }
}

/// `POST /completion`. The body is read manually: a non-streaming request is
/// replayed verbatim through the passthrough, a streaming one starts the
/// chunked completion loop.
pub async fn completion(State(state): State<AppState>, request: Request) -> Response {
    let started = Instant::now();
    let _inflight = state.metrics.inflight_guard();

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            return AppError::BadRequest(format!("unreadable request body: {error}"))
                .into_response();
        }
    };

    let parsed: CompletionRequest = match serde_json::from_slice(&bytes) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(%error, "rejecting malformed completion body");
            let response =
                AppError::BadRequest(format!("invalid JSON body: {error}")).into_response();
            state.metrics.observe_request(
                "/completion",
                "POST",
                false,
                response.status().as_u16(),
                started.elapsed(),
            );
            return response;
        }
    };

    let streaming = parsed.stream;
    let response = if streaming {
        stream_completion_response(state.clone(), parsed)
    } else {
        passthrough::forward_parts(&state, parts, bytes).await
    };

    state.metrics.observe_request(
        "/completion",
        "POST",
        streaming,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

fn stream_completion_response(state: AppState, request: CompletionRequest) -> Response {
    let outbound = scheduler::blended_completion(state, request).map(Ok::<_, Infallible>);

    match Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(outbound))
    {
        Ok(response) => response,
        Err(error) => {
            AppError::Internal(format!("stream response build failed: {error}")).into_response()
        }
    }
}
