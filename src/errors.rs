use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown prompt format `{0}`")]
    InvalidFormat(String),
    #[error("invalid backend entry `{0}`, expected `url` or `url=format`")]
    InvalidBackend(String),
    #[error("no backends configured")]
    NoBackends,
    #[error("invalid listen address `{0}`")]
    InvalidListenAddr(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Gateway(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => make_error_response(StatusCode::BAD_REQUEST, message),
            AppError::Gateway(message) => make_error_response(StatusCode::BAD_GATEWAY, message),
            AppError::Internal(message) => {
                make_error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

fn make_error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
