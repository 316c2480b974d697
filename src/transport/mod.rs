pub mod http;
pub mod mock;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Lines of a backend's streamed reply, newline framing already removed.
pub type LineStream = BoxStream<'static, Result<String, TransportError>>;

/// The seam between the completion loop and the network: opens one streamed
/// sub-request and yields the reply line by line. Mocked in tests.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn open_stream(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<LineStream, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend stream failed: {0}")]
    Stream(String),
}
