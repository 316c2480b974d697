use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::transport::{ChunkTransport, LineStream, TransportError};

/// Real transport: one `POST` per chunk, reply consumed as a byte stream and
/// re-framed into lines.
#[derive(Clone)]
pub struct HttpLineTransport {
    client: reqwest::Client,
}

impl HttpLineTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChunkTransport for HttpLineTransport {
    async fn open_stream(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<LineStream, TransportError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|error| TransportError::Unreachable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown backend error".to_owned());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(400).collect(),
            });
        }

        let mut upstream = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = LineDecoder::default();
            while let Some(next) = upstream.next().await {
                match next {
                    Ok(bytes) => {
                        for line in decoder.push(&bytes) {
                            yield Ok(line);
                        }
                    }
                    Err(error) => {
                        yield Err(TransportError::Stream(error.to_string()));
                        break;
                    }
                }
            }
            if let Some(line) = decoder.finish() {
                yield Ok(line);
            }
        };

        debug!(url, "chunk stream opened");
        Ok(stream.boxed())
    }
}

/// Re-frames an arbitrary byte-chunked stream into newline-delimited lines.
/// Buffers raw bytes, so a UTF-8 sequence split across network chunks is
/// reassembled intact; blank lines (the event-stream record separators) are
/// dropped.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(index) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut raw: Vec<u8> = self.buffer.drain(..=index).collect();
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            if let Some(line) = decode_line(raw) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flushes a trailing line the backend never terminated.
    pub fn finish(mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        decode_line(raw)
    }
}

fn decode_line(raw: Vec<u8>) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    match String::from_utf8(raw) {
        Ok(line) => Some(line),
        Err(error) => {
            warn!(%error, "dropped non-utf8 line from backend stream");
            None
        }
    }
}
