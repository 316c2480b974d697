use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::transport::{ChunkTransport, LineStream, TransportError};

/// What one scripted round replies with.
#[derive(Debug)]
pub enum ScriptedRound {
    /// A successful round streaming these lines, then closing.
    Lines(Vec<String>),
    /// The round fails before any line is delivered.
    Fail(TransportError),
}

/// One recorded sub-request, for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub payload: Value,
}

/// Scripted transport double: replays one `ScriptedRound` per `open_stream`
/// call and records every sub-request it saw. A call past the end of the
/// script fails as unreachable.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    rounds: Mutex<Vec<ScriptedRound>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(rounds: Vec<ScriptedRound>) -> Self {
        let mut rounds = rounds;
        rounds.reverse();
        Self {
            rounds: Mutex::new(rounds),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChunkTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        url: &str,
        payload: &Value,
    ) -> Result<LineStream, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                url: url.to_owned(),
                payload: payload.clone(),
            });
        }

        let round = self
            .rounds
            .lock()
            .map(|mut rounds| rounds.pop())
            .unwrap_or_default();

        match round {
            None => Err(TransportError::Unreachable(
                "transport script exhausted".to_owned(),
            )),
            Some(ScriptedRound::Fail(error)) => Err(error),
            Some(ScriptedRound::Lines(lines)) => {
                let (tx, rx) = mpsc::channel(32);
                tokio::spawn(async move {
                    for line in lines {
                        if tx.send(Ok(line)).await.is_err() {
                            return;
                        }
                    }
                });
                Ok(ReceiverStream::new(rx).boxed())
            }
        }
    }
}
