use serde::Deserialize;
use serde_json::{Map, Value};

/// Inbound body of `POST /completion`. Only the fields the proxy itself acts
/// on are named; every other field (sampler settings, grammar, stop strings,
/// whatever the client sends) is captured opaquely and replayed unmodified on
/// every sub-request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub n_predict: Option<i64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub sampler: Map<String, Value>,
}

impl CompletionRequest {
    /// Effective generation target. `-1` is the client's "unbounded" sentinel
    /// and is capped at the configured default, as is an absent field; any
    /// other negative value yields an empty generation.
    pub fn effective_target(&self, default_cap: u32) -> u32 {
        match self.n_predict {
            None | Some(-1) => default_cap,
            Some(value) if value < 0 => 0,
            Some(value) => u32::try_from(value).unwrap_or(u32::MAX),
        }
    }

    /// Builds one sub-request body: the opaque fields verbatim, `prompt`
    /// replaced by the backend-wire rendering of the accumulated prompt,
    /// `n_predict` set to the chunk size, and `stream` forced on.
    pub fn chunk_payload(&self, wire_prompt: String, chunk_size: u32) -> Value {
        let mut body = self.sampler.clone();
        body.insert("prompt".to_owned(), Value::String(wire_prompt));
        body.insert("n_predict".to_owned(), Value::from(chunk_size));
        body.insert("stream".to_owned(), Value::Bool(true));
        Value::Object(body)
    }
}

/// One parsed backend event payload. Unknown fields are ignored; `content`
/// and `stop` default when absent so sparse events still parse.
#[derive(Debug, Default, Deserialize)]
pub struct BackendEvent {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub stop: bool,
}

/// What one backend round produced, handed to the stop classifier and then
/// discarded.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub generated_text: String,
    pub content_fragments: u32,
    pub requested_fragments: u32,
    pub stop_flagged: bool,
}

/// Terminal states of the completion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    NaturalStop,
    LimitReached,
    BackendError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from(json: &str) -> CompletionRequest {
        serde_json::from_str(json).expect("request should parse")
    }

    #[test]
    fn unbounded_sentinel_and_absent_field_fall_back_to_default_cap() {
        assert_eq!(
            request_from(r#"{"prompt":"x","n_predict":-1}"#).effective_target(100),
            100
        );
        assert_eq!(request_from(r#"{"prompt":"x"}"#).effective_target(100), 100);
    }

    #[test]
    fn explicit_target_is_honored() {
        assert_eq!(
            request_from(r#"{"prompt":"x","n_predict":42}"#).effective_target(100),
            42
        );
    }

    #[test]
    fn other_negative_targets_generate_nothing() {
        assert_eq!(
            request_from(r#"{"prompt":"x","n_predict":-7}"#).effective_target(100),
            0
        );
    }

    #[test]
    fn chunk_payload_preserves_opaque_fields_and_forces_stream() {
        let request = request_from(
            r#"{"prompt":"once","n_predict":64,"stream":true,"temperature":0.8,"top_k":40}"#,
        );
        let payload = request.chunk_payload("once upon".to_owned(), 9);

        assert_eq!(payload["prompt"], "once upon");
        assert_eq!(payload["n_predict"], 9);
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["temperature"], 0.8);
        assert_eq!(payload["top_k"], 40);
    }

    #[test]
    fn backend_event_defaults_missing_fields() {
        let event: BackendEvent = serde_json::from_str(r#"{"tokens_cached": 3}"#)
            .expect("sparse event should parse");
        assert_eq!(event.content, "");
        assert!(!event.stop);
    }
}
