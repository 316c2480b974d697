use tracing::warn;

use crate::models::{BackendEvent, RoundOutcome};

const EVENT_PREFIX: &str = "data: ";

/// Per-round relay: forwards recognized event lines to the client and, only
/// after forwarding, interprets their payloads to accumulate the round's
/// outcome. A payload that fails to parse is skipped for accumulation, but
/// the client has already received the line; interpretation never withholds
/// or delays a frame.
#[derive(Debug)]
pub struct RoundRelay {
    requested_fragments: u32,
    generated_text: String,
    content_fragments: u32,
    last_stop: bool,
}

impl RoundRelay {
    pub fn new(requested_fragments: u32) -> Self {
        Self {
            requested_fragments,
            generated_text: String::new(),
            content_fragments: 0,
            last_stop: false,
        }
    }

    /// Handles one backend line. Returns the frame to send to the client, or
    /// `None` for lines that are not event lines.
    pub fn on_line(&mut self, line: &str) -> Option<String> {
        let payload = line.strip_prefix(EVENT_PREFIX)?;
        let frame = format!("{line}\n\n");

        match serde_json::from_str::<BackendEvent>(payload) {
            Ok(event) => {
                self.last_stop = event.stop;
                if !event.content.is_empty() {
                    self.generated_text.push_str(&event.content);
                    self.content_fragments += 1;
                }
            }
            Err(error) => {
                warn!(%error, payload, "skipping unparseable backend event");
            }
        }

        Some(frame)
    }

    pub fn finish(self) -> RoundOutcome {
        RoundOutcome {
            generated_text: self.generated_text,
            content_fragments: self.content_fragments,
            requested_fragments: self.requested_fragments,
            stop_flagged: self.last_stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_event_lines_verbatim_with_record_separator() {
        let mut relay = RoundRelay::new(5);
        let line = r#"data: {"content":"hel","stop":false}"#;
        assert_eq!(relay.on_line(line), Some(format!("{line}\n\n")));
    }

    #[test]
    fn ignores_lines_without_the_event_prefix() {
        let mut relay = RoundRelay::new(5);
        assert_eq!(relay.on_line(": keep-alive"), None);
        assert_eq!(relay.on_line("event: message"), None);
        let outcome = relay.finish();
        assert_eq!(outcome.content_fragments, 0);
        assert!(!outcome.stop_flagged);
    }

    #[test]
    fn accumulates_content_fragments_and_last_stop_flag() {
        let mut relay = RoundRelay::new(3);
        relay.on_line(r#"data: {"content":"a","stop":false}"#);
        relay.on_line(r#"data: {"content":"","stop":false}"#);
        relay.on_line(r#"data: {"content":"b","stop":true}"#);

        let outcome = relay.finish();
        assert_eq!(outcome.generated_text, "ab");
        assert_eq!(outcome.content_fragments, 2); // empty content is not a fragment
        assert_eq!(outcome.requested_fragments, 3);
        assert!(outcome.stop_flagged);
    }

    #[test]
    fn malformed_payload_is_forwarded_but_not_accumulated() {
        let mut relay = RoundRelay::new(2);
        relay.on_line(r#"data: {"content":"ok","stop":true}"#);
        let frame = relay.on_line("data: [DONE");
        assert_eq!(frame, Some("data: [DONE\n\n".to_owned()));

        let outcome = relay.finish();
        assert_eq!(outcome.generated_text, "ok");
        assert_eq!(outcome.content_fragments, 1);
        // the malformed line did not overwrite the last parsed stop flag
        assert!(outcome.stop_flagged);
    }
}
