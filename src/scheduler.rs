use futures_util::{Stream, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    classifier::{classify_round, StopDecision},
    models::{CompletionRequest, LoopExit},
    random::RandomSource,
    relay::RoundRelay,
    state::AppState,
};

/// Per-request generation state, owned by the loop and destroyed with it.
/// `prompt` is append-only across rounds; `tokens_generated` counts requested
/// budget, not literally emitted tokens, and never exceeds `target_tokens`.
#[derive(Debug)]
struct GenerationSession {
    prompt: String,
    tokens_generated: u32,
    target_tokens: u32,
    round_index: u32,
}

/// Bounded size for the next chunk: the configured granularity plus jitter,
/// clamped to what is left of the budget.
pub fn chunk_size(remaining: u32, base: u32, random: &dyn RandomSource) -> u32 {
    remaining.min(base.saturating_add(random.chunk_jitter(base)))
}

/// Drives one blended completion: picks a backend per round, issues a bounded
/// sub-request, relays the backend's event lines to the client as they
/// arrive, and keeps going until the budget is consumed, the classifier sees
/// a natural stop, or a backend fails. Yields the client-facing frames.
pub fn blended_completion(
    state: AppState,
    request: CompletionRequest,
) -> impl Stream<Item = String> + Send {
    async_stream::stream! {
        let settings = state.settings.clone();
        let session_id = format!("gen_{}", Uuid::new_v4());
        let target = request.effective_target(settings.default_predict);
        if matches!(request.n_predict, None | Some(-1)) {
            info!(
                session = %session_id,
                cap = settings.default_predict,
                "client asked for unbounded generation, capping at default"
            );
        }

        let mut session = GenerationSession {
            prompt: request.prompt.clone(),
            tokens_generated: 0,
            target_tokens: target,
            round_index: 0,
        };
        info!(
            session = %session_id,
            target,
            chunk_base = settings.chunk_base,
            "blended completion started"
        );

        let exit = loop {
            if session.tokens_generated >= session.target_tokens {
                break LoopExit::LimitReached;
            }

            let backend = state.registry.pick(state.random.as_ref());
            let remaining = session.target_tokens - session.tokens_generated;
            let chunk = chunk_size(remaining, settings.chunk_base, state.random.as_ref());
            let payload = request.chunk_payload(backend.format.to_wire(&session.prompt), chunk);
            debug!(
                session = %session_id,
                round = session.round_index,
                backend = %backend.address,
                format = backend.format.as_str(),
                chunk,
                remaining,
                "issuing chunk sub-request"
            );

            let mut lines = match state
                .transport
                .open_stream(&backend.completion_url(), &payload)
                .await
            {
                Ok(lines) => lines,
                Err(error) => {
                    warn!(
                        session = %session_id,
                        backend = %backend.address,
                        %error,
                        "chunk sub-request failed"
                    );
                    state.metrics.observe_backend_error("round_open");
                    yield error_frame(&format!(
                        "failed to reach backend {}: {error}",
                        backend.address
                    ));
                    break LoopExit::BackendError;
                }
            };
            state.metrics.observe_round(&backend.address, chunk);

            let mut relay = RoundRelay::new(chunk);
            let mut round_failed = false;
            while let Some(next) = lines.next().await {
                match next {
                    Ok(line) => {
                        if let Some(frame) = relay.on_line(&line) {
                            yield frame;
                        }
                    }
                    Err(error) => {
                        warn!(
                            session = %session_id,
                            backend = %backend.address,
                            %error,
                            "backend stream broke mid-round"
                        );
                        state.metrics.observe_backend_error("round_stream");
                        yield error_frame(&format!(
                            "backend {} stream failed: {error}",
                            backend.address
                        ));
                        round_failed = true;
                        break;
                    }
                }
            }
            if round_failed {
                break LoopExit::BackendError;
            }

            let outcome = relay.finish();
            if !outcome.generated_text.is_empty() {
                session.prompt.push_str(&outcome.generated_text);
                session.tokens_generated += chunk;
            }
            session.round_index += 1;

            let decision = classify_round(&outcome, &settings.end_markers);
            debug!(
                session = %session_id,
                round = session.round_index,
                fragments = outcome.content_fragments,
                requested = outcome.requested_fragments,
                stop = outcome.stop_flagged,
                decision = ?decision,
                "round classified"
            );
            if decision == StopDecision::NaturalStop {
                break LoopExit::NaturalStop;
            }
        };

        info!(
            session = %session_id,
            rounds = session.round_index,
            tokens = session.tokens_generated,
            exit = ?exit,
            "blended completion finished"
        );
    }
}

/// The one synthetic frame the proxy itself ever injects into the stream.
fn error_frame(message: &str) -> String {
    format!("data: {}\n\n", json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SequenceRandom;

    #[test]
    fn chunk_is_clamped_to_the_remaining_budget() {
        // target 10 with base 15: even maximum jitter cannot push past 10
        let random = SequenceRandom::new(vec![], vec![15]);
        assert_eq!(chunk_size(10, 15, &random), 10);
    }

    #[test]
    fn chunk_uses_base_plus_jitter_when_budget_allows() {
        let random = SequenceRandom::new(vec![], vec![7]);
        assert_eq!(chunk_size(100, 15, &random), 22);
    }

    #[test]
    fn zero_jitter_requests_exactly_the_base() {
        let random = SequenceRandom::new(vec![], vec![0]);
        assert_eq!(chunk_size(100, 15, &random), 15);
    }

    #[test]
    fn error_frame_is_a_single_event_line() {
        let frame = error_frame("boom");
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert!(frame.contains("\"error\":\"boom\""));
    }
}
