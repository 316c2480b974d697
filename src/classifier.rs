use crate::models::RoundOutcome;

/// Whether a finished round ended the generation or the loop should issue
/// another chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    NaturalStop,
    Continue,
}

/// Classifies one round from observable signals only. The order matters:
///
/// 1. no stop flag → the chunk boundary, not the model, ended the round;
/// 2. stop flag with an under-filled budget → the model genuinely finished;
/// 3. stop flag with the budget fully consumed → finished only if the text
///    ends on a known end-of-sequence marker, otherwise the stop was the
///    requested limit and generation continues.
pub fn classify_round(outcome: &RoundOutcome, end_markers: &[String]) -> StopDecision {
    if !outcome.stop_flagged {
        return StopDecision::Continue;
    }

    if outcome.content_fragments < outcome.requested_fragments {
        return StopDecision::NaturalStop;
    }

    let trimmed = outcome.generated_text.trim();
    if end_markers
        .iter()
        .any(|marker| trimmed.ends_with(marker.as_str()))
    {
        StopDecision::NaturalStop
    } else {
        StopDecision::Continue
    }
}
