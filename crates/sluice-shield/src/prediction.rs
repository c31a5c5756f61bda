use std::time::{Duration, Instant};

/// Hybrid prediction of when the remote party will finish speaking.
///
/// `Guessing` is the blind phase before any inbound audio: the expected wait
/// is an estimate for diagnostics and timeout bookkeeping only, and never
/// feeds the shield's release condition. `Confirmed` tracks a rolling window
/// that extends on every inbound frame; once the window lapses the remote is
/// treated as implicitly done. `Settled` is the explicit turn-complete
/// signal and always satisfies the qualifying-signal clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPrediction {
    Guessing { expected_wait: Duration },
    Confirmed { last_inbound: Instant },
    Settled,
}

impl TurnPrediction {
    /// Blind estimate for a fresh turn, from the length of the utterance the
    /// local speaker just finished.
    pub fn guess_for_utterance(utterance: Duration) -> Self {
        TurnPrediction::Guessing {
            expected_wait: expected_response_wait(utterance),
        }
    }

    pub fn idle() -> Self {
        TurnPrediction::Guessing {
            expected_wait: Duration::ZERO,
        }
    }

    pub fn on_inbound(&mut self, now: Instant) {
        // A late audio tail after the explicit signal does not un-settle.
        if !matches!(self, TurnPrediction::Settled) {
            *self = TurnPrediction::Confirmed { last_inbound: now };
        }
    }

    pub fn on_turn_complete(&mut self) {
        *self = TurnPrediction::Settled;
    }

    /// Whether the rolling window has lapsed, declaring an implicit
    /// end-of-turn. `window` is the shield's current silence tolerance.
    pub fn implicitly_done(&self, now: Instant, window: Duration) -> bool {
        match self {
            TurnPrediction::Confirmed { last_inbound } => {
                now.saturating_duration_since(*last_inbound) >= window
            }
            _ => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, TurnPrediction::Settled)
    }
}

/// Nonlinear expected-response estimate: a fixed safety margin plus a
/// sublinear term in the utterance length, capped so pathological
/// monologues do not produce absurd timeouts.
pub fn expected_response_wait(utterance: Duration) -> Duration {
    let secs = utterance.as_secs_f64();
    let wait_ms = 1_200.0 + 350.0 * secs.powf(0.75);
    Duration::from_millis(wait_ms.min(8_000.0) as u64)
}
