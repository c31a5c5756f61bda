pub mod config;
pub mod constants;
pub mod energy;

pub use config::ScorerConfig;
pub use constants::{CAPTURE_SAMPLE_RATE_HZ, FRAME_DURATION_MS, FRAME_SIZE_SAMPLES};
pub use energy::EnergyScorer;

use std::sync::Arc;
use std::time::Instant;

/// One captured microphone frame: fixed-length mono PCM in [-1, 1].
/// Immutable once produced; cloning shares the sample storage.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Arc<[f32]>,
    pub timestamp: Instant,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, timestamp: Instant, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            timestamp,
            sample_rate,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Frame-level speech probability scorer.
///
/// Implementations may keep recurrent state across frames; `reset` returns
/// them to their session-start state. Scoring is infallible to callers:
/// backends that can fail internally are wrapped so degradation never
/// surfaces here.
pub trait SpeechScorer: Send {
    /// Probability in [0, 1] that the frame contains speech.
    fn score(&mut self, frame: &[f32]) -> f32;

    fn reset(&mut self);
}
