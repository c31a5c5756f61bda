use crate::config::ScorerConfig;
use crate::SpeechScorer;

/// RMS of a float frame in [-1, 1].
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / frame.len() as f64).sqrt() as f32
}

pub fn rms_to_dbfs(rms: f32) -> f32 {
    if rms <= 1e-10 {
        return -100.0;
    }
    20.0 * rms.log10()
}

pub fn frame_dbfs(frame: &[f32]) -> f32 {
    rms_to_dbfs(rms(frame))
}

/// Energy-threshold heuristic scorer. Stateless; used both as the permanent
/// fallback when the model backend fails and as a standalone scorer where no
/// model is compiled in.
pub struct EnergyScorer {
    speech_dbfs: f32,
    speech_probability: f32,
}

impl EnergyScorer {
    pub fn new(config: &ScorerConfig) -> Self {
        Self {
            speech_dbfs: config.energy_speech_dbfs,
            speech_probability: config.fallback_speech_probability,
        }
    }
}

impl SpeechScorer for EnergyScorer {
    fn score(&mut self, frame: &[f32]) -> f32 {
        if frame_dbfs(frame) > self.speech_dbfs {
            self.speech_probability
        } else {
            0.0
        }
    }

    fn reset(&mut self) {}
}
