use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Probability at or above which a frame counts as voiced.
    pub activation_threshold: f32,
    /// Frames with RMS energy below this gate short-circuit to probability
    /// 0 without invoking the model.
    pub noise_gate_dbfs: f32,
    /// RMS level (dBFS) above which the energy fallback reports speech.
    pub energy_speech_dbfs: f32,
    /// Probability the energy fallback reports for frames above
    /// `energy_speech_dbfs`.
    pub fallback_speech_probability: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 0.5,
            noise_gate_dbfs: -55.0,
            energy_speech_dbfs: -38.0,
            fallback_speech_probability: 0.8,
        }
    }
}

impl ScorerConfig {
    pub fn clean_speech() -> Self {
        Self {
            activation_threshold: 0.4,
            noise_gate_dbfs: -60.0,
            ..Default::default()
        }
    }

    pub fn noisy_environment() -> Self {
        Self {
            activation_threshold: 0.6,
            noise_gate_dbfs: -50.0,
            energy_speech_dbfs: -32.0,
            ..Default::default()
        }
    }
}
