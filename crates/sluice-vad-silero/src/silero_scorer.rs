use sluice_vad::constants::{FRAME_SIZE_SAMPLES, SUB_WINDOW_SAMPLES};
use sluice_vad::energy::frame_dbfs;
use sluice_vad::ScorerConfig;
use voice_activity_detector::VoiceActivityDetector;

#[derive(Copy, Clone, Default)]
struct FrameSample(f32);

impl voice_activity_detector::Sample for FrameSample {
    fn to_f32(self) -> f32 {
        self.0
    }
}

/// Silero VAD scorer. Owns the model's recurrent state; callers only see a
/// per-frame probability. Frames below the noise gate never reach the model.
pub struct SileroScorer {
    detector: VoiceActivityDetector,
    config: ScorerConfig,
    frames_processed: u64,
    last_probability: f32,
}

impl SileroScorer {
    pub fn new(config: ScorerConfig) -> Result<Self, String> {
        let detector = VoiceActivityDetector::builder()
            .sample_rate(16000)
            .chunk_size(SUB_WINDOW_SAMPLES)
            .build()
            .map_err(|e| format!("Failed to create Silero VAD: {}", e))?;

        Ok(Self {
            detector,
            config,
            frames_processed: 0,
            last_probability: 0.0,
        })
    }

    /// Fallible scoring path. The `ScorerHandle` wrapper converts the first
    /// runtime error into a permanent switch to the energy heuristic.
    pub fn try_score(&mut self, frame: &[f32]) -> Result<f32, String> {
        if frame.len() != FRAME_SIZE_SAMPLES {
            return Err(format!(
                "Silero scorer requires {} samples, got {}",
                FRAME_SIZE_SAMPLES,
                frame.len()
            ));
        }

        self.frames_processed += 1;

        if frame_dbfs(frame) < self.config.noise_gate_dbfs {
            self.last_probability = 0.0;
            return Ok(0.0);
        }

        // Max sub-window probability: short bursts at a frame edge should
        // not be diluted by averaging over the whole frame.
        let mut probability = 0.0f32;
        for window in frame.chunks_exact(SUB_WINDOW_SAMPLES) {
            let p = self.detector.predict(window.iter().map(|&s| FrameSample(s)));
            probability = probability.max(p);
        }

        self.last_probability = probability;
        Ok(probability)
    }

    pub fn reset(&mut self) {
        self.detector.reset();
        self.frames_processed = 0;
        self.last_probability = 0.0;
    }

    pub fn last_probability(&self) -> f32 {
        self.last_probability
    }
}
