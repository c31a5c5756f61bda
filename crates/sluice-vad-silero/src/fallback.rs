use sluice_vad::{EnergyScorer, ScorerConfig, SpeechScorer};

#[cfg(feature = "silero")]
use crate::silero_scorer::SileroScorer;

enum Backend {
    #[cfg(feature = "silero")]
    Silero(SileroScorer),
    Energy(EnergyScorer),
}

/// Runtime-switchable scorer. Prefers the Silero model; if the model fails
/// to initialize, or errors at runtime, the handle permanently switches to
/// the energy heuristic for the remainder of the session. The switch is
/// one-way so the engine never thrashes between inference paths.
pub struct ScorerHandle {
    backend: Backend,
    #[cfg_attr(not(feature = "silero"), allow(dead_code))]
    config: ScorerConfig,
    fallback_engaged: bool,
}

impl ScorerHandle {
    pub fn new(config: ScorerConfig) -> Self {
        #[cfg(feature = "silero")]
        {
            match SileroScorer::new(config.clone()) {
                Ok(scorer) => {
                    return Self {
                        backend: Backend::Silero(scorer),
                        config,
                        fallback_engaged: false,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        "Silero scorer unavailable, using energy heuristic: {}",
                        e
                    );
                }
            }
        }

        let energy = EnergyScorer::new(&config);
        Self {
            backend: Backend::Energy(energy),
            config,
            fallback_engaged: true,
        }
    }

    /// True once the handle has degraded to the energy heuristic.
    pub fn fallback_engaged(&self) -> bool {
        self.fallback_engaged
    }

    #[cfg(feature = "silero")]
    fn engage_fallback(&mut self, reason: &str) -> f32 {
        tracing::warn!(
            "Scorer degraded to energy heuristic for the rest of the session: {}",
            reason
        );
        self.backend = Backend::Energy(EnergyScorer::new(&self.config));
        self.fallback_engaged = true;
        0.0
    }
}

impl SpeechScorer for ScorerHandle {
    fn score(&mut self, frame: &[f32]) -> f32 {
        #[cfg(feature = "silero")]
        let failure = match &mut self.backend {
            Backend::Silero(scorer) => match scorer.try_score(frame) {
                Ok(p) => return p,
                Err(e) => e,
            },
            Backend::Energy(scorer) => return scorer.score(frame),
        };
        #[cfg(feature = "silero")]
        return self.engage_fallback(&failure);

        #[cfg(not(feature = "silero"))]
        match &mut self.backend {
            Backend::Energy(scorer) => scorer.score(frame),
        }
    }

    fn reset(&mut self) {
        match &mut self.backend {
            #[cfg(feature = "silero")]
            Backend::Silero(scorer) => scorer.reset(),
            Backend::Energy(scorer) => scorer.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_vad::constants::FRAME_SIZE_SAMPLES;

    fn loud_frame() -> Vec<f32> {
        (0..FRAME_SIZE_SAMPLES)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / 64.0;
                phase.sin() * 0.5
            })
            .collect()
    }

    #[cfg(not(feature = "silero"))]
    #[test]
    fn without_model_the_handle_is_energy_backed() {
        let mut handle = ScorerHandle::new(ScorerConfig::default());
        assert!(handle.fallback_engaged());
        assert_eq!(handle.score(&loud_frame()), 0.8);
        assert_eq!(handle.score(&vec![0.0; FRAME_SIZE_SAMPLES]), 0.0);
    }

    #[cfg(feature = "silero")]
    #[test]
    fn model_backend_starts_without_fallback() {
        let handle = ScorerHandle::new(ScorerConfig::default());
        assert!(!handle.fallback_engaged());
    }

    #[cfg(feature = "silero")]
    #[test]
    fn runtime_error_flips_permanently_to_energy() {
        let mut handle = ScorerHandle::new(ScorerConfig::default());
        // A malformed frame is the observable runtime failure path.
        let bad = vec![0.0f32; FRAME_SIZE_SAMPLES - 1];
        handle.score(&bad);
        assert!(handle.fallback_engaged());
        // Still degraded on well-formed frames afterwards.
        assert_eq!(handle.score(&loud_frame()), 0.8);
        assert!(handle.fallback_engaged());
    }

    #[test]
    fn reset_does_not_resurrect_the_model() {
        let mut handle = ScorerHandle::new(ScorerConfig::default());
        #[cfg(feature = "silero")]
        handle.score(&vec![0.0f32; FRAME_SIZE_SAMPLES - 1]);
        let engaged_before = handle.fallback_engaged();
        handle.reset();
        assert_eq!(handle.fallback_engaged(), engaged_before);
    }
}
