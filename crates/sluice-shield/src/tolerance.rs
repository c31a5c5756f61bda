use crate::config::ShieldConfig;

/// Hydraulic silence-tolerance controller.
///
/// Converts outbound pressure (dam depth), inbound pressure (renderer
/// backlog) and speech momentum into the silence duration required before a
/// speech segment counts as finished. Evaluated every tick; the only memory
/// between ticks is the stored tolerance (the soft-landing rule halves it
/// relative to its previous value) and the value held when the squeeze
/// override engaged.
pub struct ToleranceController {
    config: ShieldConfig,
    tolerance_ms: f32,
    squeeze_entry_ms: Option<f32>,
}

impl ToleranceController {
    pub fn new(config: ShieldConfig) -> Self {
        let tolerance_ms = config.base_tolerance_ms as f32;
        Self {
            config,
            tolerance_ms,
            squeeze_entry_ms: None,
        }
    }

    pub fn update(&mut self, dam_depth: usize, jitter_ms: f64, speech_duration_ms: u64) -> u64 {
        let c = &self.config;

        if speech_duration_ms > c.squeeze_start_ms {
            // Squeeze override: force a turn boundary before the upstream
            // session cap, regardless of any pressure.
            let entry = *self.squeeze_entry_ms.get_or_insert(self.tolerance_ms);
            let span = (c.squeeze_floor_at_ms - c.squeeze_start_ms) as f32;
            let progress =
                ((speech_duration_ms - c.squeeze_start_ms) as f32 / span).clamp(0.0, 1.0);
            let floor = c.squeeze_floor_ms as f32;
            self.tolerance_ms = entry + (floor - entry) * progress;
        } else {
            self.squeeze_entry_ms = None;

            if dam_depth > 0 {
                self.tolerance_ms = c.dam_pressure_tolerance_ms as f32;
            } else if speech_duration_ms > c.momentum_threshold_ms {
                self.tolerance_ms = c.momentum_tolerance_ms as f32;
            } else if jitter_ms > 0.0 {
                // Soft landing: step down toward base, never snap.
                self.tolerance_ms = (self.tolerance_ms / 2.0).max(c.base_tolerance_ms as f32);
            } else {
                self.tolerance_ms = c.base_tolerance_ms as f32;
            }
        }

        self.tolerance_ms.round() as u64
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms.round() as u64
    }

    pub fn in_squeeze(&self) -> bool {
        self.squeeze_entry_ms.is_some()
    }

    pub fn reset(&mut self) {
        self.tolerance_ms = self.config.base_tolerance_ms as f32;
        self.squeeze_entry_ms = None;
    }
}
