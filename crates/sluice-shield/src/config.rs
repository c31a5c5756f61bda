use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldConfig {
    /// Equilibrium silence tolerance (ms) with no outbound or inbound
    /// pressure.
    pub base_tolerance_ms: u64,
    /// Speech momentum threshold (ms): sustained local speech beyond this
    /// escalates the tolerance.
    pub momentum_threshold_ms: u64,
    /// Tolerance (ms) under momentum escalation alone.
    pub momentum_tolerance_ms: u64,
    /// Tolerance (ms) while impounded audio waits in the dam.
    pub dam_pressure_tolerance_ms: u64,
    /// Speech duration (ms) at which the squeeze override begins.
    pub squeeze_start_ms: u64,
    /// Speech duration (ms) by which the tolerance must reach the floor.
    pub squeeze_floor_at_ms: u64,
    /// Squeeze tolerance floor (ms).
    pub squeeze_floor_ms: u64,
    /// Dam capacity in frames (~60 s at 32 ms frames).
    pub dam_capacity_frames: usize,
    /// Renderer backlog (ms) below which the shield may open.
    pub drain_floor_ms: f64,
    /// Refractory window (ms) after a dam flush during which fresh capture
    /// is still impounded.
    pub refractory_ms: u64,
    /// Digital-silence preamble (ms) sent before the turn-complete signal.
    pub clean_break_silence_ms: u64,
    /// Pause (ms) between the silence preamble and the turn-complete signal.
    pub clean_break_gap_ms: u64,
    /// Probability at or above which a scored frame counts as voiced.
    pub activation_threshold: f32,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            base_tolerance_ms: 275,
            momentum_threshold_ms: 3_000,
            momentum_tolerance_ms: 1_200,
            dam_pressure_tolerance_ms: 2_000,
            squeeze_start_ms: 20_000,
            squeeze_floor_at_ms: 25_000,
            squeeze_floor_ms: 100,
            dam_capacity_frames: 600,
            drain_floor_ms: 300.0,
            refractory_ms: 450,
            clean_break_silence_ms: 800,
            clean_break_gap_ms: 50,
            activation_threshold: 0.5,
        }
    }
}
