//! Playback-side constants. A host application may expose the latency and
//! speed numbers as tunables; they default to values chosen to spend backlog
//! as interpreter-style delay before compressing audibly.

/// Playback sample rate (Hz). Inbound model audio arrives at this rate.
pub const PLAYBACK_SAMPLE_RATE_HZ: u32 = 24_000;

/// Render callback quantum (samples).
pub const RENDER_QUANTUM_SAMPLES: usize = 128;

/// Ring capacity in samples. Power of two; ~87 s at 24 kHz.
pub const RING_CAPACITY_SAMPLES: usize = 1 << 21;

/// Backlog below this plays at exactly 1.0x.
pub const TARGET_LATENCY_MS: f64 = 300.0;

/// Backlog beyond this ramps toward the hard speed cap.
pub const HIGH_LATENCY_MS: f64 = 25_000.0;

/// Width of the ramp from `CRUISE_SPEED_CAP` to `MAX_SPEED` past the
/// high-latency threshold.
pub const OVERDRIVE_RAMP_MS: f64 = 15_000.0;

/// Speedup ceiling inside the target..high latency band.
pub const CRUISE_SPEED_CAP: f64 = 1.01;

/// Absolute playback speed cap.
pub const MAX_SPEED: f64 = 1.03;

/// First-order lag coefficient applied to the speed per callback.
pub const SPEED_SLEW_FRACTION: f64 = 0.02;

/// Fill level under which the gain envelope fades to silence.
pub const UNDERRUN_FLOOR_SAMPLES: u32 = (RENDER_QUANTUM_SAMPLES * 2) as u32;

/// Per-sample exponential smoothing coefficient for the gain envelope.
pub const GAIN_SMOOTHING: f32 = 0.01;

/// Rendered output below this RMS counts toward the idle run.
pub const SILENCE_RMS_THRESHOLD: f32 = 1.0e-4;

/// Continuous sub-threshold output before `VoiceStopped` is signalled.
pub const IDLE_SUSPEND_MS: u64 = 3_000;
