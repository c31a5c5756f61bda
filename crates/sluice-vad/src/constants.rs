//! Audio constants for the capture/scoring side of the engine.

/// Capture and scoring sample rate (Hz).
pub const CAPTURE_SAMPLE_RATE_HZ: u32 = 16_000;

/// Capture frame size (samples). At 16 kHz, 512 samples = 32 ms.
pub const FRAME_SIZE_SAMPLES: usize = 512;

/// Scoring sub-window size (samples). The scorer reports the maximum
/// probability over the sub-windows of a frame.
pub const SUB_WINDOW_SAMPLES: usize = 256;

/// Mono capture only.
pub const CHANNELS_MONO: u16 = 1;

/// Frame duration in milliseconds (derived constant)
pub const FRAME_DURATION_MS: f32 =
    (FRAME_SIZE_SAMPLES as f32 * 1000.0) / CAPTURE_SAMPLE_RATE_HZ as f32;
