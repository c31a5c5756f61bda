use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shield state as an integer gauge so the render and control contexts can
/// share it without locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldGauge {
    Open = 0,
    Impounding = 1,
    Squeezing = 2,
}

impl ShieldGauge {
    pub fn from_code(code: usize) -> Self {
        match code {
            1 => ShieldGauge::Impounding,
            2 => ShieldGauge::Squeezing,
            _ => ShieldGauge::Open,
        }
    }
}

/// Snapshot of the renderer published on the periodic status callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStatus {
    pub fill_level_samples: usize,
    pub fill_level_ms: f64,
    pub current_speed: f64,
}

/// Shared metrics for cross-thread engine monitoring. Every field is either
/// an atomic or behind `parking_lot`; the render callback only ever touches
/// the atomics.
#[derive(Clone)]
pub struct EngineMetrics {
    // Renderer
    pub ring_fill_samples: Arc<AtomicUsize>,
    pub current_speed_milli: Arc<AtomicU64>, // playback speed * 1000
    pub render_callbacks: Arc<AtomicU64>,
    pub render_underruns: Arc<AtomicU64>, // starvation episodes, not samples
    pub ring_overflow_samples: Arc<AtomicU64>,
    pub is_rendering: Arc<AtomicBool>, // false once the idle suspension fired

    // Shield
    pub shield_state: Arc<AtomicUsize>, // ShieldGauge code
    pub silence_tolerance_ms: Arc<AtomicU64>,
    pub dam_depth_frames: Arc<AtomicUsize>,
    pub dam_overflows: Arc<AtomicU64>,
    pub frames_transmitted: Arc<AtomicU64>,
    pub frames_impounded: Arc<AtomicU64>,
    pub turns_completed: Arc<AtomicU64>,

    // Scorer
    pub scorer_fallbacks: Arc<AtomicU64>,
    pub frames_scored: Arc<AtomicU64>,
    pub frames_gated: Arc<AtomicU64>, // short-circuited below the noise floor

    // Activity
    pub last_voice_time: Arc<RwLock<Option<Instant>>>,
    pub voice_started_events: Arc<AtomicU64>,
    pub voice_stopped_events: Arc<AtomicU64>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            ring_fill_samples: Arc::new(AtomicUsize::new(0)),
            current_speed_milli: Arc::new(AtomicU64::new(1000)),
            render_callbacks: Arc::new(AtomicU64::new(0)),
            render_underruns: Arc::new(AtomicU64::new(0)),
            ring_overflow_samples: Arc::new(AtomicU64::new(0)),
            is_rendering: Arc::new(AtomicBool::new(false)),

            shield_state: Arc::new(AtomicUsize::new(ShieldGauge::Open as usize)),
            silence_tolerance_ms: Arc::new(AtomicU64::new(0)),
            dam_depth_frames: Arc::new(AtomicUsize::new(0)),
            dam_overflows: Arc::new(AtomicU64::new(0)),
            frames_transmitted: Arc::new(AtomicU64::new(0)),
            frames_impounded: Arc::new(AtomicU64::new(0)),
            turns_completed: Arc::new(AtomicU64::new(0)),

            scorer_fallbacks: Arc::new(AtomicU64::new(0)),
            frames_scored: Arc::new(AtomicU64::new(0)),
            frames_gated: Arc::new(AtomicU64::new(0)),

            last_voice_time: Arc::new(RwLock::new(None)),
            voice_started_events: Arc::new(AtomicU64::new(0)),
            voice_stopped_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl EngineMetrics {
    pub fn update_render_status(&self, fill_samples: usize, speed: f64) {
        self.ring_fill_samples.store(fill_samples, Ordering::Relaxed);
        self.current_speed_milli
            .store((speed * 1000.0) as u64, Ordering::Relaxed);
        self.render_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_status(&self, sample_rate_hz: u32) -> RenderStatus {
        let fill = self.ring_fill_samples.load(Ordering::Relaxed);
        RenderStatus {
            fill_level_samples: fill,
            fill_level_ms: fill as f64 * 1000.0 / sample_rate_hz as f64,
            current_speed: self.current_speed_milli.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }

    pub fn record_underrun(&self) {
        self.render_underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ring_overflow(&self, evicted_samples: usize) {
        self.ring_overflow_samples
            .fetch_add(evicted_samples as u64, Ordering::Relaxed);
    }

    pub fn update_shield(&self, gauge: ShieldGauge, tolerance_ms: u64, dam_depth: usize) {
        self.shield_state.store(gauge as usize, Ordering::Relaxed);
        self.silence_tolerance_ms.store(tolerance_ms, Ordering::Relaxed);
        self.dam_depth_frames.store(dam_depth, Ordering::Relaxed);
    }

    pub fn shield_gauge(&self) -> ShieldGauge {
        ShieldGauge::from_code(self.shield_state.load(Ordering::Relaxed))
    }

    pub fn record_voice_activity(&self, now: Instant) {
        *self.last_voice_time.write() = Some(now);
    }

    pub fn time_since_voice(&self) -> Option<Duration> {
        self.last_voice_time.read().map(|t| t.elapsed())
    }
}

#[derive(Debug)]
pub struct FpsTracker {
    last_update: Instant,
    frame_count: u64,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.frame_count = 0;
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_status_converts_fill_to_ms() {
        let m = EngineMetrics::default();
        m.update_render_status(24_000, 1.015);
        let status = m.render_status(24_000);
        assert_eq!(status.fill_level_samples, 24_000);
        assert!((status.fill_level_ms - 1000.0).abs() < 1e-9);
        assert!((status.current_speed - 1.015).abs() < 1e-3);
    }

    #[test]
    fn shield_gauge_roundtrip() {
        let m = EngineMetrics::default();
        m.update_shield(ShieldGauge::Squeezing, 100, 42);
        assert_eq!(m.shield_gauge(), ShieldGauge::Squeezing);
        assert_eq!(m.dam_depth_frames.load(Ordering::Relaxed), 42);
    }
}
