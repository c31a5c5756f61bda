use crossbeam_channel::Sender;
use std::sync::Arc;

use crate::constants::{
    CRUISE_SPEED_CAP, GAIN_SMOOTHING, HIGH_LATENCY_MS, IDLE_SUSPEND_MS, MAX_SPEED,
    OVERDRIVE_RAMP_MS, PLAYBACK_SAMPLE_RATE_HZ, SILENCE_RMS_THRESHOLD, SPEED_SLEW_FRACTION,
    TARGET_LATENCY_MS, UNDERRUN_FLOOR_SAMPLES,
};
use crate::ring_buffer::RingConsumer;
use sluice_telemetry::EngineMetrics;

/// Power-management events for the host. `VoiceStopped` means the renderer
/// has produced only sub-threshold output for the idle window and the
/// hardware stream may be suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    VoiceStarted,
    VoiceStopped,
}

/// Map backlog to the playback speed the renderer should converge on.
///
/// Backlog below the target latency plays at 1.0x: that delay is spent as
/// natural simultaneous-interpreter lag. The band up to the high-latency
/// threshold yields at most a 1% speedup; only past it does the rate ramp
/// to the audible 3% cap.
pub fn target_speed(fill_ms: f64) -> f64 {
    if fill_ms <= TARGET_LATENCY_MS {
        1.0
    } else if fill_ms <= HIGH_LATENCY_MS {
        let t = (fill_ms - TARGET_LATENCY_MS) / (HIGH_LATENCY_MS - TARGET_LATENCY_MS);
        1.0 + t * (CRUISE_SPEED_CAP - 1.0)
    } else {
        let t = ((fill_ms - HIGH_LATENCY_MS) / OVERDRIVE_RAMP_MS).min(1.0);
        CRUISE_SPEED_CAP + t * (MAX_SPEED - CRUISE_SPEED_CAP)
    }
}

/// Real-time side of the playback ring. `render` runs on the audio callback
/// and must never block, allocate, or take a lock; everything it touches is
/// owned or atomic.
pub struct PlaybackRenderer {
    consumer: RingConsumer,
    read_int: u32,
    read_frac: f64,
    current_speed: f64,
    current_gain: f32,
    last_sample: f32,
    silent_samples: u64,
    is_silent: bool,
    starved: bool,
    events: Option<Sender<RenderEvent>>,
    metrics: Arc<EngineMetrics>,
}

impl PlaybackRenderer {
    pub fn new(consumer: RingConsumer, metrics: Arc<EngineMetrics>) -> Self {
        let read_int = consumer.read_index();
        Self {
            consumer,
            read_int,
            read_frac: 0.0,
            current_speed: 1.0,
            current_gain: 0.0,
            last_sample: 0.0,
            silent_samples: 0,
            is_silent: true,
            starved: false,
            events: None,
            metrics,
        }
    }

    pub fn with_events(mut self, events: Sender<RenderEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    pub fn is_silent(&self) -> bool {
        self.is_silent
    }

    /// Render one callback quantum of mono samples.
    pub fn render(&mut self, out: &mut [f32]) {
        let write = self.consumer.write_index();
        let capacity = self.consumer.capacity();

        let mut fill = write.wrapping_sub(self.read_int);
        if fill > capacity {
            // The producer evicted past us; jump to the oldest surviving
            // sample. One glitched callback, never an out-of-bounds read.
            self.read_int = write.wrapping_sub(capacity);
            self.read_frac = 0.0;
            fill = capacity;
        }

        if self.is_silent && fill >= UNDERRUN_FLOOR_SAMPLES {
            self.wake();
        }

        let fill_ms = fill as f64 * 1000.0 / PLAYBACK_SAMPLE_RATE_HZ as f64;
        // While idle the target pins to 1.0 so the stored speed relaxes
        // toward unity between turns.
        let target = if self.is_silent { 1.0 } else { target_speed(fill_ms) };
        self.current_speed += (target - self.current_speed) * SPEED_SLEW_FRACTION;

        let mut sum_squares = 0.0f64;
        for slot in out.iter_mut() {
            let available = write.wrapping_sub(self.read_int);
            let sample = if available >= 2 {
                let a = self.consumer.sample_at(self.read_int);
                let b = self.consumer.sample_at(self.read_int.wrapping_add(1));
                let s = a + (b - a) * self.read_frac as f32;
                self.read_frac += self.current_speed;
                while self.read_frac >= 1.0 {
                    self.read_frac -= 1.0;
                    self.read_int = self.read_int.wrapping_add(1);
                }
                self.last_sample = s;
                s
            } else {
                // Starved: hold the last sample and let the envelope fade
                // it out rather than reading stale ring contents.
                self.last_sample
            };

            let target_gain = if write.wrapping_sub(self.read_int) < UNDERRUN_FLOOR_SAMPLES {
                0.0
            } else {
                1.0
            };
            self.current_gain += (target_gain - self.current_gain) * GAIN_SMOOTHING;

            let v = sample * self.current_gain;
            *slot = v;
            sum_squares += (v as f64) * (v as f64);
        }

        let now_starved = write.wrapping_sub(self.read_int) < UNDERRUN_FLOOR_SAMPLES;
        if now_starved && !self.starved {
            self.metrics.record_underrun();
        }
        self.starved = now_starved;

        self.consumer.commit_read_index(self.read_int);
        self.metrics.update_render_status(
            write.wrapping_sub(self.read_int) as usize,
            self.current_speed,
        );

        self.account_silence(out.len(), sum_squares);
    }

    fn account_silence(&mut self, rendered: usize, sum_squares: f64) {
        let rms = (sum_squares / rendered as f64).sqrt() as f32;
        if rms < SILENCE_RMS_THRESHOLD {
            self.silent_samples += rendered as u64;
            let idle_samples = IDLE_SUSPEND_MS * PLAYBACK_SAMPLE_RATE_HZ as u64 / 1000;
            if !self.is_silent && self.silent_samples >= idle_samples {
                self.is_silent = true;
                self.metrics
                    .is_rendering
                    .store(false, std::sync::atomic::Ordering::Relaxed);
                self.metrics
                    .voice_stopped_events
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.emit(RenderEvent::VoiceStopped);
            }
        } else {
            self.silent_samples = 0;
            if self.is_silent {
                self.wake();
            }
        }
    }

    fn wake(&mut self) {
        self.is_silent = false;
        self.silent_samples = 0;
        self.metrics
            .is_rendering
            .store(true, std::sync::atomic::Ordering::Relaxed);
        self.metrics
            .voice_started_events
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.emit(RenderEvent::VoiceStarted);
    }

    fn emit(&self, event: RenderEvent) {
        if let Some(tx) = &self.events {
            // Dropping an event on a full channel is harmless; the host only
            // cares about the latest edge and can read the atomics anyway.
            let _ = tx.try_send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RENDER_QUANTUM_SAMPLES;
    use crate::ring_buffer::PlaybackRing;

    fn renderer_with_ring(capacity: usize) -> (crate::ring_buffer::RingProducer, PlaybackRenderer) {
        let (producer, consumer) = PlaybackRing::new(capacity).split();
        let metrics = Arc::new(EngineMetrics::default());
        (producer, PlaybackRenderer::new(consumer, metrics))
    }

    #[test]
    fn speed_curve_is_flat_below_target_latency() {
        assert_eq!(target_speed(0.0), 1.0);
        assert_eq!(target_speed(299.0), 1.0);
    }

    #[test]
    fn speed_curve_stays_inside_cruise_cap_before_high_latency() {
        let s = target_speed(12_000.0);
        assert!(s > 1.0 && s <= CRUISE_SPEED_CAP);
        assert!(target_speed(HIGH_LATENCY_MS) <= CRUISE_SPEED_CAP + 1e-9);
    }

    #[test]
    fn speed_curve_caps_at_max() {
        assert!((target_speed(1.0e9) - MAX_SPEED).abs() < 1e-9);
    }

    #[test]
    fn empty_ring_renders_silence() {
        let (_producer, mut renderer) = renderer_with_ring(1 << 12);
        let mut out = [1.0f32; RENDER_QUANTUM_SAMPLES];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn renderer_plays_back_written_audio() {
        let (mut producer, mut renderer) = renderer_with_ring(1 << 12);
        let tone: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * i as f32 / 48.0).sin() * 0.5)
            .collect();
        producer.push(&tone);

        let mut out = [0.0f32; RENDER_QUANTUM_SAMPLES];
        // First callbacks ramp the gain envelope in from zero.
        for _ in 0..20 {
            renderer.render(&mut out);
        }
        let rms = (out.iter().map(|&s| (s * s) as f64).sum::<f64>() / out.len() as f64).sqrt();
        assert!(rms > 0.1, "expected audible output, rms={rms}");
    }

    #[test]
    fn starvation_fades_to_silence_without_panicking() {
        let (mut producer, mut renderer) = renderer_with_ring(1 << 12);
        producer.push(&vec![0.5f32; 512]);

        let mut out = [0.0f32; RENDER_QUANTUM_SAMPLES];
        for _ in 0..200 {
            renderer.render(&mut out);
        }
        // Ring long exhausted: output must be fully faded.
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s.abs() < 1e-3));
    }

    #[test]
    fn read_index_never_passes_write_index() {
        let (mut producer, mut renderer) = renderer_with_ring(1 << 12);
        producer.push(&vec![0.25f32; 300]);

        let mut out = [0.0f32; RENDER_QUANTUM_SAMPLES];
        for _ in 0..50 {
            renderer.render(&mut out);
            let fill = producer.fill_level();
            assert!(fill <= 300, "fill must only shrink, got {fill}");
        }
    }

    #[test]
    fn slew_never_snaps_speed() {
        let (mut producer, mut renderer) = renderer_with_ring(1 << 21);
        // A huge backlog demands the max speed immediately.
        producer.push(&vec![0.3f32; 1 << 20]);

        let mut out = [0.0f32; RENDER_QUANTUM_SAMPLES];
        let mut prev = renderer.current_speed();
        for _ in 0..100 {
            renderer.render(&mut out);
            let delta = (renderer.current_speed() - prev).abs();
            assert!(
                delta <= SPEED_SLEW_FRACTION * (MAX_SPEED - 1.0) + 1e-12,
                "speed moved {delta} in one callback"
            );
            prev = renderer.current_speed();
        }
        assert!(prev > 1.0, "speed should have begun ramping");
    }

    #[test]
    fn idle_run_emits_voice_stopped_then_data_wakes_it() {
        let (mut producer, renderer) = renderer_with_ring(1 << 14);
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut renderer = renderer.with_events(tx);

        // Enough audio to wake the renderer.
        producer.push(&vec![0.5f32; 4096]);
        let mut out = [0.0f32; RENDER_QUANTUM_SAMPLES];
        renderer.render(&mut out);
        assert_eq!(rx.try_recv().unwrap(), RenderEvent::VoiceStarted);

        // Drain and stay silent past the idle window (3 s at 24 kHz).
        let callbacks = 3 * 24_000 / RENDER_QUANTUM_SAMPLES + 600;
        for _ in 0..callbacks {
            renderer.render(&mut out);
        }
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&RenderEvent::VoiceStopped));
        assert!(renderer.is_silent());

        // New data arrives: the renderer resumes.
        producer.push(&vec![0.5f32; 4096]);
        renderer.render(&mut out);
        assert!(!renderer.is_silent());
        assert_eq!(rx.try_recv().unwrap(), RenderEvent::VoiceStarted);
    }
}
