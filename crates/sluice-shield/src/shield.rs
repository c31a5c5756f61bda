use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ShieldConfig;
use crate::dam::Dam;
use crate::prediction::TurnPrediction;
use crate::tolerance::ToleranceController;
use sluice_foundation::{Clock, SharedClock};
use sluice_telemetry::{EngineMetrics, ShieldGauge};
use sluice_vad::AudioFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Microphone audio is transmitted immediately.
    Open,
    /// The remote side holds the floor; capture goes to the dam.
    Impounding,
    /// Impounding while the tolerance controller is in its squeeze override.
    Squeezing,
}

/// Side effects requested by a shield tick, executed by the session runtime
/// in order.
#[derive(Debug, Clone)]
pub enum ShieldAction {
    Transmit(AudioFrame),
    /// Digital-silence preamble that forces the remote endpoint's own VAD
    /// to a known-zero state ahead of the turn-complete signal.
    SendSilence { duration_ms: u64 },
    SendTurnComplete { delay_ms: u64 },
}

/// Turn-arbitration state machine. Owns the dam, the tolerance controller
/// and the prediction sub-state; driven once per captured frame from the
/// control context. All timing flows through the injected clock so the
/// protocol can be exercised on virtual time.
pub struct Shield {
    config: ShieldConfig,
    clock: SharedClock,
    state: GateState,
    tolerance: ToleranceController,
    dam: Dam,
    prediction: TurnPrediction,
    speech_start: Option<Instant>,
    last_voice: Option<Instant>,
    busy_until: Option<Instant>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl Shield {
    pub fn new(config: ShieldConfig, clock: SharedClock) -> Self {
        let tolerance = ToleranceController::new(config.clone());
        let dam = Dam::new(config.dam_capacity_frames);
        Self {
            config,
            clock,
            state: GateState::Open,
            tolerance,
            dam,
            prediction: TurnPrediction::idle(),
            speech_start: None,
            last_voice: None,
            busy_until: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn dam_depth(&self) -> usize {
        self.dam.len()
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance.tolerance_ms()
    }

    pub fn prediction(&self) -> TurnPrediction {
        self.prediction
    }

    pub fn busy_until(&self) -> Option<Instant> {
        self.busy_until
    }

    /// First inbound frame of a turn arms impounding immediately; no timer
    /// is consulted.
    pub fn on_inbound_audio(&mut self) {
        let now = self.clock.now();
        self.prediction.on_inbound(now);
        if self.state == GateState::Open {
            self.state = GateState::Impounding;
            self.busy_until = None;
            tracing::info!("Remote turn began; impounding local capture");
        }
    }

    /// Explicit remote turn-complete. Always a sufficient qualifying signal;
    /// the actual transition still waits on the drain floor at the next tick.
    pub fn on_turn_complete(&mut self) {
        self.prediction.on_turn_complete();
        tracing::debug!("Turn-complete signal received");
    }

    /// One control tick: admit or impound a captured frame.
    ///
    /// `probability` is the scorer output for this frame; `jitter_ms` is the
    /// renderer backlog, the physical half of the release condition.
    pub fn on_capture_frame(
        &mut self,
        frame: AudioFrame,
        probability: f32,
        jitter_ms: f64,
    ) -> Vec<ShieldAction> {
        let now = self.clock.now();
        let voiced = probability >= self.config.activation_threshold;
        if voiced {
            if self.speech_start.is_none() {
                self.speech_start = Some(now);
            }
            self.last_voice = Some(now);
            if let Some(m) = &self.metrics {
                m.record_voice_activity(now);
            }
        }

        let speech_ms = self
            .speech_start
            .map(|s| now.duration_since(s).as_millis() as u64)
            .unwrap_or(0);
        let tolerance_ms = self.tolerance.update(self.dam.len(), jitter_ms, speech_ms);

        let mut actions = Vec::new();
        match self.state {
            GateState::Open => self.tick_open(frame, voiced, tolerance_ms, now, &mut actions),
            GateState::Impounding | GateState::Squeezing => {
                self.tick_impounding(frame, tolerance_ms, jitter_ms, now, &mut actions)
            }
        }

        self.publish(tolerance_ms);
        actions
    }

    fn tick_open(
        &mut self,
        frame: AudioFrame,
        voiced: bool,
        tolerance_ms: u64,
        now: Instant,
        actions: &mut Vec<ShieldAction>,
    ) {
        if let Some(busy) = self.busy_until {
            if now < busy {
                // Refractory window after a dam flush: the burst is on the
                // wire but the remote endpoint is still post-turn deaf.
                self.impound(frame);
                return;
            }
            self.busy_until = None;
        }

        // Frames impounded during the refractory window flush first so the
        // stream stays contiguous.
        if !self.dam.is_empty() {
            self.flush_dam(actions);
        }

        let silence_run_ms = self
            .last_voice
            .map(|t| now.duration_since(t).as_millis() as u64);
        if let (Some(start), Some(run), false) = (self.speech_start, silence_run_ms, voiced) {
            if run >= tolerance_ms {
                let utterance = now.duration_since(start);
                tracing::info!(
                    "Local turn ended after {:?} ({}ms of silence)",
                    utterance,
                    run
                );
                actions.push(ShieldAction::SendSilence {
                    duration_ms: self.config.clean_break_silence_ms,
                });
                actions.push(ShieldAction::SendTurnComplete {
                    delay_ms: self.config.clean_break_gap_ms,
                });
                self.prediction = TurnPrediction::guess_for_utterance(utterance);
                self.speech_start = None;
                self.last_voice = None;
                return;
            }
        }

        actions.push(ShieldAction::Transmit(frame));
        if let Some(m) = &self.metrics {
            m.frames_transmitted
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    fn tick_impounding(
        &mut self,
        frame: AudioFrame,
        tolerance_ms: u64,
        jitter_ms: f64,
        now: Instant,
        actions: &mut Vec<ShieldAction>,
    ) {
        self.impound(frame);

        // Release needs both halves: a qualifying signal (explicit
        // turn-complete, or the rolling inbound window lapsing) and the
        // renderer drained below the floor. Logic may not override physics.
        let qualifying = self.prediction.is_settled()
            || self
                .prediction
                .implicitly_done(now, Duration::from_millis(tolerance_ms));
        let drained = jitter_ms < self.config.drain_floor_ms;

        if qualifying && drained {
            self.open_gate(now, actions);
        } else {
            self.state = if self.tolerance.in_squeeze() {
                GateState::Squeezing
            } else {
                GateState::Impounding
            };
        }
    }

    fn open_gate(&mut self, now: Instant, actions: &mut Vec<ShieldAction>) {
        let flushed = self.dam.len();
        if flushed > 0 {
            self.flush_dam(actions);
            self.busy_until = Some(now + Duration::from_millis(self.config.refractory_ms));
        }
        self.state = GateState::Open;
        self.prediction = TurnPrediction::idle();
        if let Some(m) = &self.metrics {
            m.turns_completed
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        tracing::info!("Shield opened; flushed {} impounded frames", flushed);
    }

    fn flush_dam(&mut self, actions: &mut Vec<ShieldAction>) {
        for frame in self.dam.drain() {
            actions.push(ShieldAction::Transmit(frame));
            if let Some(m) = &self.metrics {
                m.frames_transmitted
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }

    fn impound(&mut self, frame: AudioFrame) {
        let evicted = self.dam.push(frame);
        if let Some(m) = &self.metrics {
            m.frames_impounded
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            if evicted.is_some() {
                m.dam_overflows
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }

    fn publish(&self, tolerance_ms: u64) {
        if let Some(m) = &self.metrics {
            let gauge = match self.state {
                GateState::Open => ShieldGauge::Open,
                GateState::Impounding => ShieldGauge::Impounding,
                GateState::Squeezing => ShieldGauge::Squeezing,
            };
            m.update_shield(gauge, tolerance_ms, self.dam.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_foundation::test_clock;
    use std::time::Instant;

    fn frame() -> AudioFrame {
        AudioFrame::new(vec![0.1; 512], Instant::now(), 16_000)
    }

    fn silent_frame() -> AudioFrame {
        AudioFrame::new(vec![0.0; 512], Instant::now(), 16_000)
    }

    #[test]
    fn open_shield_transmits_immediately() {
        let shield_clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), shield_clock);
        let actions = shield.on_capture_frame(frame(), 0.9, 0.0);
        assert!(matches!(actions[..], [ShieldAction::Transmit(_)]));
        assert_eq!(shield.state(), GateState::Open);
    }

    #[test]
    fn first_inbound_frame_arms_impounding() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock);
        shield.on_inbound_audio();
        assert_eq!(shield.state(), GateState::Impounding);

        let actions = shield.on_capture_frame(frame(), 0.9, 500.0);
        assert!(actions.is_empty());
        assert_eq!(shield.dam_depth(), 1);
    }

    #[test]
    fn turn_complete_alone_cannot_open_while_draining() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock);
        shield.on_inbound_audio();
        shield.on_turn_complete();

        // Renderer still holds 2 s of audio: physics gates the release.
        let actions = shield.on_capture_frame(frame(), 0.9, 2_000.0);
        assert!(actions.is_empty());
        assert_eq!(shield.state(), GateState::Impounding);
    }

    #[test]
    fn turn_complete_plus_drained_renderer_opens_within_one_tick() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock.clone());
        shield.on_inbound_audio();
        shield.on_turn_complete();

        let actions = shield.on_capture_frame(frame(), 0.9, 10.0);
        // The tick's own frame was impounded then flushed as the burst.
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ShieldAction::Transmit(_)));
        assert_eq!(shield.state(), GateState::Open);
        assert!(shield.busy_until().is_some());
    }

    #[test]
    fn refractory_window_impounds_then_flushes() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock.clone());
        shield.on_inbound_audio();
        shield.on_turn_complete();
        shield.on_capture_frame(frame(), 0.9, 0.0); // opens, busy for 450ms

        // 200 ms in: still inside the refractory window.
        clock.advance(Duration::from_millis(200));
        let actions = shield.on_capture_frame(frame(), 0.9, 0.0);
        assert!(actions.is_empty());
        assert_eq!(shield.dam_depth(), 1);

        // 500 ms in: window expired, leftovers flush ahead of the live frame.
        clock.advance(Duration::from_millis(300));
        let actions = shield.on_capture_frame(frame(), 0.9, 0.0);
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], ShieldAction::Transmit(_)));
        assert!(matches!(actions[1], ShieldAction::Transmit(_)));
        assert_eq!(shield.dam_depth(), 0);
    }

    #[test]
    fn local_silence_run_triggers_clean_break() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock.clone());

        // Speak for a second.
        for _ in 0..10 {
            shield.on_capture_frame(frame(), 0.9, 0.0);
            clock.advance(Duration::from_millis(32));
        }
        // Fall silent past the base tolerance.
        clock.advance(Duration::from_millis(280));
        let actions = shield.on_capture_frame(silent_frame(), 0.0, 0.0);

        assert!(matches!(
            actions[..],
            [
                ShieldAction::SendSilence { duration_ms: 800 },
                ShieldAction::SendTurnComplete { delay_ms: 50 }
            ]
        ));
        assert!(matches!(
            shield.prediction(),
            TurnPrediction::Guessing { .. }
        ));
    }

    #[test]
    fn implicit_end_of_turn_via_lapsed_inbound_window() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock.clone());
        shield.on_inbound_audio();

        // Remote has gone quiet but no explicit signal arrives. The rolling
        // window is the current tolerance (base 275 ms here).
        clock.advance(Duration::from_millis(300));
        let actions = shield.on_capture_frame(silent_frame(), 0.0, 0.0);
        assert_eq!(shield.state(), GateState::Open);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn squeeze_reflects_in_gate_state() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock.clone());
        shield.on_inbound_audio();

        // Keep talking for 21 s while the remote drains slowly.
        shield.on_capture_frame(frame(), 0.9, 5_000.0);
        clock.advance(Duration::from_secs(21));
        shield.on_inbound_audio(); // keep the window fresh
        shield.on_capture_frame(frame(), 0.9, 5_000.0);
        assert_eq!(shield.state(), GateState::Squeezing);
    }

    #[test]
    fn rebuilt_shield_matches_initial_state() {
        let clock = test_clock();
        let mut shield = Shield::new(ShieldConfig::default(), clock.clone());
        shield.on_inbound_audio();
        shield.on_capture_frame(frame(), 0.9, 500.0);

        // Reconnect semantics: a fresh shield, nothing carried over.
        let rebuilt = Shield::new(ShieldConfig::default(), clock);
        assert_eq!(rebuilt.state(), GateState::Open);
        assert_eq!(rebuilt.dam_depth(), 0);
        assert_eq!(rebuilt.prediction(), TurnPrediction::idle());
        assert_eq!(rebuilt.busy_until(), None);
        assert_eq!(
            rebuilt.tolerance_ms(),
            ShieldConfig::default().base_tolerance_ms
        );
    }
}
