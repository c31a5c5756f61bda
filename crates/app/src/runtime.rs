use crossbeam_channel::{never, Receiver};
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{InboundEvent, Transport};
use sluice_audio::constants::{PLAYBACK_SAMPLE_RATE_HZ, RING_CAPACITY_SAMPLES};
use sluice_audio::output::StreamFault;
use sluice_audio::{OutputStreamThread, PlaybackRenderer, PlaybackRing, RenderEvent, RingProducer};
use sluice_foundation::{
    Clock, EngineError, RecoveryStrategy, SessionState, SessionStateManager, SharedClock,
};
use sluice_shield::{Shield, ShieldAction, ShieldConfig};
use sluice_telemetry::EngineMetrics;
use sluice_vad::constants::{CAPTURE_SAMPLE_RATE_HZ, FRAME_SIZE_SAMPLES};
use sluice_vad::{AudioFrame, ScorerConfig, SpeechScorer};
use sluice_vad_silero::ScorerHandle;

#[derive(Debug, Clone)]
pub struct SessionParams {
    pub shield_config: ShieldConfig,
    pub scorer_config: ScorerConfig,
    pub output_device: Option<String>,
    /// Skip the cpal output stream (tests, CI, headless hosts). The ring
    /// and shield still run; only hardware playback is absent.
    pub headless: bool,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            shield_config: ShieldConfig::default(),
            scorer_config: ScorerConfig::default(),
            output_device: None,
            headless: false,
        }
    }
}

/// One session: one transport connection, one ring, one shield, one scorer.
/// Everything here is rebuilt from scratch on reconnect; nothing stateful
/// survives a transport loss.
pub struct SessionRuntime<T: Transport> {
    transport: T,
    inbound_rx: Receiver<InboundEvent>,
    capture_rx: Receiver<AudioFrame>,
    scorer: ScorerHandle,
    shield: Shield,
    producer: RingProducer,
    output: Option<OutputStreamThread>,
    fault_rx: Receiver<StreamFault>,
    render_events_rx: Receiver<RenderEvent>,
    clock: SharedClock,
    metrics: Arc<EngineMetrics>,
    lifecycle: SessionStateManager,
    fallback_reported: bool,
}

impl<T: Transport> SessionRuntime<T> {
    pub fn new(
        transport: T,
        capture_rx: Receiver<AudioFrame>,
        params: &SessionParams,
        clock: SharedClock,
        metrics: Arc<EngineMetrics>,
    ) -> Result<Self, EngineError> {
        let inbound_rx = transport.inbound();

        let (producer, consumer) = PlaybackRing::new(RING_CAPACITY_SAMPLES).split();
        let renderer = PlaybackRenderer::new(consumer, metrics.clone());

        let (output, fault_rx, render_events_rx) = if params.headless {
            drop(renderer);
            (None, never(), never())
        } else {
            let (events_tx, events_rx) = crossbeam_channel::bounded(8);
            let (thread, faults) = OutputStreamThread::spawn(
                renderer.with_events(events_tx),
                params.output_device.clone(),
            )?;
            (Some(thread), faults, events_rx)
        };

        let scorer = ScorerHandle::new(params.scorer_config.clone());
        let shield =
            Shield::new(params.shield_config.clone(), clock.clone()).with_metrics(metrics.clone());

        Ok(Self {
            transport,
            inbound_rx,
            capture_rx,
            scorer,
            shield,
            producer,
            output,
            fault_rx,
            render_events_rx,
            clock,
            metrics,
            lifecycle: SessionStateManager::new(),
            fallback_reported: false,
        })
    }

    /// Drive the control loop until shutdown or a session-fatal error.
    pub fn run(mut self, shutdown_rx: &Receiver<()>) -> Result<(), EngineError> {
        self.lifecycle.transition(SessionState::Running)?;
        tracing::info!("Session running");

        // Receivers are cloned out so the select arms can borrow `self`
        // mutably.
        let capture_rx = self.capture_rx.clone();
        let inbound_rx = self.inbound_rx.clone();
        let fault_rx = self.fault_rx.clone();
        let render_events_rx = self.render_events_rx.clone();

        let result = loop {
            crossbeam_channel::select! {
                recv(capture_rx) -> msg => match msg {
                    Ok(frame) => {
                        if let Err(e) = self.handle_capture(frame) {
                            break Err(e);
                        }
                    }
                    Err(_) => {
                        tracing::info!("Capture source closed; stopping session");
                        break Ok(());
                    }
                },
                recv(inbound_rx) -> msg => match msg {
                    Ok(event) => self.handle_inbound(event),
                    Err(_) => break Err(EngineError::Transport(
                        sluice_foundation::TransportError::Closed,
                    )),
                },
                recv(fault_rx) -> msg => {
                    let reason = match msg {
                        Ok(fault) => fault.reason,
                        Err(_) => "render thread exited".to_string(),
                    };
                    break Err(EngineError::Audio(
                        sluice_foundation::AudioError::Fatal(reason),
                    ));
                },
                recv(render_events_rx) -> msg => match msg {
                    // Power-management hook: a host with control over the
                    // hardware stream would suspend/resume it here.
                    Ok(RenderEvent::VoiceStopped) => tracing::info!("Renderer idle"),
                    Ok(RenderEvent::VoiceStarted) => tracing::info!("Renderer active"),
                    Err(_) => break Err(EngineError::Audio(
                        sluice_foundation::AudioError::Fatal(
                            "render thread exited".to_string(),
                        ),
                    )),
                },
                recv(shutdown_rx) -> _ => break Ok(()),
            }
        };

        match &result {
            Ok(()) => {
                self.lifecycle.transition(SessionState::Stopping)?;
                self.teardown();
                self.lifecycle.transition(SessionState::Stopped)?;
            }
            Err(e) => {
                let _ = self.lifecycle.transition(SessionState::Recovering {
                    from_error: e.to_string(),
                });
                self.teardown();
            }
        }
        result
    }

    fn handle_capture(&mut self, frame: AudioFrame) -> Result<(), EngineError> {
        let probability = self.scorer.score(&frame.samples);
        self.metrics
            .frames_scored
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if self.scorer.fallback_engaged() && !self.fallback_reported {
            self.fallback_reported = true;
            self.metrics
                .scorer_fallbacks
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }

        let jitter_ms =
            self.producer.fill_level() as f64 * 1000.0 / PLAYBACK_SAMPLE_RATE_HZ as f64;
        let actions = self.shield.on_capture_frame(frame, probability, jitter_ms);
        self.execute(actions)?;
        Ok(())
    }

    fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Audio(samples) => {
                let outcome = self.producer.push(&samples);
                if outcome.evicted > 0 {
                    tracing::warn!(
                        "Playback ring overflow; evicted {} samples",
                        outcome.evicted
                    );
                    self.metrics.record_ring_overflow(outcome.evicted);
                }
                self.shield.on_inbound_audio();
            }
            InboundEvent::TurnComplete => {
                self.shield.on_turn_complete();
            }
        }
    }

    fn execute(&mut self, actions: Vec<ShieldAction>) -> Result<(), EngineError> {
        for action in actions {
            match action {
                ShieldAction::Transmit(frame) => {
                    self.transport.send_audio(&frame)?;
                }
                ShieldAction::SendSilence { duration_ms } => {
                    self.send_silence(duration_ms)?;
                }
                ShieldAction::SendTurnComplete { delay_ms } => {
                    self.clock.sleep(Duration::from_millis(delay_ms));
                    self.transport.send_turn_complete()?;
                }
            }
        }
        Ok(())
    }

    /// Digital-silence block ahead of a turn-complete, chunked into normal
    /// capture-sized frames.
    fn send_silence(&mut self, duration_ms: u64) -> Result<(), EngineError> {
        let total = (duration_ms * CAPTURE_SAMPLE_RATE_HZ as u64 / 1000) as usize;
        let now = self.clock.now();
        let mut remaining = total;
        while remaining > 0 {
            let len = remaining.min(FRAME_SIZE_SAMPLES);
            let frame = AudioFrame::new(vec![0.0; len], now, CAPTURE_SAMPLE_RATE_HZ);
            self.transport.send_audio(&frame)?;
            remaining -= len;
        }
        Ok(())
    }

    fn teardown(&mut self) {
        // Render context stops before the ring it reads from goes away.
        if let Some(output) = self.output.take() {
            output.stop();
        }
        self.scorer.reset();
        tracing::info!("Session torn down");
    }
}

/// Rebuild sessions until a clean shutdown. Transport loss and stream
/// faults reinitialize every stateful component; nothing is resumed.
pub fn run_supervised<T, F>(
    mut make_transport: F,
    capture_rx: Receiver<AudioFrame>,
    params: SessionParams,
    clock: SharedClock,
    metrics: Arc<EngineMetrics>,
    shutdown_rx: Receiver<()>,
) -> Result<(), EngineError>
where
    T: Transport,
    F: FnMut() -> Result<T, EngineError>,
{
    loop {
        let transport = make_transport()?;
        let runtime = SessionRuntime::new(
            transport,
            capture_rx.clone(),
            &params,
            clock.clone(),
            metrics.clone(),
        )?;

        match runtime.run(&shutdown_rx) {
            Ok(()) => return Ok(()),
            Err(e) => match e.recovery_strategy() {
                RecoveryStrategy::Reinitialize => {
                    tracing::warn!("Session lost ({}); reinitializing", e);
                    continue;
                }
                RecoveryStrategy::Ignore => continue,
                RecoveryStrategy::Fatal => return Err(e),
            },
        }
    }
}
