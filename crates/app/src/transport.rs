use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

use sluice_foundation::TransportError;
use sluice_vad::AudioFrame;

/// Events produced by the remote side of the duplex channel.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// Model speech at the playback sample rate.
    Audio(Vec<f32>),
    /// Explicit end of the remote turn.
    TurnComplete,
}

/// Duplex transport contract. Outbound calls are synchronous from the
/// control context; inbound traffic is delivered through the channel so the
/// runtime can select over it alongside capture.
pub trait Transport: Send {
    fn send_audio(&mut self, frame: &AudioFrame) -> Result<(), TransportError>;

    fn send_turn_complete(&mut self) -> Result<(), TransportError>;

    fn inbound(&self) -> Receiver<InboundEvent>;
}

/// In-process transport for demos and tests: buffers whatever the local
/// side says, and on turn-complete "responds" by echoing the buffered
/// speech back as remote audio followed by its own turn-complete.
pub struct LoopbackTransport {
    inbound_tx: Sender<InboundEvent>,
    inbound_rx: Receiver<InboundEvent>,
    pending: Vec<f32>,
    /// Shared kill switch so tests can simulate transport loss.
    closed: Arc<Mutex<bool>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();
        Self {
            inbound_tx,
            inbound_rx,
            pending: Vec::new(),
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn kill_switch(&self) -> Arc<Mutex<bool>> {
        self.closed.clone()
    }

    fn check_open(&self) -> Result<(), TransportError> {
        if *self.closed.lock() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn send_audio(&mut self, frame: &AudioFrame) -> Result<(), TransportError> {
        self.check_open()?;
        self.pending.extend_from_slice(&frame.samples);
        Ok(())
    }

    fn send_turn_complete(&mut self) -> Result<(), TransportError> {
        self.check_open()?;
        let samples = std::mem::take(&mut self.pending);
        if !samples.is_empty() {
            self.inbound_tx
                .send(InboundEvent::Audio(samples))
                .map_err(|e| TransportError::Send(e.to_string()))?;
        }
        self.inbound_tx
            .send(InboundEvent::TurnComplete)
            .map_err(|e| TransportError::Signal(e.to_string()))?;
        Ok(())
    }

    fn inbound(&self) -> Receiver<InboundEvent> {
        self.inbound_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn loopback_echoes_after_turn_complete() {
        let mut transport = LoopbackTransport::new();
        let rx = transport.inbound();

        let frame = AudioFrame::new(vec![0.5; 512], Instant::now(), 16_000);
        transport.send_audio(&frame).unwrap();
        assert!(rx.try_recv().is_err(), "nothing echoes before turn end");

        transport.send_turn_complete().unwrap();
        match rx.try_recv().unwrap() {
            InboundEvent::Audio(samples) => assert_eq!(samples.len(), 512),
            other => panic!("expected audio, got {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            InboundEvent::TurnComplete
        ));
    }

    #[test]
    fn killed_transport_refuses_sends() {
        let mut transport = LoopbackTransport::new();
        *transport.kill_switch().lock() = true;
        let frame = AudioFrame::new(vec![0.0; 512], Instant::now(), 16_000);
        assert!(matches!(
            transport.send_audio(&frame),
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            transport.send_turn_complete(),
            Err(TransportError::Closed)
        ));
    }
}
