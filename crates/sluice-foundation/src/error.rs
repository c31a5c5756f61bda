use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Output device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Device disconnected")]
    DeviceDisconnected,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Playback ring overflow, evicted {count} samples")]
    RingOverflow { count: usize },

    #[error("No render callback for {duration:?}")]
    RenderStalled { duration: Duration },

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport closed by remote")]
    Closed,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Control signal failed: {0}")]
    Signal(String),
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    /// Tear the session down and rebuild every stateful component.
    Reinitialize,
    /// Degradation already absorbed locally; only counters move.
    Ignore,
    Fatal,
}

impl EngineError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            // Transport loss is fatal to the session, never a partial resume.
            EngineError::Transport(_) => RecoveryStrategy::Reinitialize,
            EngineError::Audio(AudioError::RingOverflow { .. }) => RecoveryStrategy::Ignore,
            EngineError::Audio(AudioError::DeviceDisconnected) => RecoveryStrategy::Reinitialize,
            EngineError::Fatal(_) | EngineError::ShutdownRequested => RecoveryStrategy::Fatal,
            _ => RecoveryStrategy::Reinitialize,
        }
    }
}
