use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::constants::PLAYBACK_SAMPLE_RATE_HZ;
use crate::renderer::PlaybackRenderer;
use sluice_foundation::AudioError;

/// A stream fault is session-fatal: the control context tears the session
/// down and rebuilds every stateful component rather than resuming.
#[derive(Debug, Clone)]
pub struct StreamFault {
    pub reason: String,
}

/// Handle to the dedicated render thread. The cpal stream lives and dies on
/// that thread, so the render context is always stopped before the ring it
/// reads from is released.
pub struct OutputStreamThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl OutputStreamThread {
    pub fn spawn(
        renderer: PlaybackRenderer,
        device_name: Option<String>,
    ) -> Result<(Self, Receiver<StreamFault>), AudioError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();
        let (fault_tx, fault_rx) = crossbeam_channel::bounded::<StreamFault>(4);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<String, AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-render".to_string())
            .spawn(move || {
                run_render_thread(renderer, device_name, shutdown_flag, fault_tx, ready_tx);
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn render thread: {}", e)))?;

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(device)) => {
                tracing::info!("Render stream started on output device: {}", device);
                Ok((Self { handle, shutdown }, fault_rx))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "Render thread did not start within timeout".to_string(),
                ))
            }
        }
    }

    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn run_render_thread(
    mut renderer: PlaybackRenderer,
    device_name: Option<String>,
    shutdown: Arc<AtomicBool>,
    fault_tx: Sender<StreamFault>,
    ready_tx: Sender<Result<String, AudioError>>,
) {
    // Negotiate a device up front; the renderer is only committed to a
    // stream closure once a workable config exists.
    let (device, config, name) = match pick_device(&device_name) {
        Ok(found) => found,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let channels = config.channels as usize;
    let err_fault_tx = fault_tx.clone();
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Output stream error: {}", err);
        let _ = err_fault_tx.try_send(StreamFault {
            reason: err.to_string(),
        });
    };

    // Mono scratch sized for the largest callback cpal will reasonably
    // hand us; allocated once, never in the callback.
    let mut scratch = vec![0.0f32; 8192];

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let frames = (data.len() / channels).min(scratch.len());
            renderer.render(&mut scratch[..frames]);
            for (frame, &sample) in data.chunks_mut(channels).zip(scratch.iter()) {
                frame.fill(sample);
            }
        },
        err_fn,
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(e.into()));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.into()));
        return;
    }

    let _ = ready_tx.send(Ok(name));

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    // Stream dropped here, on the render thread, before the handle join
    // returns to the control context.
    drop(stream);
    tracing::info!("Render thread shutting down");
}

fn pick_device(
    device_name: &Option<String>,
) -> Result<(cpal::Device, StreamConfig, String), AudioError> {
    let host = cpal::default_host();

    // Candidate list: the requested device, then the host default, then
    // anything else that enumerates.
    let mut candidates: Vec<cpal::Device> = Vec::new();
    if let Some(name) = device_name {
        if let Ok(devices) = host.output_devices() {
            for device in devices {
                if device.name().map(|n| &n == name).unwrap_or(false) {
                    candidates.push(device);
                }
            }
        }
        if candidates.is_empty() {
            tracing::warn!("Requested output device {:?} not found", name);
        }
    }
    if let Some(default) = host.default_output_device() {
        candidates.push(default);
    }
    if let Ok(devices) = host.output_devices() {
        candidates.extend(devices);
    }

    for device in candidates {
        let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        match negotiate_config(&device) {
            Ok(config) => {
                tracing::info!(
                    "Selected output device: {} ({} ch at {} Hz)",
                    name,
                    config.channels,
                    config.sample_rate.0
                );
                return Ok((device, config, name));
            }
            Err(e) => {
                tracing::warn!("Output device {} rejected: {}", name, e);
            }
        }
    }

    Err(AudioError::DeviceNotFound {
        name: device_name.clone(),
    })
}

fn negotiate_config(device: &cpal::Device) -> Result<StreamConfig, AudioError> {
    let desired = SampleRate(PLAYBACK_SAMPLE_RATE_HZ);

    let configs = device.supported_output_configs()?;
    let mut best: Option<StreamConfig> = None;
    for range in configs {
        if range.sample_format() != SampleFormat::F32 {
            continue;
        }
        if range.min_sample_rate() <= desired && desired <= range.max_sample_rate() {
            let candidate = StreamConfig {
                channels: range.channels(),
                sample_rate: desired,
                buffer_size: BufferSize::Default,
            };
            // Prefer the fewest channels that will take our rate.
            let better = match &best {
                Some(b) => candidate.channels < b.channels,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
    }

    best.ok_or(AudioError::FormatNotSupported {
        format: format!("no f32 output config at {} Hz", PLAYBACK_SAMPLE_RATE_HZ),
    })
}
