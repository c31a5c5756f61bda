use clap::Parser;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use sluice_app::{run_supervised, LoopbackTransport, SessionParams};
use sluice_audio::constants::PLAYBACK_SAMPLE_RATE_HZ;
use sluice_foundation::real_clock;
use sluice_shield::ShieldConfig;
use sluice_telemetry::EngineMetrics;
use sluice_vad::constants::{CAPTURE_SAMPLE_RATE_HZ, FRAME_SIZE_SAMPLES};
use sluice_vad::{AudioFrame, ScorerConfig};

#[derive(Parser, Debug)]
#[command(name = "sluice", about = "Real-time speech-translation relay engine")]
struct Cli {
    /// Output device name for playback (default: host default)
    #[arg(long)]
    output_device: Option<String>,

    /// Run without opening an audio output stream
    #[arg(long)]
    headless: bool,

    /// Demo length in seconds
    #[arg(long, default_value_t = 12)]
    duration_secs: u64,

    /// Equilibrium silence tolerance in milliseconds
    #[arg(long)]
    base_tolerance_ms: Option<u64>,

    /// Renderer drain floor in milliseconds
    #[arg(long)]
    drain_floor_ms: Option<f64>,

    /// Dam capacity in frames
    #[arg(long)]
    dam_capacity: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut shield_config = ShieldConfig::default();
    if let Some(v) = cli.base_tolerance_ms {
        shield_config.base_tolerance_ms = v;
    }
    if let Some(v) = cli.drain_floor_ms {
        shield_config.drain_floor_ms = v;
    }
    if let Some(v) = cli.dam_capacity {
        shield_config.dam_capacity_frames = v;
    }

    let params = SessionParams {
        shield_config,
        scorer_config: ScorerConfig::default(),
        output_device: cli.output_device.clone(),
        headless: cli.headless,
    };

    let metrics = Arc::new(EngineMetrics::default());
    let clock = real_clock();
    let (capture_tx, capture_rx) = crossbeam_channel::bounded::<AudioFrame>(64);
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

    let duration = Duration::from_secs(cli.duration_secs);
    let generator = thread::Builder::new()
        .name("capture-demo".to_string())
        .spawn(move || generate_capture(capture_tx, duration))?;

    thread::spawn(move || {
        thread::sleep(duration);
        let _ = shutdown_tx.send(());
    });

    // Periodic renderer status, the way a host UI would surface it.
    let status_metrics = metrics.clone();
    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(1));
        let status = status_metrics.render_status(PLAYBACK_SAMPLE_RATE_HZ);
        tracing::debug!(
            fill_samples = status.fill_level_samples,
            fill_ms = status.fill_level_ms,
            speed = status.current_speed,
            "Renderer status"
        );
    });

    run_supervised(
        || Ok(LoopbackTransport::new()),
        capture_rx,
        params,
        clock,
        metrics.clone(),
        shutdown_rx,
    )?;

    let _ = generator.join();
    summarize(&metrics);
    Ok(())
}

/// Demo capture source: spoken bursts with pauses, emitted as real-time
/// 32 ms frames. Stands in for a microphone so the relay loop can be
/// exercised without capture hardware.
fn generate_capture(tx: Sender<AudioFrame>, duration: Duration) {
    let frame_period = Duration::from_millis(
        (FRAME_SIZE_SAMPLES as u64 * 1000) / CAPTURE_SAMPLE_RATE_HZ as u64,
    );
    let started = Instant::now();
    let mut sample_index = 0u64;

    while started.elapsed() < duration {
        let cycle_ms = (started.elapsed().as_millis() % 2_800) as u64;
        let speaking = cycle_ms < 2_000;

        let samples: Vec<f32> = (0..FRAME_SIZE_SAMPLES)
            .map(|i| {
                if speaking {
                    let t = (sample_index + i as u64) as f32 / CAPTURE_SAMPLE_RATE_HZ as f32;
                    (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.4
                } else {
                    0.0
                }
            })
            .collect();
        sample_index += FRAME_SIZE_SAMPLES as u64;

        let frame = AudioFrame::new(samples, Instant::now(), CAPTURE_SAMPLE_RATE_HZ);
        if tx.send(frame).is_err() {
            break;
        }
        thread::sleep(frame_period);
    }
}

fn summarize(metrics: &EngineMetrics) {
    use std::sync::atomic::Ordering;
    tracing::info!(
        transmitted = metrics.frames_transmitted.load(Ordering::Relaxed),
        impounded = metrics.frames_impounded.load(Ordering::Relaxed),
        turns = metrics.turns_completed.load(Ordering::Relaxed),
        dam_overflows = metrics.dam_overflows.load(Ordering::Relaxed),
        underruns = metrics.render_underruns.load(Ordering::Relaxed),
        scorer_fallbacks = metrics.scorer_fallbacks.load(Ordering::Relaxed),
        "Session summary"
    );
}
