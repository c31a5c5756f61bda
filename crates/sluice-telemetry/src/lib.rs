pub mod engine_metrics;

pub use engine_metrics::{EngineMetrics, FpsTracker, RenderStatus, ShieldGauge};
