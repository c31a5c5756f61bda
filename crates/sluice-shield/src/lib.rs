pub mod config;
pub mod dam;
pub mod prediction;
pub mod shield;
pub mod tolerance;

// Core exports
pub use config::ShieldConfig;
pub use dam::Dam;
pub use prediction::TurnPrediction;
pub use shield::{GateState, Shield, ShieldAction};
pub use tolerance::ToleranceController;
