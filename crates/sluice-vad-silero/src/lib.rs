#[cfg(feature = "silero")]
pub mod silero_scorer;

pub mod fallback;

pub use fallback::ScorerHandle;

#[cfg(feature = "silero")]
pub use silero_scorer::SileroScorer;
