pub mod constants;
pub mod output;
pub mod renderer;
pub mod ring_buffer;

// Public API
pub use output::OutputStreamThread;
pub use renderer::{PlaybackRenderer, RenderEvent};
pub use ring_buffer::{PlaybackRing, PushOutcome, RingConsumer, RingProducer};
