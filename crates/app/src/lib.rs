pub mod runtime;
pub mod transport;

pub use runtime::{run_supervised, SessionParams, SessionRuntime};
pub use transport::{InboundEvent, LoopbackTransport, Transport};
