mod deduplicator;
mod memory_relay;
mod signal_router;
mod signaling_transport;

pub use deduplicator::*;
pub use memory_relay::*;
pub use signal_router::*;
pub use signaling_transport::*;
