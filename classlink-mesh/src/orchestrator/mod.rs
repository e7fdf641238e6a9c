mod negotiator;
mod session_command;
mod session_context;
mod session_event;
mod session_handle;
mod session_orchestrator;

pub use negotiator::*;
pub use session_command::*;
pub use session_context::*;
pub use session_event::*;
pub use session_handle::*;
pub use session_orchestrator::*;
