mod peer_event;
mod peer_session;
mod peer_session_manager;

pub use peer_event::*;
pub use peer_session::*;
pub use peer_session_manager::*;
