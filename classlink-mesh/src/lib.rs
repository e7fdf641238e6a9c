pub mod capture;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod peer;
pub mod screen_share;
pub mod signaling;
pub mod transport;

pub use capture::{CaptureDevice, CaptureSource, LocalMediaSession, LocalTrack};
pub use config::{MeshConfig, ReconnectPolicy};
pub use error::*;
pub use orchestrator::{
    SessionContext, SessionDeps, SessionEvent, SessionHandle, SessionOrchestrator,
    SessionSnapshot,
};
pub use peer::{PeerEvent, PeerSessionManager};
pub use screen_share::{ScreenShareController, ScreenShareEvent, ScreenShareSession};
pub use signaling::{MemoryRelay, SignalRouter, SignalingTransport};
pub use transport::{RtcTransportFactory, TransportConfig};
