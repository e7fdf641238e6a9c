mod media;
mod participant;
mod session;
mod signaling;
mod state;

pub use media::MediaKind;
pub use participant::{ParticipantId, Role};
pub use session::SessionId;
pub use signaling::{
    DeliveredSignal, DescriptionKind, IceCandidate, IceServerConfig, MessageId, SessionDescription,
    SignalKind, SignalPayload, SignalingMessage, unix_millis,
};
pub use state::{ConnectionState, SignalingState};
