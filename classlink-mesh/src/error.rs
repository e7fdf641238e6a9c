use classlink_core::{ParticipantId, Role};
use thiserror::Error;

/// Failures reported by a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("permission to capture media was denied")]
    PermissionDenied,

    #[error("no capture device matches the request")]
    DeviceNotFound,

    #[error("capture device is in use by another application")]
    DeviceBusy,

    #[error("capture constraints cannot be satisfied")]
    ConstraintsUnsatisfiable,

    #[error("capture requested with neither audio nor video")]
    NothingRequested,
}

impl CaptureError {
    /// Errors after which a request with fewer constraints may still succeed.
    pub fn allows_fallback(self) -> bool {
        matches!(
            self,
            CaptureError::ConstraintsUnsatisfiable
                | CaptureError::DeviceNotFound
                | CaptureError::DeviceBusy
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("transport for {remote} could not be created: {reason}")]
    TransportUnavailable { remote: ParticipantId, reason: String },

    #[error("failed to create offer for {remote}: {reason}")]
    OfferCreationFailed { remote: ParticipantId, reason: String },

    #[error("failed to create answer for {remote}: {reason}")]
    AnswerCreationFailed { remote: ParticipantId, reason: String },

    #[error("remote description from {remote} rejected: {reason}")]
    RemoteDescriptionRejected { remote: ParticipantId, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("acknowledge failed: {0}")]
    Acknowledge(String),

    #[error("signaling transport closed")]
    Closed,
}

/// Error raised by a router handler while acting on a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session has already ended")]
    Closed,

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("a {0} cannot do that")]
    WrongRole(Role),

    #[error("no peer session with {0}")]
    UnknownPeer(ParticipantId),
}
