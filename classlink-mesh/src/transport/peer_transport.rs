use crate::capture::LocalTrack;
use crate::transport::TransportEventSink;
use anyhow::Result;
use async_trait::async_trait;
use classlink_core::{IceCandidate, SessionDescription};
use std::sync::Arc;

/// One negotiated connection to a remote participant.
///
/// Negotiation bookkeeping (signaling state, candidate buffering) lives in
/// the peer session manager; implementations only perform the operations.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<()>;

    /// Stop sending on every attached track without renegotiating.
    async fn detach_tracks(&self) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, sink: TransportEventSink) -> Result<Arc<dyn PeerTransport>>;
}
