use crate::error::MeshError;
use crate::mesh::media::{LocalTrack, RemoteTrack, TrackKind};
use async_trait::async_trait;
use tokio::sync::mpsc;
use townsquare_core::{IceCandidate, ParticipantId};

/// Outcome of attaching a local track to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackUpdate {
    /// An existing sender switched tracks in place. No renegotiation needed.
    Replaced,
    /// A new sender was created; the session must be renegotiated.
    Added,
    Unchanged,
}

/// Something a transport observed. Every event carries the remote id and the
/// generation of the transport that produced it, so events from a discarded
/// transport can be told apart from the live one.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    CandidateGenerated(ParticipantId, u64, IceCandidate),
    Connected(ParticipantId, u64),
    Failed(ParticipantId, u64),
    TrackReceived(ParticipantId, u64, RemoteTrack),
}

impl TransportEvent {
    pub fn remote_id(&self) -> ParticipantId {
        match self {
            TransportEvent::CandidateGenerated(id, ..)
            | TransportEvent::Connected(id, _)
            | TransportEvent::Failed(id, _)
            | TransportEvent::TrackReceived(id, ..) => *id,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            TransportEvent::CandidateGenerated(_, generation, _)
            | TransportEvent::Connected(_, generation)
            | TransportEvent::Failed(_, generation)
            | TransportEvent::TrackReceived(_, generation, _) => *generation,
        }
    }
}

/// Handle given to a transport at creation for reporting back to the mesh.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    remote_id: ParticipantId,
    generation: u64,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEvents {
    pub fn new(remote_id: ParticipantId, generation: u64, tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            remote_id,
            generation,
            tx,
        }
    }

    pub fn remote_id(&self) -> ParticipantId {
        self.remote_id
    }

    pub fn candidate(&self, candidate: IceCandidate) {
        self.emit(TransportEvent::CandidateGenerated(self.remote_id, self.generation, candidate));
    }

    pub fn connected(&self) {
        self.emit(TransportEvent::Connected(self.remote_id, self.generation));
    }

    pub fn failed(&self) {
        self.emit(TransportEvent::Failed(self.remote_id, self.generation));
    }

    pub fn track(&self, track: RemoteTrack) {
        self.emit(TransportEvent::TrackReceived(self.remote_id, self.generation, track));
    }

    fn emit(&self, event: TransportEvent) {
        // The mesh may already be gone during shutdown.
        let _ = self.tx.send(event);
    }
}

/// One media session toward one remote participant.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Create an offer and install it as the local description.
    async fn create_offer(&self) -> Result<String, MeshError>;

    /// Create an answer to the applied remote offer and install it locally.
    async fn create_answer(&self) -> Result<String, MeshError>;

    async fn set_remote_offer(&self, sdp: String) -> Result<(), MeshError>;

    async fn set_remote_answer(&self, sdp: String) -> Result<(), MeshError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MeshError>;

    /// Send `track` for `kind`, reusing the existing sender when there is one.
    /// `None` mutes the sender without removing it.
    async fn set_track(&self, kind: TrackKind, track: Option<LocalTrack>) -> Result<TrackUpdate, MeshError>;

    /// Give the next offer a receive-only section for `kind`, so the remote
    /// can attach a sender it added since the last negotiation.
    async fn add_receiver(&self, kind: TrackKind) -> Result<(), MeshError>;

    /// Kinds of local senders that no offer or answer has carried yet.
    async fn unnegotiated_kinds(&self) -> Vec<TrackKind>;

    async fn close(&self) -> Result<(), MeshError>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, events: TransportEvents) -> Result<Box<dyn PeerTransport>, MeshError>;
}
