use crate::mesh::peer_transport::PeerTransport;
use std::mem;
use townsquare_core::{IceCandidate, ParticipantId};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Created,
    Negotiating,
    Stable,
    Closed,
}

impl PeerState {
    pub fn can_transition_to(self, next: PeerState) -> bool {
        use PeerState::*;
        matches!(
            (self, next),
            (Created, Negotiating) | (Negotiating, Stable) | (Stable, Negotiating) | (Created | Negotiating | Stable, Closed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    /// We asked the remote for an offer and are waiting for it.
    AwaitingOffer,
}

/// Session state toward one remote participant.
pub struct PeerConnection {
    local_id: ParticipantId,
    remote_id: ParticipantId,
    pub(crate) role: PeerRole,
    state: PeerState,
    pub(crate) phase: NegotiationPhase,
    pub(crate) transport: Box<dyn PeerTransport>,
    generation: u64,
    pub(crate) remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
    pub(crate) negotiation_queued: bool,
    pub(crate) media_connected: bool,
}

impl PeerConnection {
    pub(crate) fn new(
        local_id: ParticipantId,
        remote_id: ParticipantId,
        role: PeerRole,
        transport: Box<dyn PeerTransport>,
        generation: u64,
    ) -> Self {
        Self {
            local_id,
            remote_id,
            role,
            state: PeerState::Created,
            phase: NegotiationPhase::Idle,
            transport,
            generation,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            negotiation_queued: false,
            media_connected: false,
        }
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local_id
    }

    pub fn remote_id(&self) -> ParticipantId {
        self.remote_id
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// The side with the smaller id yields when both offer at once.
    pub fn is_polite(&self) -> bool {
        self.local_id < self.remote_id
    }

    /// The transport has completed at least one offer/answer exchange.
    /// From then on only the impolite side offers, so the session never
    /// needs a rollback.
    pub fn is_established(&self) -> bool {
        self.remote_description_set
    }

    /// Returns `true` when the state actually changed.
    pub(crate) fn transition(&mut self, next: PeerState) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.can_transition_to(next) {
            warn!(remote_id = %self.remote_id, from = ?self.state, to = ?next, "invalid peer state transition");
            return false;
        }
        debug!(remote_id = %self.remote_id, from = ?self.state, to = ?next, "peer state changed");
        self.state = next;
        true
    }

    /// Swap in a fresh transport, forgetting everything negotiated on the old
    /// one. Returns the old transport so the caller can close it.
    pub(crate) fn replace_transport(&mut self, transport: Box<dyn PeerTransport>, generation: u64) -> Box<dyn PeerTransport> {
        self.generation = generation;
        self.phase = NegotiationPhase::Idle;
        self.remote_description_set = false;
        self.media_connected = false;
        mem::replace(&mut self.transport, transport)
    }

    pub(crate) fn adopt_candidates(&mut self, candidates: Vec<IceCandidate>) {
        self.pending_candidates.extend(candidates);
    }

    /// Apply a remote candidate, or hold it until a remote description exists.
    pub(crate) async fn add_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.remote_description_set {
            debug!(remote_id = %self.remote_id, "buffering ICE candidate until remote description is set");
            self.pending_candidates.push(candidate);
            return;
        }
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!(remote_id = %self.remote_id, error = %e, "failed to add ICE candidate");
        }
    }

    /// Apply buffered candidates in arrival order.
    pub(crate) async fn flush_candidates(&mut self) {
        let pending = mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!(remote_id = %self.remote_id, count = pending.len(), "applying buffered ICE candidates");
        }
        for candidate in pending {
            if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                warn!(remote_id = %self.remote_id, error = %e, "failed to add buffered ICE candidate");
            }
        }
    }
}
