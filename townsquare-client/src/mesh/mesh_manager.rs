use crate::error::MeshError;
use crate::mesh::media::{LocalMedia, TrackKind};
use crate::mesh::mesh_command::{MeshCommand, MeshEvent};
use crate::mesh::peer_connection::{NegotiationPhase, PeerConnection, PeerRole, PeerState};
use crate::mesh::peer_transport::{PeerTransport, TrackUpdate, TransportEvent, TransportEvents, TransportFactory};
use crate::mixer::AudioChannels;
use crate::signaling::SignalingSink;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use townsquare_core::{IceCandidate, ParticipantId, SignalPayload};
use tracing::{debug, error, info, warn};

/// Owns one [`PeerConnection`] per remote participant and drives each one
/// through offer/answer, candidate exchange and teardown.
///
/// All state lives in this struct and is only touched from [`run`](Self::run)
/// (or directly by tests), so no locking is needed.
pub struct PeerMeshManager {
    local_id: ParticipantId,
    peers: HashMap<ParticipantId, PeerConnection>,
    /// Candidates from remotes we have no connection for yet.
    orphan_candidates: HashMap<ParticipantId, Vec<IceCandidate>>,
    /// Remotes whose connection failed; their candidates are dropped until
    /// they offer again.
    failed: HashSet<ParticipantId>,
    media: LocalMedia,
    factory: Arc<dyn TransportFactory>,
    signaling: Arc<dyn SignalingSink>,
    audio: Arc<AudioChannels>,
    events: Option<mpsc::UnboundedSender<MeshEvent>>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    next_generation: u64,
}

impl PeerMeshManager {
    pub fn new(
        local_id: ParticipantId,
        factory: Arc<dyn TransportFactory>,
        signaling: Arc<dyn SignalingSink>,
        audio: Arc<AudioChannels>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        Self {
            local_id,
            peers: HashMap::new(),
            orphan_candidates: HashMap::new(),
            failed: HashSet::new(),
            media: LocalMedia::default(),
            factory,
            signaling,
            audio,
            events: None,
            transport_tx,
            transport_rx,
            next_generation: 0,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<MeshEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local_id
    }

    pub fn peer(&self, remote_id: &ParticipantId) -> Option<&PeerConnection> {
        self.peers.get(remote_id)
    }

    pub fn peer_ids(&self) -> Vec<ParticipantId> {
        self.peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn local_media(&self) -> &LocalMedia {
        &self.media
    }

    /// Candidates held for a remote we have no connection with.
    pub fn held_candidate_count(&self, remote_id: &ParticipantId) -> usize {
        self.orphan_candidates.get(remote_id).map_or(0, Vec::len)
    }

    pub async fn run(mut self, mut command_rx: mpsc::Receiver<MeshCommand>) {
        info!(local_id = %self.local_id, "peer mesh started");

        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport_event(event).await;
                }
            }
        }

        self.shutdown().await;
        info!("command channel closed, peer mesh finished");
    }

    pub async fn handle_command(&mut self, cmd: MeshCommand) {
        match cmd {
            MeshCommand::UserJoined(remote_id) => self.handle_user_joined(remote_id).await,
            MeshCommand::UserLeft(remote_id) => self.handle_user_left(remote_id).await,
            MeshCommand::Signal { sender_id, signal } => self.handle_signal(sender_id, signal).await,
            MeshCommand::SetLocalMedia(media) => self.set_local_media(media).await,
        }
    }

    /// A new participant arrived: we are the initiator toward it.
    pub async fn handle_user_joined(&mut self, remote_id: ParticipantId) {
        if remote_id == self.local_id {
            return;
        }
        if self.peers.contains_key(&remote_id) {
            debug!(%remote_id, "peer connection already exists, ignoring join");
            return;
        }

        self.failed.remove(&remote_id);
        if let Err(e) = self.create_peer(remote_id, PeerRole::Initiator).await {
            error!(%remote_id, error = %e, "failed to create peer connection");
            publish(&self.events, MeshEvent::PeerFailed(remote_id));
            return;
        }
        self.negotiate(remote_id).await;
    }

    /// Tear down everything held for `remote_id`. Safe to call repeatedly.
    pub async fn handle_user_left(&mut self, remote_id: ParticipantId) {
        self.orphan_candidates.remove(&remote_id);
        self.failed.remove(&remote_id);
        self.audio.release(&remote_id);

        let Some(mut peer) = self.peers.remove(&remote_id) else {
            debug!(%remote_id, "no peer connection to tear down");
            return;
        };
        close_peer(&self.events, &mut peer).await;
        info!(%remote_id, "peer connection closed");
        publish(&self.events, MeshEvent::PeerClosed(remote_id));
    }

    pub async fn handle_signal(&mut self, sender_id: ParticipantId, signal: serde_json::Value) {
        if sender_id == self.local_id {
            warn!("ignoring signal that claims to come from ourselves");
            return;
        }

        let payload = match serde_json::from_value::<SignalPayload>(signal) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%sender_id, error = %e, "unreadable signal payload");
                return;
            }
        };

        match payload {
            SignalPayload::Offer { sdp } => self.accept_offer(sender_id, sdp).await,
            SignalPayload::Answer { sdp } => self.accept_answer(sender_id, sdp).await,
            SignalPayload::Candidate { candidate } => self.add_remote_candidate(sender_id, candidate).await,
            SignalPayload::Renegotiate { kinds } => self.accept_renegotiation_request(sender_id, kinds).await,
        }
    }

    /// Replace the local tracks on every connection. Existing senders switch
    /// in place; only a newly added track kind triggers renegotiation.
    pub async fn set_local_media(&mut self, media: LocalMedia) {
        self.media = media;

        for remote_id in self.peer_ids() {
            let Some(peer) = self.peers.get_mut(&remote_id) else {
                continue;
            };

            let added = attach_tracks(&self.media, peer.transport.as_ref(), remote_id).await;
            if added {
                debug!(%remote_id, "new track kind attached, renegotiating");
                self.negotiate(remote_id).await;
            }
        }
    }

    /// Send a fresh offer, or queue one if a negotiation is already running.
    ///
    /// Once a session is established only the impolite side offers. The
    /// polite side asks for an offer instead, naming the kinds it wants to
    /// send, so two offers never cross on a live session.
    pub async fn negotiate(&mut self, remote_id: ParticipantId) {
        let Some(peer) = self.peers.get_mut(&remote_id) else {
            return;
        };
        if peer.phase != NegotiationPhase::Idle {
            debug!(%remote_id, phase = ?peer.phase, "negotiation in progress, queued");
            peer.negotiation_queued = true;
            return;
        }
        peer.negotiation_queued = false;

        if peer.is_established() && peer.is_polite() {
            let kinds = peer.transport.unnegotiated_kinds().await;
            if kinds.is_empty() {
                debug!(%remote_id, "nothing left to negotiate");
                return;
            }
            peer.phase = NegotiationPhase::AwaitingOffer;
            set_state(&self.events, peer, PeerState::Negotiating);

            debug!(%remote_id, ?kinds, "asking remote for an offer");
            self.signaling
                .send_signal(&remote_id, SignalPayload::Renegotiate { kinds });
            return;
        }

        let offer = peer.transport.create_offer().await;
        let sdp = match offer {
            Ok(sdp) => sdp,
            Err(e) => {
                self.fail_peer(remote_id, e).await;
                return;
            }
        };
        peer.phase = NegotiationPhase::HaveLocalOffer;
        set_state(&self.events, peer, PeerState::Negotiating);

        debug!(%remote_id, "sending offer");
        self.signaling.send_signal(&remote_id, SignalPayload::Offer { sdp });
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let remote_id = event.remote_id();
        let Some(peer) = self.peers.get_mut(&remote_id) else {
            debug!(%remote_id, "transport event for a closed peer");
            return;
        };
        if peer.generation() != event.generation() {
            debug!(%remote_id, generation = event.generation(), "event from a discarded transport");
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(_, _, candidate) => {
                self.signaling
                    .send_signal(&remote_id, SignalPayload::Candidate { candidate });
            }
            TransportEvent::Connected(..) => {
                info!(%remote_id, "media path connected");
                peer.media_connected = true;
                self.settle(remote_id).await;
            }
            TransportEvent::TrackReceived(_, _, track) => {
                if track.kind == TrackKind::Audio && self.audio.attach(remote_id) {
                    debug!(%remote_id, "audio channel attached");
                }
                publish(&self.events, MeshEvent::RemoteTrack { remote_id, track });
            }
            TransportEvent::Failed(..) => self.fail_peer(remote_id, "transport failed").await,
        }
    }

    /// Handle every transport event already queued. Returns how many ran.
    pub async fn process_pending_transport_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.transport_rx.try_recv() {
            self.handle_transport_event(event).await;
            handled += 1;
        }
        handled
    }

    pub async fn shutdown(&mut self) {
        let peers: Vec<_> = self.peers.drain().collect();
        for (remote_id, mut peer) in peers {
            self.audio.release(&remote_id);
            close_peer(&self.events, &mut peer).await;
            publish(&self.events, MeshEvent::PeerClosed(remote_id));
        }
        self.orphan_candidates.clear();
        self.failed.clear();
    }

    async fn accept_offer(&mut self, remote_id: ParticipantId, sdp: String) {
        let existing = self
            .peers
            .get(&remote_id)
            .map(|peer| (peer.phase, peer.is_polite(), peer.is_established()));

        match existing {
            None => {
                self.failed.remove(&remote_id);
                if let Err(e) = self.create_peer(remote_id, PeerRole::Responder).await {
                    error!(%remote_id, error = %e, "failed to create peer connection");
                    publish(&self.events, MeshEvent::PeerFailed(remote_id));
                    return;
                }
            }
            Some((NegotiationPhase::HaveLocalOffer, false, _)) => {
                debug!(%remote_id, "offer collision, keeping our own offer");
                return;
            }
            Some((NegotiationPhase::HaveLocalOffer, true, false)) => {
                info!(%remote_id, "offer collision, discarding our own offer");
                if let Err(e) = self.restart_as_responder(remote_id).await {
                    self.fail_peer(remote_id, e).await;
                    return;
                }
            }
            Some((NegotiationPhase::HaveLocalOffer, true, true)) => {
                // The polite side never offers on a live session, and the
                // session has no way to drop our offer without losing DTLS.
                self.fail_peer(remote_id, "offer collision on an established session")
                    .await;
                return;
            }
            Some((NegotiationPhase::HaveRemoteOffer, ..)) => {
                warn!(%remote_id, "offer arrived while answering another, ignoring");
                return;
            }
            Some((NegotiationPhase::Idle | NegotiationPhase::AwaitingOffer, ..)) => {}
        }

        let Some(peer) = self.peers.get_mut(&remote_id) else {
            return;
        };
        let requested = peer.phase == NegotiationPhase::AwaitingOffer;
        set_state(&self.events, peer, PeerState::Negotiating);

        let applied = peer.transport.set_remote_offer(sdp).await;
        if let Err(e) = applied {
            self.fail_peer(remote_id, e).await;
            return;
        }
        peer.remote_description_set = true;
        peer.phase = NegotiationPhase::HaveRemoteOffer;
        peer.flush_candidates().await;

        let answer = peer.transport.create_answer().await;
        let sdp = match answer {
            Ok(sdp) => sdp,
            Err(e) => {
                self.fail_peer(remote_id, e).await;
                return;
            }
        };
        peer.phase = NegotiationPhase::Idle;

        debug!(%remote_id, "sending answer");
        self.signaling.send_signal(&remote_id, SignalPayload::Answer { sdp });

        // Senders the offer had no section for need a negotiation of their
        // own, unless our request for one is still on its way.
        if !requested && !peer.transport.unnegotiated_kinds().await.is_empty() {
            debug!(%remote_id, "offer did not carry every local track, renegotiating");
            peer.negotiation_queued = true;
        }
        self.settle(remote_id).await;
    }

    /// The polite side wants to send `kinds` it added since the last exchange.
    async fn accept_renegotiation_request(&mut self, remote_id: ParticipantId, kinds: Vec<TrackKind>) {
        let Some(peer) = self.peers.get_mut(&remote_id) else {
            debug!(%remote_id, "renegotiation request from unknown peer, ignoring");
            return;
        };
        if peer.is_polite() {
            warn!(%remote_id, "renegotiation request from the side that should offer, ignoring");
            return;
        }

        for kind in kinds {
            if let Err(e) = peer.transport.add_receiver(kind).await {
                warn!(%remote_id, ?kind, error = %e, "failed to add receiver");
            }
        }
        self.negotiate(remote_id).await;
    }

    async fn accept_answer(&mut self, remote_id: ParticipantId, sdp: String) {
        let Some(peer) = self.peers.get_mut(&remote_id) else {
            debug!(%remote_id, "answer from unknown peer, ignoring");
            return;
        };
        if peer.phase != NegotiationPhase::HaveLocalOffer {
            debug!(%remote_id, phase = ?peer.phase, "stale answer, ignoring");
            return;
        }

        let applied = peer.transport.set_remote_answer(sdp).await;
        if let Err(e) = applied {
            self.fail_peer(remote_id, e).await;
            return;
        }
        peer.remote_description_set = true;
        peer.phase = NegotiationPhase::Idle;
        peer.flush_candidates().await;

        self.settle(remote_id).await;
    }

    async fn add_remote_candidate(&mut self, remote_id: ParticipantId, candidate: IceCandidate) {
        match self.peers.get_mut(&remote_id) {
            Some(peer) => peer.add_remote_candidate(candidate).await,
            None if self.failed.contains(&remote_id) => {
                debug!(%remote_id, "candidate for a failed peer, dropping it");
            }
            None => {
                debug!(%remote_id, "candidate for unknown peer, holding it");
                self.orphan_candidates
                    .entry(remote_id)
                    .or_default()
                    .push(candidate);
            }
        }
    }

    /// Called whenever the negotiation sub-state may have returned to idle.
    async fn settle(&mut self, remote_id: ParticipantId) {
        let Some(peer) = self.peers.get_mut(&remote_id) else {
            return;
        };
        if peer.phase != NegotiationPhase::Idle {
            return;
        }
        if peer.negotiation_queued {
            self.negotiate(remote_id).await;
        }

        let Some(peer) = self.peers.get_mut(&remote_id) else {
            return;
        };
        if peer.phase == NegotiationPhase::Idle && peer.media_connected {
            set_state(&self.events, peer, PeerState::Stable);
        }
    }

    async fn create_peer(&mut self, remote_id: ParticipantId, role: PeerRole) -> Result<(), MeshError> {
        let (transport, generation) = self.open_transport(remote_id).await?;
        let mut peer = PeerConnection::new(self.local_id, remote_id, role, transport, generation);
        if let Some(orphans) = self.orphan_candidates.remove(&remote_id) {
            peer.adopt_candidates(orphans);
        }

        info!(%remote_id, ?role, generation, "peer connection created");
        self.peers.insert(remote_id, peer);
        publish(
            &self.events,
            MeshEvent::StateChanged {
                remote_id,
                state: PeerState::Created,
            },
        );
        Ok(())
    }

    /// Drop our outstanding offer by moving to a brand new transport.
    async fn restart_as_responder(&mut self, remote_id: ParticipantId) -> Result<(), MeshError> {
        let (transport, generation) = self.open_transport(remote_id).await?;
        let Some(peer) = self.peers.get_mut(&remote_id) else {
            return Ok(());
        };
        let discarded = peer.replace_transport(transport, generation);
        peer.role = PeerRole::Responder;

        if let Err(e) = discarded.close().await {
            debug!(%remote_id, error = %e, "closing discarded transport failed");
        }
        Ok(())
    }

    async fn open_transport(&mut self, remote_id: ParticipantId) -> Result<(Box<dyn PeerTransport>, u64), MeshError> {
        let generation = self.next_generation;
        self.next_generation += 1;

        let events = TransportEvents::new(remote_id, generation, self.transport_tx.clone());
        let transport = self.factory.create(events).await?;
        attach_tracks(&self.media, transport.as_ref(), remote_id).await;

        Ok((transport, generation))
    }

    async fn fail_peer(&mut self, remote_id: ParticipantId, reason: impl fmt::Display) {
        self.audio.release(&remote_id);
        let Some(mut peer) = self.peers.remove(&remote_id) else {
            return;
        };
        self.orphan_candidates.remove(&remote_id);
        self.failed.insert(remote_id);

        error!(%remote_id, %reason, "peer connection failed, closing without retry");
        close_peer(&self.events, &mut peer).await;
        publish(&self.events, MeshEvent::PeerFailed(remote_id));
    }
}

/// Point every sender of `transport` at the current local tracks.
/// Returns `true` when a new sender was created.
async fn attach_tracks(media: &LocalMedia, transport: &dyn PeerTransport, remote_id: ParticipantId) -> bool {
    let mut added = false;
    for kind in TrackKind::ALL {
        match transport.set_track(kind, media.track(kind).cloned()).await {
            Ok(TrackUpdate::Added) => added = true,
            Ok(_) => {}
            Err(e) => warn!(%remote_id, ?kind, error = %e, "failed to update local track"),
        }
    }
    added
}

fn publish(events: &Option<mpsc::UnboundedSender<MeshEvent>>, event: MeshEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

fn set_state(events: &Option<mpsc::UnboundedSender<MeshEvent>>, peer: &mut PeerConnection, next: PeerState) {
    if peer.transition(next) {
        publish(
            events,
            MeshEvent::StateChanged {
                remote_id: peer.remote_id(),
                state: next,
            },
        );
    }
}

async fn close_peer(events: &Option<mpsc::UnboundedSender<MeshEvent>>, peer: &mut PeerConnection) {
    if let Err(e) = peer.transport.close().await {
        debug!(remote_id = %peer.remote_id(), error = %e, "transport close failed");
    }
    set_state(events, peer, PeerState::Closed);
}
