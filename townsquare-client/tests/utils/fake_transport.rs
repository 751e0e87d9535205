use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use townsquare_client::{LocalTrack, MeshError, PeerTransport, TrackKind, TrackUpdate, TransportEvents, TransportFactory};
use townsquare_core::{IceCandidate, ParticipantId};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// What a fake transport has been asked to do so far.
#[derive(Debug, Default)]
pub struct FakeState {
    pub local_description: Option<String>,
    pub remote_description: Option<String>,
    pub applied_candidates: Vec<IceCandidate>,
    /// One entry per sender; the value is the id of the track it sends, if any.
    pub senders: HashMap<TrackKind, Option<String>>,
    /// Senders some offer or answer has carried.
    pub negotiated: HashSet<TrackKind>,
    pub receivers: Vec<TrackKind>,
    /// Label of the remote transport this one is paired with.
    pub remote_session: Option<String>,
    pub failed: bool,
    pub closed: bool,
}

impl FakeState {
    /// One `m=` line per sender and requested receiver, like a real offer.
    fn media_lines(&self) -> String {
        let mut lines = String::new();
        for kind in TrackKind::ALL {
            if self.senders.contains_key(&kind) {
                lines.push_str(&format!("\nm={}", kind.as_str()));
            }
        }
        for kind in &self.receivers {
            lines.push_str(&format!("\nm={} recvonly", kind.as_str()));
        }
        lines
    }

    /// A second remote endpoint on an established session breaks DTLS,
    /// which a real transport reports as a failure.
    fn pair_with(&mut self, sdp: &str) -> bool {
        let session = session_of(sdp);
        match &self.remote_session {
            Some(current) if *current != session => {
                self.failed = true;
                false
            }
            _ => {
                self.remote_session = Some(session);
                true
            }
        }
    }
}

fn session_of(sdp: &str) -> String {
    let first = sdp.lines().next().unwrap_or_default();
    first
        .split_once(" from ")
        .map_or(first, |(_, label)| label)
        .to_owned()
}

/// In-memory transport. It "connects" as soon as both descriptions are set
/// and emits one local candidate per description it creates.
pub struct FakeTransport {
    label: String,
    events: TransportEvents,
    state: Arc<Mutex<FakeState>>,
    reject_remote_offers: bool,
}

impl FakeTransport {
    fn emit_candidate(&self) {
        self.events.candidate(candidate(&format!("candidate:{}", self.label)));
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn create_offer(&self) -> Result<String, MeshError> {
        let sdp = {
            let mut state = self.state.lock().unwrap();
            let sdp = format!("offer from {}{}", self.label, state.media_lines());
            let carried: Vec<_> = state.senders.keys().copied().collect();
            state.negotiated.extend(carried);
            state.local_description = Some(sdp.clone());
            sdp
        };
        self.emit_candidate();
        Ok(sdp)
    }

    async fn create_answer(&self) -> Result<String, MeshError> {
        let sdp = {
            let mut state = self.state.lock().unwrap();
            if state.remote_description.is_none() {
                return Err(MeshError::Negotiation("no remote offer".into()));
            }
            let mut sdp = format!("answer from {}", self.label);
            for kind in TrackKind::ALL {
                if state.negotiated.contains(&kind) {
                    sdp.push_str(&format!("\nm={}", kind.as_str()));
                }
            }
            state.local_description = Some(sdp.clone());
            sdp
        };
        self.emit_candidate();
        self.events.connected();
        Ok(sdp)
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<(), MeshError> {
        if self.reject_remote_offers || sdp.is_empty() {
            return Err(MeshError::Negotiation("malformed offer".into()));
        }
        let paired = {
            let mut state = self.state.lock().unwrap();
            let paired = state.pair_with(&sdp);
            // Our senders ride on any section of their kind.
            for kind in TrackKind::ALL {
                if kind.is_offered_in(&sdp) && state.senders.contains_key(&kind) {
                    state.negotiated.insert(kind);
                }
            }
            state.remote_description = Some(sdp);
            paired
        };
        if !paired {
            self.events.failed();
        }
        Ok(())
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<(), MeshError> {
        let paired = {
            let mut state = self.state.lock().unwrap();
            if state.local_description.is_none() {
                return Err(MeshError::Negotiation("answer without offer".into()));
            }
            let paired = state.pair_with(&sdp);
            state.remote_description = Some(sdp);
            paired
        };
        if paired {
            self.events.connected();
        } else {
            self.events.failed();
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MeshError> {
        let mut state = self.state.lock().unwrap();
        if state.remote_description.is_none() {
            return Err(MeshError::Negotiation("remote description not set".into()));
        }
        state.applied_candidates.push(candidate);
        Ok(())
    }

    async fn set_track(&self, kind: TrackKind, track: Option<LocalTrack>) -> Result<TrackUpdate, MeshError> {
        let mut state = self.state.lock().unwrap();
        let track_id = track.map(|t| t.id().to_owned());
        match state.senders.get_mut(&kind) {
            Some(sending) => {
                *sending = track_id;
                Ok(TrackUpdate::Replaced)
            }
            None if track_id.is_some() => {
                state.senders.insert(kind, track_id);
                Ok(TrackUpdate::Added)
            }
            None => Ok(TrackUpdate::Unchanged),
        }
    }

    async fn add_receiver(&self, kind: TrackKind) -> Result<(), MeshError> {
        self.state.lock().unwrap().receivers.push(kind);
        Ok(())
    }

    async fn unnegotiated_kinds(&self) -> Vec<TrackKind> {
        let state = self.state.lock().unwrap();
        TrackKind::ALL
            .into_iter()
            .filter(|kind| state.senders.contains_key(kind) && !state.negotiated.contains(kind))
            .collect()
    }

    async fn close(&self) -> Result<(), MeshError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFactory {
    created: Mutex<Vec<(ParticipantId, Arc<Mutex<FakeState>>)>>,
    pub reject_remote_offers: AtomicBool,
}

impl FakeFactory {
    pub fn rejecting_offers() -> Self {
        Self {
            reject_remote_offers: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Every transport built toward `remote_id`, oldest first.
    pub fn transports_for(&self, remote_id: ParticipantId) -> Vec<Arc<Mutex<FakeState>>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == remote_id)
            .map(|(_, state)| state.clone())
            .collect()
    }

    pub fn latest(&self, remote_id: ParticipantId) -> Arc<Mutex<FakeState>> {
        self.transports_for(remote_id)
            .pop()
            .expect("no transport created for remote")
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn create(&self, events: TransportEvents) -> Result<Box<dyn PeerTransport>, MeshError> {
        let remote_id = events.remote_id();
        let state = Arc::new(Mutex::new(FakeState::default()));
        let mut created = self.created.lock().unwrap();
        let label = format!("{remote_id}#{}", created.len());
        created.push((remote_id, state.clone()));

        Ok(Box::new(FakeTransport {
            label,
            events,
            state,
            reject_remote_offers: self.reject_remote_offers.load(Ordering::SeqCst),
        }))
    }
}

pub fn candidate(candidate: &str) -> IceCandidate {
    IceCandidate {
        candidate: candidate.to_owned(),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
    }
}

pub fn audio_track(id: &str) -> LocalTrack {
    let track = TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            ..Default::default()
        },
        id.to_owned(),
        "local-stream".to_owned(),
    );
    LocalTrack::new(TrackKind::Audio, Arc::new(track))
}

pub fn video_track(id: &str) -> LocalTrack {
    let track = TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            ..Default::default()
        },
        id.to_owned(),
        "local-stream".to_owned(),
    );
    LocalTrack::new(TrackKind::Video, Arc::new(track))
}
