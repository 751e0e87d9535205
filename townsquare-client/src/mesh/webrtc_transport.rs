use crate::error::MeshError;
use crate::mesh::media::{LocalTrack, RemoteTrack, TrackKind};
use crate::mesh::peer_transport::{PeerTransport, TrackUpdate, TransportEvents, TransportFactory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use townsquare_core::utils::DEFAULT_STUN_ADDR;
use townsquare_core::{IceCandidate, IceServerConfig};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

/// Label of the data channel every offer carries, so a participant without
/// any media still has something to negotiate.
const PRESENCE_CHANNEL: &str = "presence";

/// Builds [`WebRtcTransport`]s sharing one media engine setup.
pub struct WebRtcTransportFactory {
    api: API,
    ice_servers: Vec<RTCIceServer>,
}

impl WebRtcTransportFactory {
    pub fn new(ice_servers: &[IceServerConfig]) -> Result<Self, MeshError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            ice_servers: rtc_ice_servers(ice_servers),
        })
    }
}

fn rtc_ice_servers(configs: &[IceServerConfig]) -> Vec<RTCIceServer> {
    if configs.is_empty() {
        return vec![RTCIceServer {
            urls: vec![DEFAULT_STUN_ADDR.to_owned()],
            username: String::new(),
            credential: String::new(),
        }];
    }

    configs
        .iter()
        .map(|config| RTCIceServer {
            urls: config.urls.clone(),
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(&self, events: TransportEvents) -> Result<Box<dyn PeerTransport>, MeshError> {
        let rtc_config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };
        let peer_connection = Arc::new(self.api.new_peer_connection(rtc_config).await?);
        let remote_id = events.remote_id();

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let events = state_events.clone();

            Box::pin(async move {
                info!(remote_id = %events.remote_id(), state = ?s, "peer connection state changed");
                match s {
                    RTCPeerConnectionState::Connected => events.connected(),
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => events.failed(),
                    _ => {}
                }
            })
        }));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                match candidate.to_json() {
                    Ok(init) => events.candidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                    }),
                    Err(e) => warn!(remote_id = %events.remote_id(), error = %e, "failed to serialize local candidate"),
                }
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    debug!(remote_id = %events.remote_id(), ?kind, "remote track arrived");
                    events.track(RemoteTrack {
                        kind,
                        handle: Some(track),
                    });
                })
            },
        ));

        let presence = peer_connection.create_data_channel(PRESENCE_CHANNEL, None).await?;
        debug!(%remote_id, label = presence.label(), "presence channel created");

        Ok(Box::new(WebRtcTransport {
            peer_connection,
            senders: Mutex::new(HashMap::new()),
        }))
    }
}

/// [`PeerTransport`] backed by a `webrtc` peer connection.
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackKind, Arc<RTCRtpSender>>>,
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_offer(&self) -> Result<String, MeshError> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, MeshError> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<(), MeshError> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<(), MeshError> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MeshError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn set_track(&self, kind: TrackKind, track: Option<LocalTrack>) -> Result<TrackUpdate, MeshError> {
        let mut senders = self.senders.lock().await;

        if let Some(sender) = senders.get(&kind).cloned() {
            sender.replace_track(track.map(|t| t.handle())).await?;
            return Ok(TrackUpdate::Replaced);
        }

        let Some(track) = track else {
            return Ok(TrackUpdate::Unchanged);
        };
        let sender = self.peer_connection.add_track(track.handle()).await?;
        senders.insert(kind, sender);
        Ok(TrackUpdate::Added)
    }

    async fn add_receiver(&self, kind: TrackKind) -> Result<(), MeshError> {
        let codec_type = match kind {
            TrackKind::Audio => RTPCodecType::Audio,
            TrackKind::Video => RTPCodecType::Video,
        };
        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: Vec::new(),
        };
        self.peer_connection
            .add_transceiver_from_kind(codec_type, Some(init))
            .await?;
        Ok(())
    }

    async fn unnegotiated_kinds(&self) -> Vec<TrackKind> {
        let senders = self.senders.lock().await;
        let mut kinds = Vec::new();

        // A transceiver gets its mid once a description has carried it.
        for transceiver in self.peer_connection.get_transceivers().await {
            if transceiver.mid().is_some() {
                continue;
            }
            let sender = transceiver.sender().await;
            for (kind, known) in senders.iter() {
                if Arc::ptr_eq(known, &sender) && !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
        }
        kinds
    }

    async fn close(&self) -> Result<(), MeshError> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
