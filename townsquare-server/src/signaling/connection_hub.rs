use crate::signaling::Outbound;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use townsquare_core::{ParticipantId, ServerMessage};
use tracing::{debug, error};

/// Per-connection outbound queues, keyed by the id assigned at upgrade.
#[derive(Clone, Default)]
pub struct ConnectionHub {
    peers: Arc<DashMap<ParticipantId, mpsc::UnboundedSender<Message>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&self, participant_id: ParticipantId, tx: mpsc::UnboundedSender<Message>) {
        self.peers.insert(participant_id, tx);
    }

    pub fn remove_connection(&self, participant_id: &ParticipantId) {
        self.peers.remove(participant_id);
    }

    pub fn is_connected(&self, participant_id: &ParticipantId) -> bool {
        self.peers.contains_key(participant_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn encode(msg: &ServerMessage) -> Option<Message> {
        match serde_json::to_string(msg) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                error!(error = %e, "failed to serialize server message");
                None
            }
        }
    }
}

impl Outbound for ConnectionHub {
    fn send(&self, to: &ParticipantId, msg: &ServerMessage) -> bool {
        let Some(peer) = self.peers.get(to) else {
            return false;
        };
        let Some(frame) = Self::encode(msg) else {
            return false;
        };
        if peer.send(frame).is_err() {
            debug!(participant_id = %to, "outbound queue closed");
            return false;
        }
        true
    }

    fn broadcast(&self, msg: &ServerMessage, except: Option<&ParticipantId>) {
        let Some(frame) = Self::encode(msg) else {
            return;
        };

        // Collect first so no map guard is held while pushing frames.
        let targets: Vec<_> = self
            .peers
            .iter()
            .filter(|entry| Some(entry.key()) != except)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (participant_id, tx) in targets {
            if tx.send(frame.clone()).is_err() {
                debug!(%participant_id, "outbound queue closed during broadcast");
            }
        }
    }
}
