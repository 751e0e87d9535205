use tokio::sync::mpsc;
use townsquare_core::{ClientMessage, ParticipantId, SignalPayload};
use tracing::{error, warn};

/// Outgoing half of the signaling relay as seen by the mesh.
///
/// Delivery is fire-and-forget: the server drops payloads for targets that
/// are gone and never reports it.
pub trait SignalingSink: Send + Sync {
    fn send_signal(&self, target_id: &ParticipantId, payload: SignalPayload);
}

/// Sends signals over the session's WebSocket writer.
pub(crate) struct WsSignaling {
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl WsSignaling {
    pub(crate) fn new(outbound: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self { outbound }
    }
}

impl SignalingSink for WsSignaling {
    fn send_signal(&self, target_id: &ParticipantId, payload: SignalPayload) {
        let signal = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(e) => {
                error!(%target_id, error = %e, "failed to encode signal");
                return;
            }
        };

        let msg = ClientMessage::Signal {
            target_id: *target_id,
            signal,
        };
        if self.outbound.send(msg).is_err() {
            warn!(%target_id, "signal dropped: session writer is gone");
        }
    }
}
