use crate::signaling::Outbound;
use std::sync::Arc;
use townsquare_core::{ParticipantId, ServerMessage};
use tracing::debug;

/// Forwards opaque negotiation payloads between two connections.
///
/// Nothing is stored. A target that is not connected silently loses the
/// message; the mesh recovers on the next join/leave cycle.
#[derive(Clone)]
pub struct SignalRelay {
    outbound: Arc<dyn Outbound>,
}

impl SignalRelay {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self { outbound }
    }

    /// Returns whether the payload was handed to the target's connection.
    pub fn relay(
        &self,
        sender_id: ParticipantId,
        target_id: ParticipantId,
        signal: serde_json::Value,
    ) -> bool {
        let msg = ServerMessage::Signal { sender_id, signal };
        let delivered = self.outbound.send(&target_id, &msg);
        if !delivered {
            debug!(%sender_id, %target_id, "dropping signal for disconnected target");
        }
        delivered
    }
}
