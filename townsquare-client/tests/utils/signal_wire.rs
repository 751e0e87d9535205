use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use townsquare_client::{PeerMeshManager, SignalingSink};
use townsquare_core::{ParticipantId, SignalPayload};

/// Upper bound on pump rounds before a negotiation is considered stuck.
const MAX_ROUNDS: usize = 200;

#[derive(Debug, Clone)]
pub struct Routed {
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub payload: SignalPayload,
}

/// Stands in for the server relay: a single FIFO shared by every endpoint.
#[derive(Default)]
pub struct SignalWire {
    queue: Mutex<VecDeque<Routed>>,
}

impl SignalWire {
    pub fn end(self: &Arc<Self>, local_id: ParticipantId) -> Arc<WireEnd> {
        Arc::new(WireEnd {
            local_id,
            wire: self.clone(),
        })
    }

    pub fn pop(&self) -> Option<Routed> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn take(&self) -> Vec<Routed> {
        self.queue.lock().unwrap().drain(..).collect()
    }
}

pub struct WireEnd {
    local_id: ParticipantId,
    wire: Arc<SignalWire>,
}

impl SignalingSink for WireEnd {
    fn send_signal(&self, target_id: &ParticipantId, payload: SignalPayload) {
        self.wire.queue.lock().unwrap().push_back(Routed {
            from: self.local_id,
            to: *target_id,
            payload,
        });
    }
}

pub fn to_signal(payload: SignalPayload) -> serde_json::Value {
    serde_json::to_value(payload).unwrap()
}

/// Deliver signals and transport events between two managers until both go quiet.
pub async fn pump(a: &mut PeerMeshManager, b: &mut PeerMeshManager, wire: &SignalWire) {
    for _ in 0..MAX_ROUNDS {
        let handled = a.process_pending_transport_events().await + b.process_pending_transport_events().await;

        let Some(routed) = wire.pop() else {
            if handled == 0 {
                return;
            }
            continue;
        };

        let target = if routed.to == a.local_id() { &mut *a } else { &mut *b };
        target.handle_signal(routed.from, to_signal(routed.payload)).await;
    }
    panic!("signaling did not settle after {MAX_ROUNDS} rounds");
}
