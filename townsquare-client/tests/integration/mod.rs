pub mod session_tests;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

use townsquare_client::{AudioChannels, MeshEvent, PeerMeshManager};
use townsquare_core::ParticipantId;

use crate::utils::{FakeFactory, SignalWire};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Two fresh ids, smaller first.
pub fn ordered_ids() -> (ParticipantId, ParticipantId) {
    let (a, b) = (ParticipantId::new(), ParticipantId::new());
    if a < b { (a, b) } else { (b, a) }
}

pub struct TestMesh {
    pub manager: PeerMeshManager,
    pub factory: Arc<FakeFactory>,
    pub audio: Arc<AudioChannels>,
    pub events: mpsc::UnboundedReceiver<MeshEvent>,
}

pub fn create_test_mesh(local_id: ParticipantId, wire: &Arc<SignalWire>, factory: FakeFactory) -> TestMesh {
    let factory = Arc::new(factory);
    let audio = Arc::new(AudioChannels::new());
    let (events_tx, events) = mpsc::unbounded_channel();
    let manager = PeerMeshManager::new(local_id, factory.clone(), wire.end(local_id), audio.clone())
        .with_events(events_tx);

    TestMesh {
        manager,
        factory,
        audio,
        events,
    }
}

pub fn drain_events(events: &mut mpsc::UnboundedReceiver<MeshEvent>) -> Vec<MeshEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
