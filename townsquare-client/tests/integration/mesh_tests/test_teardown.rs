use std::sync::Arc;
use townsquare_client::{MeshEvent, PeerState, RemoteTrack, TrackKind, TransportEvent};
use townsquare_core::ParticipantId;

use super::complete_offer;
use crate::integration::{create_test_mesh, drain_events, init_tracing};
use crate::utils::{FakeFactory, SignalWire};

#[tokio::test]
async fn test_user_left_is_idempotent() {
    init_tracing();
    let (local, remote) = (ParticipantId::new(), ParticipantId::new());
    let wire = Arc::new(SignalWire::default());
    let mut mesh = create_test_mesh(local, &wire, FakeFactory::default());
    mesh.manager.handle_user_joined(remote).await;
    complete_offer(&mut mesh.manager, remote).await;

    let generation = mesh.manager.peer(&remote).unwrap().generation();
    mesh.manager
        .handle_transport_event(TransportEvent::TrackReceived(
            remote,
            generation,
            RemoteTrack {
                kind: TrackKind::Audio,
                handle: None,
            },
        ))
        .await;
    assert_eq!(mesh.audio.peer_gain(&remote), Some(0.0));
    drain_events(&mut mesh.events);

    mesh.manager.handle_user_left(remote).await;
    mesh.manager.handle_user_left(remote).await;

    assert!(mesh.manager.is_empty());
    assert_eq!(mesh.audio.peer_gain(&remote), None);
    assert!(mesh.factory.latest(remote).lock().unwrap().closed);

    let closed: Vec<_> = drain_events(&mut mesh.events)
        .into_iter()
        .filter(|event| matches!(event, MeshEvent::PeerClosed(id) if *id == remote))
        .collect();
    assert_eq!(closed.len(), 1);
}

#[tokio::test]
async fn test_events_for_departed_peer_are_ignored() {
    init_tracing();
    let (local, remote) = (ParticipantId::new(), ParticipantId::new());
    let wire = Arc::new(SignalWire::default());
    let mut mesh = create_test_mesh(local, &wire, FakeFactory::default());
    mesh.manager.handle_user_joined(remote).await;
    let generation = mesh.manager.peer(&remote).unwrap().generation();

    mesh.manager.handle_user_left(remote).await;
    // Queued candidate and connection events from the closed transport.
    mesh.manager.process_pending_transport_events().await;
    mesh.manager
        .handle_transport_event(TransportEvent::Connected(remote, generation))
        .await;

    assert!(mesh.manager.is_empty());
    assert_eq!(mesh.factory.created_count(), 1);
}

#[tokio::test]
async fn test_joins_for_self_or_known_peer_are_ignored() {
    init_tracing();
    let (local, remote) = (ParticipantId::new(), ParticipantId::new());
    let wire = Arc::new(SignalWire::default());
    let mut mesh = create_test_mesh(local, &wire, FakeFactory::default());

    mesh.manager.handle_user_joined(local).await;
    mesh.manager.handle_user_joined(remote).await;
    mesh.manager.handle_user_joined(remote).await;

    assert_eq!(mesh.manager.len(), 1);
    assert_eq!(mesh.factory.created_count(), 1);
    assert_eq!(wire.take().len(), 1, "exactly one offer");
    assert_eq!(mesh.manager.peer(&remote).unwrap().state(), PeerState::Negotiating);
}

#[tokio::test]
async fn test_shutdown_closes_every_peer() {
    init_tracing();
    let local = ParticipantId::new();
    let remotes = [ParticipantId::new(), ParticipantId::new(), ParticipantId::new()];
    let wire = Arc::new(SignalWire::default());
    let mut mesh = create_test_mesh(local, &wire, FakeFactory::default());
    for remote in remotes {
        mesh.manager.handle_user_joined(remote).await;
    }

    mesh.manager.shutdown().await;

    assert!(mesh.manager.is_empty());
    for remote in remotes {
        assert!(mesh.factory.latest(remote).lock().unwrap().closed);
    }
}
