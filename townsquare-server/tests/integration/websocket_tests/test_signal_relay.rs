use serde_json::json;
use townsquare_core::{ClientMessage, ParticipantId, ServerMessage};
use townsquare_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{TestClient, spawn_server};

#[tokio::test]
async fn test_signal_is_forwarded_with_server_stamped_sender() {
    init_tracing();
    let addr = spawn_server(ServerConfig::default()).await;

    let (mut alice, _) = TestClient::join(addr, "alice", 0.0, 0.0).await.unwrap();
    let (mut bob, _) = TestClient::join(addr, "bob", 1.0, 0.0).await.unwrap();
    alice.recv().await.unwrap();

    let payload = json!({"type": "offer", "sdp": "v=0\r\n"});
    alice
        .send(&ClientMessage::Signal {
            target_id: bob.id(),
            signal: payload.clone(),
        })
        .await
        .unwrap();

    assert_eq!(
        bob.recv().await.unwrap(),
        ServerMessage::Signal {
            sender_id: alice.id(),
            signal: payload,
        }
    );
}

#[tokio::test]
async fn test_signal_to_unknown_target_is_dropped_quietly() {
    init_tracing();
    let addr = spawn_server(ServerConfig::default()).await;

    let (mut alice, _) = TestClient::join(addr, "alice", 0.0, 0.0).await.unwrap();
    alice
        .send(&ClientMessage::Signal {
            target_id: ParticipantId::new(),
            signal: json!({"type": "candidate"}),
        })
        .await
        .unwrap();
    alice.expect_silence(200).await.expect("no error is reported back");

    // The connection keeps working afterwards.
    let (_bob, _) = TestClient::join(addr, "bob", 0.0, 0.0).await.unwrap();
    assert!(matches!(
        alice.recv().await.unwrap(),
        ServerMessage::UserJoined(_)
    ));
}
