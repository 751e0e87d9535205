use std::collections::HashSet;

use townsquare_core::{ClientMessage, JoinRequest, ParticipantId, ServerMessage};
use townsquare_server::{SpaceCommand, SpaceSettings};

use crate::integration::{create_test_space, init_tracing};
use crate::utils::{drain, received_by};

fn join(name: &str) -> ClientMessage {
    ClientMessage::Join(JoinRequest {
        name: Some(name.into()),
        ..Default::default()
    })
}

/// Replays what a client would build from the messages it received.
fn replica(messages: &[ServerMessage], me: &ParticipantId) -> HashSet<ParticipantId> {
    let mut seen = HashSet::new();
    for msg in messages {
        match msg {
            ServerMessage::ExistingUsers(users) => seen.extend(users.iter().map(|u| u.id)),
            ServerMessage::UserJoined(p) => {
                seen.insert(p.id);
            }
            ServerMessage::UserLeft(id) => {
                seen.remove(id);
            }
            _ => {}
        }
    }
    seen.remove(me);
    seen
}

#[tokio::test]
async fn test_every_replica_matches_registry_after_joins_and_leaves() {
    init_tracing();

    let (cmd_tx, mut delivered_rx, outbound) = create_test_space(SpaceSettings::default());
    let ids: Vec<_> = (0..4).map(|_| ParticipantId::new()).collect();

    for (i, id) in ids.iter().enumerate() {
        outbound.connect(*id);
        cmd_tx
            .send(SpaceCommand::Message {
                participant_id: *id,
                message: join(&format!("p{i}")),
            })
            .await
            .unwrap();
    }

    // The second participant drops out.
    outbound.disconnect(&ids[1]);
    cmd_tx
        .send(SpaceCommand::Disconnect {
            participant_id: ids[1],
        })
        .await
        .unwrap();

    let deliveries = drain(&mut delivered_rx).await;

    let registry: HashSet<_> = [ids[0], ids[2], ids[3]].into_iter().collect();
    for id in [ids[0], ids[2], ids[3]] {
        let mut expected = registry.clone();
        expected.remove(&id);
        assert_eq!(
            replica(&received_by(&deliveries, &id), &id),
            expected,
            "replica of {id} diverged"
        );
    }
}

#[tokio::test]
async fn test_repeated_disconnect_announces_once() {
    init_tracing();

    let (cmd_tx, mut delivered_rx, outbound) = create_test_space(SpaceSettings::default());
    let (a, b) = (ParticipantId::new(), ParticipantId::new());
    for id in [a, b] {
        outbound.connect(id);
        cmd_tx
            .send(SpaceCommand::Message {
                participant_id: id,
                message: join("x"),
            })
            .await
            .unwrap();
    }
    drain(&mut delivered_rx).await;

    outbound.disconnect(&b);
    for _ in 0..2 {
        cmd_tx
            .send(SpaceCommand::Disconnect { participant_id: b })
            .await
            .unwrap();
    }

    let deliveries = drain(&mut delivered_rx).await;
    assert_eq!(received_by(&deliveries, &a), vec![ServerMessage::UserLeft(b)]);
}
