use crate::mesh::media::{LocalMedia, RemoteTrack};
use crate::mesh::peer_connection::PeerState;
use townsquare_core::{ParticipantId, ServerMessage};

/// Input to the mesh loop from the session.
#[derive(Debug)]
pub enum MeshCommand {
    UserJoined(ParticipantId),
    UserLeft(ParticipantId),
    Signal {
        sender_id: ParticipantId,
        signal: serde_json::Value,
    },
    SetLocalMedia(LocalMedia),
}

impl MeshCommand {
    /// The part of a server message the mesh cares about, if any.
    pub fn from_server(msg: &ServerMessage) -> Option<Self> {
        match msg {
            ServerMessage::UserJoined(participant) => Some(MeshCommand::UserJoined(participant.id)),
            ServerMessage::UserLeft(id) => Some(MeshCommand::UserLeft(*id)),
            ServerMessage::Signal { sender_id, signal } => Some(MeshCommand::Signal {
                sender_id: *sender_id,
                signal: signal.clone(),
            }),
            _ => None,
        }
    }
}

/// Published for UI collaborators.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    StateChanged {
        remote_id: ParticipantId,
        state: PeerState,
    },
    RemoteTrack {
        remote_id: ParticipantId,
        track: RemoteTrack,
    },
    PeerClosed(ParticipantId),
    PeerFailed(ParticipantId),
}
