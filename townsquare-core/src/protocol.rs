use crate::model::{
    Direction, IceServerConfig, InteractiveObject, ObjectPatch, Participant, ParticipantId, Role,
    WorldState,
};
use serde::{Deserialize, Serialize};

/// Join payload. Every field is optional; the registry fills in safe defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinRequest {
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub avatar_config: Option<serde_json::Value>,
    pub camera_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub camera_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDelta {
    pub id: ParticipantId,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub camera_enabled: bool,
}

/// Frames sent by a client. Wire shape: `{"op": "<name>", "d": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Join(JoinRequest),
    Move(MoveRequest),
    Signal {
        target_id: ParticipantId,
        signal: serde_json::Value,
    },
    AdminUploadBackground {
        image: String,
    },
    AdminClearBackground,
    AdminAddObject(InteractiveObject),
    AdminUpdateObject(ObjectPatch),
    AdminDeleteObject {
        id: String,
    },
}

impl ClientMessage {
    pub fn is_world_mutation(&self) -> bool {
        matches!(
            self,
            ClientMessage::AdminUploadBackground { .. }
                | ClientMessage::AdminClearBackground
                | ClientMessage::AdminAddObject(_)
                | ClientMessage::AdminUpdateObject(_)
                | ClientMessage::AdminDeleteObject { .. }
        )
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Welcome {
        participant_id: ParticipantId,
        role: Role,
        ice_servers: Vec<IceServerConfig>,
    },
    ExistingUsers(Vec<Participant>),
    MapUpdate(WorldState),
    UserJoined(Participant),
    UserMoved(MoveDelta),
    UserLeft(ParticipantId),
    Signal {
        sender_id: ParticipantId,
        signal: serde_json::Value,
    },
}
