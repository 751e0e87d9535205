use crate::signaling::Outbound;
use std::collections::HashMap;
use std::sync::Arc;
use townsquare_core::{
    JoinRequest, MoveDelta, MoveRequest, Participant, ParticipantId, Position, Role, ServerMessage,
};
use tracing::{debug, info};

struct Session {
    participant: Participant,
    role: Role,
}

/// Authoritative table of joined participants.
///
/// Every mutation is followed by the matching broadcast; callers never
/// announce presence changes themselves.
pub struct SessionRegistry {
    sessions: HashMap<ParticipantId, Session>,
    outbound: Arc<dyn Outbound>,
}

impl SessionRegistry {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self {
            sessions: HashMap::new(),
            outbound,
        }
    }

    /// Register (or re-register) a participant and announce it to everyone else.
    ///
    /// Returns the other participants, which the caller hands to the joiner.
    /// Coordinates are taken as given.
    pub fn join(&mut self, participant_id: ParticipantId, req: JoinRequest, role: Role) -> Vec<Participant> {
        let participant = Participant {
            id: participant_id,
            display_name: req.name.unwrap_or_default(),
            position: Position::new(req.x.unwrap_or_default(), req.y.unwrap_or_default()),
            direction: Default::default(),
            camera_enabled: req.camera_enabled.unwrap_or(false),
            avatar_config: req
                .avatar_config
                .filter(|config| !config.is_null())
                .unwrap_or_else(|| serde_json::json!({})),
        };

        info!(%participant_id, name = %participant.display_name, ?role, "participant joined");

        let previous = self.sessions.insert(
            participant_id,
            Session {
                participant: participant.clone(),
                role,
            },
        );
        if previous.is_some() {
            debug!(%participant_id, "join replaced an existing session");
        }

        self.outbound
            .broadcast(&ServerMessage::UserJoined(participant), Some(&participant_id));

        self.sessions
            .values()
            .filter(|session| session.participant.id != participant_id)
            .map(|session| session.participant.clone())
            .collect()
    }

    /// Apply a movement update and relay it to every other connection.
    /// Returns `false` when the connection has not joined.
    pub fn move_participant(&mut self, participant_id: ParticipantId, req: MoveRequest) -> bool {
        let Some(session) = self.sessions.get_mut(&participant_id) else {
            debug!(%participant_id, "move from a connection that never joined");
            return false;
        };

        let participant = &mut session.participant;
        participant.position = Position::new(req.x, req.y);
        participant.direction = req.direction;
        participant.camera_enabled = req.camera_enabled;

        let delta = MoveDelta {
            id: participant_id,
            x: req.x,
            y: req.y,
            direction: req.direction,
            camera_enabled: req.camera_enabled,
        };
        self.outbound
            .broadcast(&ServerMessage::UserMoved(delta), Some(&participant_id));
        true
    }

    /// Remove a participant and tell the remaining connections.
    /// Calling it again for the same id does nothing.
    pub fn leave(&mut self, participant_id: &ParticipantId) -> bool {
        if self.sessions.remove(participant_id).is_none() {
            return false;
        }

        info!(%participant_id, "participant left");
        self.outbound
            .broadcast(&ServerMessage::UserLeft(*participant_id), Some(participant_id));
        true
    }

    pub fn role(&self, participant_id: &ParticipantId) -> Option<Role> {
        self.sessions.get(participant_id).map(|session| session.role)
    }

    pub fn get(&self, participant_id: &ParticipantId) -> Option<&Participant> {
        self.sessions.get(participant_id).map(|session| &session.participant)
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.sessions
            .values()
            .map(|session| session.participant.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
