use dashmap::DashMap;
use std::sync::{PoisonError, RwLock};
use townsquare_core::{Participant, ParticipantId, Position, Role, ServerMessage, WorldState};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct LocalPresence {
    id: Option<ParticipantId>,
    role: Role,
    position: Position,
}

/// The client's read-only replica of the space: everyone else's presence
/// plus the world document. The local participant is tracked separately and
/// never appears among `participants`.
#[derive(Debug)]
pub struct WorldView {
    local: RwLock<LocalPresence>,
    participants: DashMap<ParticipantId, Participant>,
    world: RwLock<WorldState>,
}

impl Default for WorldView {
    fn default() -> Self {
        Self {
            local: RwLock::new(LocalPresence {
                id: None,
                role: Role::default(),
                position: Position::default(),
            }),
            participants: DashMap::new(),
            world: RwLock::new(WorldState::default()),
        }
    }
}

impl WorldView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, msg: &ServerMessage) {
        match msg {
            ServerMessage::Welcome {
                participant_id,
                role,
                ..
            } => {
                let mut local = self.local.write().unwrap_or_else(PoisonError::into_inner);
                local.id = Some(*participant_id);
                local.role = *role;
                self.participants.remove(participant_id);
            }
            ServerMessage::ExistingUsers(users) => {
                self.participants.clear();
                for user in users {
                    self.upsert(user);
                }
            }
            ServerMessage::UserJoined(participant) => self.upsert(participant),
            ServerMessage::UserMoved(delta) => {
                if self.is_local(&delta.id) {
                    return;
                }
                match self.participants.get_mut(&delta.id) {
                    Some(mut participant) => {
                        participant.position = Position::new(delta.x, delta.y);
                        participant.direction = delta.direction;
                        participant.camera_enabled = delta.camera_enabled;
                    }
                    None => debug!(participant_id = %delta.id, "move for unknown participant"),
                }
            }
            ServerMessage::UserLeft(id) => {
                self.participants.remove(id);
            }
            ServerMessage::MapUpdate(state) => {
                *self.world.write().unwrap_or_else(PoisonError::into_inner) = state.clone();
            }
            ServerMessage::Signal { .. } => {}
        }
    }

    pub fn set_local_position(&self, position: Position) {
        self.local
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .position = position;
    }

    pub fn local_id(&self) -> Option<ParticipantId> {
        self.local().id
    }

    pub fn local_position(&self) -> Position {
        self.local().position
    }

    pub fn role(&self) -> Role {
        self.local().role
    }

    pub fn position_of(&self, id: &ParticipantId) -> Option<Position> {
        self.participants.get(id).map(|participant| participant.position)
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.participants.get(id).map(|participant| participant.clone())
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.participants
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn world(&self) -> WorldState {
        self.world
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn local(&self) -> LocalPresence {
        *self.local.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_local(&self, id: &ParticipantId) -> bool {
        self.local_id() == Some(*id)
    }

    fn upsert(&self, participant: &Participant) {
        if self.is_local(&participant.id) {
            return;
        }
        self.participants.insert(participant.id, participant.clone());
    }
}
