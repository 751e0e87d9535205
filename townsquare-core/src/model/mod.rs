mod participant;
mod signaling;
mod world;

pub use participant::{Direction, Participant, ParticipantId, Position, Role};
pub use signaling::{IceCandidate, IceServerConfig, SignalPayload, TrackKind};
pub use world::{ALL_OBJECTS, InteractiveObject, ObjectKind, ObjectPatch, Size, WorldState};
