use townsquare_core::{ParticipantId, ServerMessage};

/// Implemented by whatever owns the client sockets, so the space services
/// can reach connections without knowing how frames are carried.
pub trait Outbound: Send + Sync {
    /// Deliver a message to one connection. Returns `false` if it is not connected.
    fn send(&self, to: &ParticipantId, msg: &ServerMessage) -> bool;

    /// Deliver a message to every open connection, optionally skipping one.
    fn broadcast(&self, msg: &ServerMessage, except: Option<&ParticipantId>);
}
