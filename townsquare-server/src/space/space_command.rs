use townsquare_core::{ClientMessage, ParticipantId};

/// Work items for the space event loop, produced by the connection tasks.
#[derive(Debug)]
pub enum SpaceCommand {
    /// A parsed frame from a connection.
    Message {
        participant_id: ParticipantId,
        message: ClientMessage,
    },

    /// The connection closed, cleanly or not.
    Disconnect { participant_id: ParticipantId },
}
