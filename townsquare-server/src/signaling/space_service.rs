use crate::config::ServerConfig;
use crate::signaling::ConnectionHub;
use crate::space::{Space, SpaceCommand, SpaceSettings};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Handle shared by every WebSocket connection: the socket registry plus
/// the command queue into the space event loop.
#[derive(Clone)]
pub struct SpaceService {
    hub: ConnectionHub,
    pub(crate) space_tx: mpsc::Sender<SpaceCommand>,
    max_message_bytes: usize,
}

impl SpaceService {
    pub fn new(hub: ConnectionHub, space_tx: mpsc::Sender<SpaceCommand>, max_message_bytes: usize) -> Self {
        Self {
            hub,
            space_tx,
            max_message_bytes,
        }
    }

    /// Spawn the space event loop and return a service wired to it.
    pub fn start(config: &ServerConfig) -> Self {
        let hub = ConnectionHub::new();
        let (space_tx, space_rx) = mpsc::channel(config.command_buffer);

        let space = Space::new(SpaceSettings::from(config), Arc::new(hub.clone()), space_rx);
        tokio::spawn(space.run());
        info!(max_message_bytes = config.max_message_bytes, "space started");

        Self::new(hub, space_tx, config.max_message_bytes)
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    pub fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }
}
