use crate::config::ServerConfig;
use crate::signaling::{Outbound, SignalRelay};
use crate::space::access::AccessPolicy;
use crate::space::registry::SessionRegistry;
use crate::space::space_command::SpaceCommand;
use crate::space::world_store::WorldStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use townsquare_core::{ClientMessage, IceServerConfig, JoinRequest, ParticipantId, ServerMessage};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct SpaceSettings {
    pub admin_name: Option<String>,
    pub ice_servers: Vec<IceServerConfig>,
}

impl From<&ServerConfig> for SpaceSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            admin_name: config.admin_name.clone(),
            ice_servers: config.ice_server_configs(),
        }
    }
}

/// The single sequencing point of a server instance. Every inbound frame
/// passes through `run`, so broadcasts leave in the order they were processed.
pub struct Space {
    registry: SessionRegistry,
    world: WorldStore,
    relay: SignalRelay,
    access: AccessPolicy,
    ice_servers: Vec<IceServerConfig>,
    outbound: Arc<dyn Outbound>,
    command_rx: mpsc::Receiver<SpaceCommand>,
}

impl Space {
    pub fn new(
        settings: SpaceSettings,
        outbound: Arc<dyn Outbound>,
        command_rx: mpsc::Receiver<SpaceCommand>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(outbound.clone()),
            world: WorldStore::new(outbound.clone()),
            relay: SignalRelay::new(outbound.clone()),
            access: AccessPolicy::new(settings.admin_name),
            ice_servers: settings.ice_servers,
            outbound,
            command_rx,
        }
    }

    pub async fn run(mut self) {
        info!("space event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        info!("command channel closed, space event loop finished");
    }

    fn handle_command(&mut self, cmd: SpaceCommand) {
        match cmd {
            SpaceCommand::Message {
                participant_id,
                message,
            } => self.handle_message(participant_id, message),

            SpaceCommand::Disconnect { participant_id } => {
                self.registry.leave(&participant_id);
            }
        }
    }

    fn handle_message(&mut self, from: ParticipantId, message: ClientMessage) {
        if message.is_world_mutation() && !self.may_edit_world(&from) {
            warn!(participant_id = %from, "world mutation rejected: not an admin");
            return;
        }

        match message {
            ClientMessage::Join(req) => self.join(from, req),
            ClientMessage::Move(req) => {
                self.registry.move_participant(from, req);
            }
            ClientMessage::Signal { target_id, signal } => {
                self.relay.relay(from, target_id, signal);
            }
            ClientMessage::AdminUploadBackground { image } => self.world.set_background(Some(image)),
            ClientMessage::AdminClearBackground => self.world.set_background(None),
            ClientMessage::AdminAddObject(object) => self.world.add_object(object),
            ClientMessage::AdminUpdateObject(patch) => {
                self.world.update_object(patch);
            }
            ClientMessage::AdminDeleteObject { id } => {
                self.world.delete_object(&id);
            }
        }
    }

    fn join(&mut self, participant_id: ParticipantId, req: JoinRequest) {
        let role = self.access.role_for(req.name.as_deref().unwrap_or_default());
        let others = self.registry.join(participant_id, req, role);

        let welcome = ServerMessage::Welcome {
            participant_id,
            role,
            ice_servers: self.ice_servers.clone(),
        };
        for msg in [
            welcome,
            ServerMessage::ExistingUsers(others),
            ServerMessage::MapUpdate(self.world.snapshot()),
        ] {
            if !self.outbound.send(&participant_id, &msg) {
                warn!(%participant_id, "joiner disconnected before receiving its snapshot");
                break;
            }
        }
    }

    /// Only joined connections holding the admin role may change the world.
    fn may_edit_world(&self, participant_id: &ParticipantId) -> bool {
        self.registry
            .role(participant_id)
            .is_some_and(|role| role.can_edit_world())
    }
}
