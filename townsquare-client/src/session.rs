use crate::config::ClientConfig;
use crate::error::{ClientError, MeshError};
use crate::mesh::{LocalMedia, MeshCommand, MeshEvent, PeerMeshManager, TransportFactory, WebRtcTransportFactory};
use crate::mixer::{AudioChannels, ProximityMixer};
use crate::signaling::WsSignaling;
use crate::world_view::WorldView;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use townsquare_core::{
    ClientMessage, Direction, IceServerConfig, InteractiveObject, MoveRequest, ObjectPatch, ParticipantId, Position,
    Role, ServerMessage,
};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct SessionTasks {
    reader: JoinHandle<()>,
    mixer: JoinHandle<()>,
    mesh: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SessionTasks {
    fn abort_all(&self) {
        self.reader.abort();
        self.mixer.abort();
        self.mesh.abort();
        self.writer.abort();
    }
}

/// A joined participant: the server connection plus the local mesh, mixer
/// and world replica that hang off it.
pub struct SpaceSession {
    local_id: ParticipantId,
    role: Role,
    view: Arc<WorldView>,
    audio: Arc<AudioChannels>,
    outbound: Option<mpsc::UnboundedSender<ClientMessage>>,
    mesh_tx: Option<mpsc::Sender<MeshCommand>>,
    events: Option<mpsc::UnboundedReceiver<MeshEvent>>,
    tasks: Option<SessionTasks>,
}

impl SpaceSession {
    /// Join with real WebRTC transports.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        Self::connect_with(config, |ice_servers| {
            let factory: Arc<dyn TransportFactory> = Arc::new(WebRtcTransportFactory::new(ice_servers)?);
            Ok(factory)
        })
        .await
    }

    /// Join, building the transport factory from the ICE servers the server
    /// announces in its welcome.
    pub async fn connect_with<F>(config: ClientConfig, make_factory: F) -> Result<Self, ClientError>
    where
        F: FnOnce(&[IceServerConfig]) -> Result<Arc<dyn TransportFactory>, MeshError>,
    {
        info!(url = %config.server_url, name = %config.display_name, "connecting to space");
        let (ws, _) = connect_async(config.server_url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        sink.send(encode(&ClientMessage::Join(config.join_request()))?)
            .await?;

        let view = Arc::new(WorldView::new());
        view.set_local_position(config.spawn);

        let (local_id, role, ice_servers) = loop {
            let frame = stream.next().await.ok_or(ClientError::NoWelcome)??;
            let Message::Text(text) = frame else {
                continue;
            };
            let msg: ServerMessage = serde_json::from_str(text.as_str())?;
            view.apply(&msg);
            if let ServerMessage::Welcome {
                participant_id,
                role,
                ice_servers,
            } = msg
            {
                break (participant_id, role, ice_servers);
            }
        };
        info!(%local_id, ?role, ice_servers = ice_servers.len(), "joined space");

        let factory = make_factory(&ice_servers)?;
        let audio = Arc::new(AudioChannels::new());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (mesh_tx, mesh_rx) = mpsc::channel(config.command_buffer);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut mesh = PeerMeshManager::new(
            local_id,
            factory,
            Arc::new(WsSignaling::new(outbound_tx.clone())),
            audio.clone(),
        )
        .with_events(event_tx);
        mesh.set_local_media(config.media.clone()).await;

        let tasks = SessionTasks {
            reader: tokio::spawn(read_loop(stream, view.clone(), mesh_tx.clone())),
            mixer: ProximityMixer::new(view.clone(), audio.clone(), config.mixer.clone()).spawn(),
            mesh: tokio::spawn(mesh.run(mesh_rx)),
            writer: tokio::spawn(write_loop(sink, outbound_rx)),
        };

        Ok(Self {
            local_id,
            role,
            view,
            audio,
            outbound: Some(outbound_tx),
            mesh_tx: Some(mesh_tx),
            events: Some(event_rx),
            tasks: Some(tasks),
        })
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn view(&self) -> &Arc<WorldView> {
        &self.view
    }

    pub fn audio(&self) -> &Arc<AudioChannels> {
        &self.audio
    }

    /// Mesh events for a UI. Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<MeshEvent>> {
        self.events.take()
    }

    pub fn send_move(&self, position: Position, direction: Direction, camera_enabled: bool) -> Result<(), ClientError> {
        self.view.set_local_position(position);
        self.send(ClientMessage::Move(MoveRequest {
            x: position.x,
            y: position.y,
            direction,
            camera_enabled,
        }))
    }

    pub async fn set_local_media(&self, media: LocalMedia) -> Result<(), ClientError> {
        let mesh_tx = self.mesh_tx.as_ref().ok_or(ClientError::Disconnected)?;
        mesh_tx
            .send(MeshCommand::SetLocalMedia(media))
            .await
            .map_err(|_| ClientError::Disconnected)
    }

    /// `image` is a data URI.
    pub fn upload_background(&self, image: String) -> Result<(), ClientError> {
        self.send_admin(ClientMessage::AdminUploadBackground { image })
    }

    pub fn clear_background(&self) -> Result<(), ClientError> {
        self.send_admin(ClientMessage::AdminClearBackground)
    }

    pub fn add_object(&self, object: InteractiveObject) -> Result<(), ClientError> {
        self.send_admin(ClientMessage::AdminAddObject(object))
    }

    pub fn update_object(&self, patch: ObjectPatch) -> Result<(), ClientError> {
        self.send_admin(ClientMessage::AdminUpdateObject(patch))
    }

    /// Pass [`townsquare_core::ALL_OBJECTS`] to remove everything.
    pub fn delete_object(&self, id: impl Into<String>) -> Result<(), ClientError> {
        self.send_admin(ClientMessage::AdminDeleteObject { id: id.into() })
    }

    /// Leave the space: tear down every peer connection, then close the socket.
    pub async fn close(mut self) {
        info!(local_id = %self.local_id, "leaving space");
        let Some(tasks) = self.tasks.take() else {
            return;
        };

        tasks.reader.abort();
        tasks.mixer.abort();
        let _ = tasks.reader.await;

        // With every command sender gone the mesh closes its peers and exits,
        // which in turn releases the last writer handle.
        self.mesh_tx = None;
        let _ = tasks.mesh.await;
        self.outbound = None;
        let _ = tasks.writer.await;
    }

    fn send_admin(&self, msg: ClientMessage) -> Result<(), ClientError> {
        if !self.role.can_edit_world() {
            return Err(ClientError::Forbidden);
        }
        self.send(msg)
    }

    fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        let outbound = self.outbound.as_ref().ok_or(ClientError::Disconnected)?;
        outbound.send(msg).map_err(|_| ClientError::Disconnected)
    }
}

impl Drop for SpaceSession {
    fn drop(&mut self) {
        if let Some(tasks) = &self.tasks {
            tasks.abort_all();
        }
    }
}

fn encode(msg: &ClientMessage) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(serde_json::to_string(msg)?.into()))
}

async fn read_loop(mut stream: SplitStream<WsStream>, view: Arc<WorldView>, mesh_tx: mpsc::Sender<MeshCommand>) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "websocket read failed");
                break;
            }
        };

        let msg = match serde_json::from_str::<ServerMessage>(text.as_str()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "unparseable server message, skipping");
                continue;
            }
        };

        view.apply(&msg);
        if let Some(cmd) = MeshCommand::from_server(&msg) {
            if mesh_tx.send(cmd).await.is_err() {
                debug!("peer mesh stopped, reader exiting");
                break;
            }
        }
    }

    info!("server connection closed");
}

async fn write_loop(mut sink: SplitSink<WsStream, Message>, mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>) {
    while let Some(msg) = outbound_rx.recv().await {
        let frame = match encode(&msg) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "failed to encode client message");
                continue;
            }
        };
        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, "websocket write failed");
            return;
        }
    }

    let _ = sink.close().await;
}
