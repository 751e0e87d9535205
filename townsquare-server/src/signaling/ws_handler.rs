use crate::signaling::SpaceService;
use crate::space::SpaceCommand;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use townsquare_core::{ClientMessage, ParticipantId};
use tracing::{error, info, warn};

pub async fn ws_handler(ws: WebSocketUpgrade, State(service): State<SpaceService>) -> impl IntoResponse {
    let participant_id = ParticipantId::new();
    let limit = service.max_message_bytes();

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, participant_id, service))
}

async fn handle_socket(socket: WebSocket, participant_id: ParticipantId, service: SpaceService) {
    info!(%participant_id, "new websocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.hub().add_connection(participant_id, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => {
                            let cmd = SpaceCommand::Message {
                                participant_id,
                                message,
                            };
                            if let Err(e) = service.space_tx.send(cmd).await {
                                error!(%participant_id, error = %e, "space loop is gone");
                                break;
                            }
                        }
                        Err(e) => warn!(%participant_id, error = %e, "invalid client message"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Unregister before the leave is processed so user_left only reaches the others.
    service.hub().remove_connection(&participant_id);
    let _ = service
        .space_tx
        .send(SpaceCommand::Disconnect { participant_id })
        .await;

    info!(%participant_id, "websocket disconnected");
}
