use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("webrtc: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("transport is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server closed the connection before welcoming us")]
    NoWelcome,

    #[error("session is disconnected")]
    Disconnected,

    #[error("world edits require the admin role")]
    Forbidden,

    #[error(transparent)]
    Mesh(#[from] MeshError),
}
