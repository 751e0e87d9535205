mod config;
pub mod signaling;
pub mod space;

pub use config::ServerConfig;
pub use signaling::*;
pub use space::*;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(service: SpaceService) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service)
}

/// Start a space and serve it on `listener` until the server stops.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> anyhow::Result<()> {
    let service = SpaceService::start(&config);
    let addr = listener.local_addr().context("listener has no local address")?;

    info!(%addr, "townsquare listening");
    axum::serve(listener, router(service))
        .await
        .context("server failed")
}
