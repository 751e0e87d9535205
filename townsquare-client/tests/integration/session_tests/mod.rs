
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use townsquare_client::{ClientConfig, MeshEvent, SpaceSession, TransportFactory};
use townsquare_core::Position;
use townsquare_server::ServerConfig;

use crate::utils::FakeFactory;

/// Timeout for conditions that depend on the server round trip (ms).
pub const WAIT_TIMEOUT_MS: u64 = 3000;

pub async fn spawn_server(config: ServerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local addr");

    tokio::spawn(async move {
        if let Err(e) = townsquare_server::serve(listener, config).await {
            tracing::error!("[TestServer] stopped: {e:#}");
        }
    });

    addr
}

/// Join `addr` with fake transports.
pub async fn join(addr: SocketAddr, name: &str, x: f64, y: f64) -> (SpaceSession, Arc<FakeFactory>) {
    let factory = Arc::new(FakeFactory::default());
    let config = ClientConfig {
        server_url: format!("ws://{addr}/ws"),
        display_name: name.into(),
        spawn: Position::new(x, y),
        ..Default::default()
    };

    let handle = factory.clone();
    let session = SpaceSession::connect_with(config, move |_| Ok(handle as Arc<dyn TransportFactory>))
        .await
        .expect("session failed to join");
    (session, factory)
}

/// Poll `check` until it holds or the wait times out.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(WAIT_TIMEOUT_MS);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Next mesh event matching `pred`.
pub async fn next_event(
    events: &mut mpsc::UnboundedReceiver<MeshEvent>,
    pred: impl Fn(&MeshEvent) -> bool,
) -> MeshEvent {
    let wait = async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return event;
            }
        }
        panic!("mesh event channel closed");
    };
    tokio::time::timeout(Duration::from_millis(WAIT_TIMEOUT_MS), wait)
        .await
        .expect("timed out waiting for mesh event")
}
