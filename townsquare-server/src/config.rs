use clap::Parser;
use std::net::SocketAddr;
use townsquare_core::IceServerConfig;
use townsquare_core::utils::DEFAULT_MAX_MESSAGE_BYTES;

#[derive(Debug, Clone, Parser)]
#[command(name = "townsquare-server", version, about = "Shared 2D space presence and signaling server")]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    #[arg(long, env = "TOWNSQUARE_BIND", default_value = "0.0.0.0:3001")]
    pub bind: SocketAddr,

    /// Largest inbound WebSocket message or frame accepted, in bytes.
    #[arg(long, env = "TOWNSQUARE_MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Display name that is granted the admin role on join.
    /// When unset every participant may edit the world.
    #[arg(long, env = "TOWNSQUARE_ADMIN_NAME")]
    pub admin_name: Option<String>,

    /// STUN/TURN urls announced to clients.
    #[arg(long = "ice-server", env = "TOWNSQUARE_ICE_SERVERS", value_delimiter = ',')]
    pub ice_servers: Vec<String>,

    #[arg(long, env = "TOWNSQUARE_ICE_USERNAME")]
    pub ice_username: Option<String>,

    #[arg(long, env = "TOWNSQUARE_ICE_CREDENTIAL")]
    pub ice_credential: Option<String>,

    /// Capacity of the space command queue.
    #[arg(long, env = "TOWNSQUARE_COMMAND_BUFFER", default_value_t = 1024)]
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3001)),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            admin_name: None,
            ice_servers: Vec::new(),
            ice_username: None,
            ice_credential: None,
            command_buffer: 1024,
        }
    }
}

impl ServerConfig {
    /// ICE servers in the shape clients consume. Credentials only apply to TURN urls.
    pub fn ice_server_configs(&self) -> Vec<IceServerConfig> {
        self.ice_servers
            .iter()
            .map(|url| {
                let is_turn = url.starts_with("turn:") || url.starts_with("turns:");
                IceServerConfig {
                    urls: vec![url.clone()],
                    username: self.ice_username.clone().filter(|_| is_turn),
                    credential: self.ice_credential.clone().filter(|_| is_turn),
                }
            })
            .collect()
    }
}
