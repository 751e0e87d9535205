mod media;
mod mesh_command;
mod mesh_manager;
mod peer_connection;
mod peer_transport;
mod webrtc_transport;

pub use media::*;
pub use mesh_command::*;
pub use mesh_manager::*;
pub use peer_connection::*;
pub use peer_transport::*;
pub use webrtc_transport::*;
