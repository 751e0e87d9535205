mod config;
mod error;
pub mod mesh;
pub mod mixer;
mod session;
mod signaling;
mod world_view;

pub use config::{ClientConfig, MixerConfig};
pub use error::{ClientError, MeshError};
pub use mesh::*;
pub use mixer::*;
pub use session::SpaceSession;
pub use signaling::SignalingSink;
pub use world_view::WorldView;
