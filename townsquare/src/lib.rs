pub use townsquare_core::model::ParticipantId;

pub mod model {
    pub use townsquare_core::model::*;
}

pub mod protocol {
    pub use townsquare_core::protocol::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use townsquare_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use townsquare_client::*;
}
