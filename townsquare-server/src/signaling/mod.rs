mod connection_hub;
mod outbound;
mod relay;
mod space_service;
mod ws_handler;

pub use connection_hub::*;
pub use outbound::*;
pub use relay::*;
pub use space_service::*;
pub use ws_handler::*;
