pub mod fake_transport;
pub mod signal_wire;

pub use fake_transport::*;
pub use signal_wire::*;
