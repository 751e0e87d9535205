mod access;
mod registry;
mod space;
mod space_command;
mod world_store;

pub use access::*;
pub use registry::*;
pub use space::*;
pub use space_command::*;
pub use world_store::*;
