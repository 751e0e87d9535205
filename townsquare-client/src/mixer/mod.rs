mod audio_channels;
mod gain_policy;
mod proximity_mixer;

pub use audio_channels::*;
pub use gain_policy::*;
pub use proximity_mixer::*;
