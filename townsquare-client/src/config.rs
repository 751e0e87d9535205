use crate::mesh::LocalMedia;
use std::time::Duration;
use townsquare_core::{JoinRequest, Position};

#[derive(Debug, Clone)]
pub struct MixerConfig {
    pub sample_period: Duration,
    /// Voices inside this distance play at full volume, outside it not at all.
    pub ambient_radius: f64,
    /// Embedded media is at full volume up to `media_inner_radius` and fades
    /// out linearly until `media_outer_radius`.
    pub media_inner_radius: f64,
    pub media_outer_radius: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_millis(200),
            ambient_radius: 2.2,
            media_inner_radius: 4.0,
            media_outer_radius: 12.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:3001/ws`.
    pub server_url: String,
    pub display_name: String,
    pub spawn: Position,
    pub avatar_config: serde_json::Value,
    pub camera_enabled: bool,
    pub media: LocalMedia,
    pub mixer: MixerConfig,
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3001/ws".to_owned(),
            display_name: String::new(),
            spawn: Position::default(),
            avatar_config: serde_json::json!({}),
            camera_enabled: false,
            media: LocalMedia::default(),
            mixer: MixerConfig::default(),
            command_buffer: 256,
        }
    }
}

impl ClientConfig {
    pub fn join_request(&self) -> JoinRequest {
        JoinRequest {
            name: Some(self.display_name.clone()),
            x: Some(self.spawn.x),
            y: Some(self.spawn.y),
            avatar_config: Some(self.avatar_config.clone()),
            camera_enabled: Some(self.camera_enabled),
        }
    }
}
