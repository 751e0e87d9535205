use crate::config::MixerConfig;
use crate::mixer::audio_channels::AudioChannels;
use crate::mixer::gain_policy::{ambient_gain, embedded_gain};
use crate::world_view::WorldView;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Periodically turns positions into playback gains. Runs on its own clock,
/// independent of movement updates and negotiation.
pub struct ProximityMixer {
    view: Arc<WorldView>,
    channels: Arc<AudioChannels>,
    config: MixerConfig,
}

impl ProximityMixer {
    pub fn new(view: Arc<WorldView>, channels: Arc<AudioChannels>, config: MixerConfig) -> Self {
        Self {
            view,
            channels,
            config,
        }
    }

    /// Recompute every gain from the current positions.
    pub fn sample(&self) {
        let here = self.view.local_position();
        let local_id = self.view.local_id();

        for remote_id in self.channels.attached_peers() {
            if Some(remote_id) == local_id {
                self.channels.set_peer_gain(&remote_id, 0.0);
                continue;
            }
            let gain = self
                .view
                .position_of(&remote_id)
                .map(|there| ambient_gain(here.distance_to(&there), self.config.ambient_radius))
                .unwrap_or(0.0);
            self.channels.set_peer_gain(&remote_id, gain);
        }

        let world = self.view.world();
        let audible: Vec<_> = world
            .objects
            .iter()
            .filter(|object| object.kind.is_audible())
            .collect();
        for object in &audible {
            let gain = embedded_gain(
                here.distance_to(&object.center()),
                self.config.media_inner_radius,
                self.config.media_outer_radius,
            );
            self.channels.set_object_gain(&object.id, gain);
        }
        self.channels
            .retain_objects(|id| audible.iter().any(|object| object.id == id));
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period = ?self.config.sample_period, "proximity mixer started");
            let mut ticker = time::interval(self.config.sample_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                self.sample();
                debug!("proximity gains sampled");
            }
        })
    }
}
