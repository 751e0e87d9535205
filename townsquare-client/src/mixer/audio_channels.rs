use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use townsquare_core::ParticipantId;

/// Playback gain for every inbound audio source: remote voices keyed by
/// participant, embedded media keyed by object id.
///
/// The mesh attaches and releases voice channels, the mixer writes gains and
/// the audio backend reads them.
#[derive(Debug, Default)]
pub struct AudioChannels {
    peers: DashMap<ParticipantId, f32>,
    objects: DashMap<String, f32>,
}

impl AudioChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a silent channel for `id`. Returns `false` if one already exists.
    pub fn attach(&self, id: ParticipantId) -> bool {
        match self.peers.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(0.0);
                true
            }
        }
    }

    pub fn release(&self, id: &ParticipantId) -> bool {
        self.peers.remove(id).is_some()
    }

    /// Only attached channels are updated.
    pub fn set_peer_gain(&self, id: &ParticipantId, gain: f32) -> bool {
        match self.peers.get_mut(id) {
            Some(mut current) => {
                *current = gain;
                true
            }
            None => false,
        }
    }

    pub fn peer_gain(&self, id: &ParticipantId) -> Option<f32> {
        self.peers.get(id).map(|gain| *gain)
    }

    pub fn attached_peers(&self) -> Vec<ParticipantId> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn set_object_gain(&self, id: &str, gain: f32) {
        self.objects.insert(id.to_owned(), gain);
    }

    pub fn object_gain(&self, id: &str) -> Option<f32> {
        self.objects.get(id).map(|gain| *gain)
    }

    /// Forget objects that no longer exist in the world.
    pub fn retain_objects(&self, keep: impl Fn(&str) -> bool) {
        self.objects.retain(|id, _| keep(id.as_str()));
    }
}
