use crate::signaling::Outbound;
use std::sync::Arc;
use townsquare_core::{ALL_OBJECTS, InteractiveObject, ObjectPatch, ServerMessage, WorldState};
use tracing::{debug, info};

/// The shared world document. In memory only; every mutation re-sends the
/// full snapshot to all connections, the mutator included.
pub struct WorldStore {
    state: WorldState,
    outbound: Arc<dyn Outbound>,
}

impl WorldStore {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self {
            state: WorldState::default(),
            outbound,
        }
    }

    pub fn snapshot(&self) -> WorldState {
        self.state.clone()
    }

    pub fn set_background(&mut self, background_ref: Option<String>) {
        info!(cleared = background_ref.is_none(), "background changed");
        self.state.background_ref = background_ref;
        self.publish();
    }

    /// Append an object. Id uniqueness is the caller's responsibility.
    pub fn add_object(&mut self, object: InteractiveObject) {
        debug!(id = %object.id, kind = ?object.kind, "object added");
        self.state.objects.push(object);
        self.publish();
    }

    /// Merge `patch` into the object with the same id. Unknown ids change nothing.
    pub fn update_object(&mut self, patch: ObjectPatch) -> bool {
        let found = match self.state.objects.iter_mut().find(|obj| obj.id == patch.id) {
            Some(object) => {
                object.apply(&patch);
                true
            }
            None => {
                debug!(id = %patch.id, "update for unknown object");
                false
            }
        };
        self.publish();
        found
    }

    /// Remove the object with `id`, or every object for the `ALL` sentinel.
    /// Returns how many objects were removed.
    pub fn delete_object(&mut self, id: &str) -> usize {
        let before = self.state.objects.len();
        if id == ALL_OBJECTS {
            self.state.objects.clear();
        } else {
            self.state.objects.retain(|obj| obj.id != id);
        }
        let removed = before - self.state.objects.len();
        debug!(%id, removed, "objects deleted");
        self.publish();
        removed
    }

    fn publish(&self) {
        self.outbound
            .broadcast(&ServerMessage::MapUpdate(self.state.clone()), None);
    }
}
