use crate::model::participant::Position;
use serde::{Deserialize, Serialize};

/// Object id that addresses every object at once in a delete.
pub const ALL_OBJECTS: &str = "ALL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    Image,
    Video,
    EmbeddedPage,
}

impl ObjectKind {
    /// Whether the object plays sound that proximity should attenuate.
    pub fn is_audible(self) -> bool {
        matches!(self, ObjectKind::Video | ObjectKind::EmbeddedPage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveObject {
    pub id: String,
    pub kind: ObjectKind,
    pub position: Position,
    pub size: Size,
    pub source_uri: String,
}

impl InteractiveObject {
    pub fn center(&self) -> Position {
        Position::new(
            self.position.x + self.size.w / 2.0,
            self.position.y + self.size.h / 2.0,
        )
    }

    /// Overwrite the fields present in `patch`. The id never changes.
    pub fn apply(&mut self, patch: &ObjectPatch) {
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(source_uri) = &patch.source_uri {
            self.source_uri = source_uri.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ObjectKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    pub background_ref: Option<String>,
    pub objects: Vec<InteractiveObject>,
}
