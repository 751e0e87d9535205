use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

pub use townsquare_core::TrackKind;

/// A captured local track ready to be attached to any number of peers.
#[derive(Clone)]
pub struct LocalTrack {
    kind: TrackKind,
    track: Arc<dyn TrackLocal + Send + Sync>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, track: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        Self { kind, track }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn handle(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.track.clone()
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("kind", &self.kind)
            .field("id", &self.id())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission to capture {0:?} was denied")]
    PermissionDenied(TrackKind),

    #[error("no {0:?} capture device available")]
    NoDevice(TrackKind),
}

/// The local microphone and camera, either of which may be absent.
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    audio: Option<LocalTrack>,
    video: Option<LocalTrack>,
}

impl LocalMedia {
    pub fn new(audio: Option<LocalTrack>, video: Option<LocalTrack>) -> Self {
        Self { audio, video }
    }

    /// Accept the outcome of a capture attempt. A failed capture leaves the
    /// participant without local tracks; it is not retried.
    pub fn from_capture(result: Result<LocalMedia, MediaError>) -> Self {
        match result {
            Ok(media) => media,
            Err(e) => {
                warn!(error = %e, "local media unavailable, continuing without tracks");
                Self::default()
            }
        }
    }

    pub fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        match kind {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }
}

/// An inbound track announced by a transport. The handle is absent for
/// transports that carry no real media.
#[derive(Clone)]
pub struct RemoteTrack {
    pub kind: TrackKind,
    pub handle: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("kind", &self.kind)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}
