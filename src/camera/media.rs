/// Media-stream acquisition
///
/// Devices come in two flavours: the standard future-returning API and a
/// legacy callback API. [`AcquisitionStrategy::select`] picks one up front
/// so callers only ever see a uniform `Result<StreamHandle, CameraError>`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use image::RgbaImage;
use parking_lot::Mutex;

use crate::state::data::FacingMode;

/// Shown when the platform gives no reason for a failure
const GENERIC_FAILURE: &str = "Failed to access camera";

/// Errors surfaced by camera acquisition
///
/// The `Display` text is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera requires HTTPS or localhost.")]
    InsecureContext,

    #[error("Camera API not available on this platform.")]
    Unavailable,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Device(String),

    /// A newer attempt started before this one finished. Never shown.
    #[error("Camera acquisition was superseded")]
    Superseded,
}

impl CameraError {
    /// Device error carrying the platform's message, or a generic one if empty
    pub fn device(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            CameraError::Device(GENERIC_FAILURE.to_string())
        } else {
            CameraError::Device(message)
        }
    }
}

/// One track of a media stream
pub trait MediaTrack: Send + Sync + fmt::Debug {
    /// Release the underlying device. Idempotent.
    fn stop(&self);
    fn is_live(&self) -> bool;
}

/// A plain video track backed by a liveness flag
#[derive(Debug)]
pub struct VideoTrack {
    label: String,
    live: AtomicBool,
}

impl VideoTrack {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            live: AtomicBool::new(true),
        }
    }
}

impl MediaTrack for VideoTrack {
    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            tracing::debug!(track = %self.label, "Stopped track");
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Native resolution reported by a stream's video track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackSettings {
    pub width: u32,
    pub height: u32,
}

/// A live camera stream
pub trait MediaStream: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>>;
    fn settings(&self) -> TrackSettings;
    /// The frame currently on the video track; `None` once stopped
    fn latest_frame(&self) -> Option<Arc<RgbaImage>>;
}

pub type StreamHandle = Arc<dyn MediaStream>;

/// Stop every track of `stream`
pub fn stop_all_tracks(stream: &dyn MediaStream) {
    for track in stream.tracks() {
        track.stop();
    }
    tracing::debug!(stream = stream.id(), "Released camera stream");
}

/// True while any track is still live
pub fn is_active(stream: &dyn MediaStream) -> bool {
    stream.tracks().iter().any(|track| track.is_live())
}

/// Video constraints for a request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoConstraints {
    pub facing_mode: FacingMode,
    /// Width / height; `None` keeps the device's own ratio
    pub aspect_ratio: Option<f32>,
}

/// What to ask the device for. Audio is never requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn video_only(facing_mode: FacingMode) -> Self {
        Self {
            video: VideoConstraints {
                facing_mode,
                aspect_ratio: None,
            },
            audio: false,
        }
    }

    pub fn with_aspect_ratio(mut self, ratio: f32) -> Self {
        self.video.aspect_ratio = Some(ratio);
        self
    }
}

/// Standard acquisition API
pub trait MediaDevices: Send + Sync {
    fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> BoxFuture<'static, Result<StreamHandle, CameraError>>;
}

pub type LegacySuccess = Box<dyn FnOnce(StreamHandle) + Send>;
pub type LegacyFailure = Box<dyn FnOnce(CameraError) + Send>;

/// Legacy callback-style acquisition API
pub trait LegacyUserMedia: Send + Sync {
    fn get_user_media(
        &self,
        constraints: MediaConstraints,
        on_success: LegacySuccess,
        on_error: LegacyFailure,
    );
}

/// The acquisition capabilities the platform exposes
#[derive(Clone, Default)]
pub struct Navigator {
    pub media_devices: Option<Arc<dyn MediaDevices>>,
    pub legacy_user_media: Option<Arc<dyn LegacyUserMedia>>,
}

impl Navigator {
    pub fn standard(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            media_devices: Some(devices),
            legacy_user_media: None,
        }
    }

    pub fn legacy(api: Arc<dyn LegacyUserMedia>) -> Self {
        Self {
            media_devices: None,
            legacy_user_media: Some(api),
        }
    }

    /// Select a strategy and acquire in one step
    pub async fn acquire(&self, constraints: MediaConstraints) -> Result<StreamHandle, CameraError> {
        AcquisitionStrategy::select(self)?.acquire(constraints).await
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("media_devices", &self.media_devices.is_some())
            .field("legacy_user_media", &self.legacy_user_media.is_some())
            .finish()
    }
}

/// Capability-checked choice of acquisition API
#[derive(Clone)]
pub enum AcquisitionStrategy {
    Standard(Arc<dyn MediaDevices>),
    Legacy(Arc<dyn LegacyUserMedia>),
}

impl AcquisitionStrategy {
    /// Prefer the standard API, fall back to the legacy one
    pub fn select(navigator: &Navigator) -> Result<Self, CameraError> {
        if let Some(devices) = &navigator.media_devices {
            return Ok(AcquisitionStrategy::Standard(devices.clone()));
        }
        if let Some(api) = &navigator.legacy_user_media {
            return Ok(AcquisitionStrategy::Legacy(api.clone()));
        }
        Err(CameraError::Unavailable)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionStrategy::Standard(_) => "standard",
            AcquisitionStrategy::Legacy(_) => "legacy",
        }
    }

    pub async fn acquire(&self, constraints: MediaConstraints) -> Result<StreamHandle, CameraError> {
        match self {
            AcquisitionStrategy::Standard(devices) => devices.get_user_media(constraints).await,
            AcquisitionStrategy::Legacy(api) => {
                let (tx, rx) = oneshot::channel();
                // Either callback may fire, but only the first one counts
                let tx = Arc::new(Mutex::new(Some(tx)));
                let on_error_tx = tx.clone();

                api.get_user_media(
                    constraints,
                    Box::new(move |stream| {
                        if let Some(tx) = tx.lock().take() {
                            let _ = tx.send(Ok(stream));
                        }
                    }),
                    Box::new(move |error| {
                        if let Some(tx) = on_error_tx.lock().take() {
                            let _ = tx.send(Err(error));
                        }
                    }),
                );

                rx.await
                    .unwrap_or_else(|_| Err(CameraError::device("Camera request was dropped")))
            }
        }
    }
}
