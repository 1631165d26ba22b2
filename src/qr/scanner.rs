/// QR scanner interface and scan-session start-up
///
/// The decoder itself sits behind [`QrScanner`] so the concrete library
/// can be swapped or mocked. [`init_scanner`] runs one scan session start-up
/// for the capture screen.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;
use futures::future::BoxFuture;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;

use crate::camera::media::CameraError;
use crate::state::data::FacingMode;

/// Id of the screen region the scanner renders into
pub const QR_REGION_ID: &str = "qr-reader";

/// Time given to the scan region to lay out before the scanner binds to it
pub const REGION_RENDER_DELAY: Duration = Duration::from_millis(100);

/// Rendered width of the scan region
pub const REGION_WIDTH: f32 = 480.0;

/// Minimum rendered height of the scan region; the detection box is sized relative to it
pub const REGION_MIN_HEIGHT: f32 = 300.0;

/// Scale at which a `width`×`height` frame covers the scan region.
///
/// The region shows the frame centred and cropped to fill, so one region
/// pixel spans `1 / scale` frame pixels.
pub fn cover_scale(width: u32, height: u32) -> f32 {
    let width = width.max(1) as f32;
    let height = height.max(1) as f32;
    (REGION_WIDTH / width).max(REGION_MIN_HEIGHT / height)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to initialize QR scanner.")]
    LibraryUnavailable,

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("{0}")]
    Start(String),

    /// A newer attempt started before this one finished. Never shown.
    #[error("QR scanner start-up was superseded")]
    Superseded,
}

/// Detection window, in viewfinder pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBox {
    pub width: u32,
    pub height: u32,
}

/// Fixed detection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConfig {
    /// Target frames per second
    pub fps: u32,
    pub qrbox: ScanBox,
    /// Requested video aspect ratio (width / height)
    pub aspect_ratio: f32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            qrbox: ScanBox {
                width: 250,
                height: 250,
            },
            aspect_ratio: 1.0,
        }
    }
}

impl ScanConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }
}

/// Called with the decoded text
pub type OnDecode = Box<dyn FnMut(String) + Send>;
/// Called when a frame holds no readable code
pub type OnFrameError = Box<dyn FnMut(String) + Send>;

/// A QR decoding library bound to one screen region
pub trait QrScanner: Send + Sync + fmt::Debug {
    fn region_id(&self) -> &str;

    /// Open the camera and scan continuously until [`QrScanner::stop`]
    fn start(
        &self,
        facing: FacingMode,
        config: ScanConfig,
        on_decode: OnDecode,
        on_error: OnFrameError,
    ) -> BoxFuture<'static, Result<(), ScanError>>;

    /// Stop scanning and release the camera. Idempotent.
    fn stop(&self);

    fn is_scanning(&self) -> bool;

    /// Frame to show in the scan region, if the scanner renders one
    fn preview_frame(&self) -> Option<Arc<RgbaImage>> {
        None
    }
}

pub type ScannerHandle = Arc<dyn QrScanner>;

/// Builds a scanner bound to a region id
pub type ScannerFactory = Arc<dyn Fn(&str) -> Result<ScannerHandle, ScanError> + Send + Sync>;

/// Start a scanner for one attempt
///
/// Decoded texts are forwarded on `decoded`; per-frame errors are dropped.
/// A scanner that finishes starting after `token` was cancelled is stopped
/// again and [`ScanError::Superseded`] is returned.
pub async fn init_scanner(
    factory: ScannerFactory,
    facing: FacingMode,
    config: ScanConfig,
    token: CancellationToken,
    decoded: UnboundedSender<String>,
) -> Result<ScannerHandle, ScanError> {
    tokio::time::sleep(REGION_RENDER_DELAY).await;
    if token.is_cancelled() {
        return Err(ScanError::Superseded);
    }

    let scanner = factory(QR_REGION_ID)?;
    tracing::debug!(region = scanner.region_id(), ?facing, "Starting QR scanner");

    let on_decode: OnDecode = Box::new(move |text| {
        // The receiver is gone once the attempt is over
        let _ = decoded.unbounded_send(text);
    });
    let on_error: OnFrameError = Box::new(|message| {
        tracing::trace!("No QR code in frame: {}", message);
    });

    let started = scanner.start(facing, config, on_decode, on_error).await;

    if token.is_cancelled() {
        scanner.stop();
        return Err(ScanError::Superseded);
    }

    started.map(|()| scanner)
}
