/// Capture screen lifecycle
///
/// [`CaptureSession`] owns everything the capture screen acquires: the camera
/// stream, the QR scanner and the object URL of the last photo. Each
/// acquisition runs under an attempt (id + cancellation token). Starting a new
/// attempt always tears the previous one down first, and results tagged with
/// anything but the current attempt are released and ignored.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::data::{CapturedPhoto, EncodedImage, FacingMode, Mode, SubmitPayload};
use crate::camera::acquire::AttemptId;
use crate::camera::media::{stop_all_tracks, CameraError, StreamHandle};
use crate::camera::object_url::ObjectUrls;
use crate::camera::still::{Canvas, EncodeError};
use crate::camera::video::VideoSurface;
use crate::qr::scanner::{ScanError, ScannerHandle};

/// Photo-mode pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    Idle,
    Requesting,
    Streaming,
    Error,
}

/// QR-mode pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrPhase {
    Idle,
    Scanning,
    Decoded,
    Error,
}

/// Work the shell must run after a state change
#[derive(Debug, Clone)]
pub enum Acquisition {
    /// Open a camera stream and report it with the attempt id
    Camera {
        attempt: AttemptId,
        token: CancellationToken,
        facing: FacingMode,
    },
    /// Start a QR scanner and report it with the attempt id
    Scanner {
        attempt: AttemptId,
        token: CancellationToken,
        facing: FacingMode,
    },
    /// Nothing to start
    None,
}

#[derive(Debug)]
struct Attempt {
    id: AttemptId,
    token: CancellationToken,
}

#[derive(Debug)]
pub struct CaptureSession {
    mode: Mode,
    facing: FacingMode,
    secure_context: bool,

    camera_phase: CameraPhase,
    qr_phase: QrPhase,
    error: Option<String>,

    attempt: Option<Attempt>,
    next_attempt: u64,

    stream: Option<StreamHandle>,
    video: VideoSurface,
    scanner: Option<ScannerHandle>,

    urls: ObjectUrls,
    photo: Option<CapturedPhoto>,
    decoded: Option<String>,
    submission: Option<SubmitPayload>,
}

impl CaptureSession {
    pub fn new(mode: Mode, facing: FacingMode, secure_context: bool) -> Self {
        Self {
            mode,
            facing,
            secure_context,
            camera_phase: CameraPhase::Idle,
            qr_phase: QrPhase::Idle,
            error: None,
            attempt: None,
            next_attempt: 0,
            stream: None,
            video: VideoSurface::new(),
            scanner: None,
            urls: ObjectUrls::new(),
            photo: None,
            decoded: None,
            submission: None,
        }
    }

    // ========== Accessors ==========

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn camera_phase(&self) -> CameraPhase {
        self.camera_phase
    }

    pub fn qr_phase(&self) -> QrPhase {
        self.qr_phase
    }

    /// User-visible error of the active pipeline
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn photo(&self) -> Option<&CapturedPhoto> {
        self.photo.as_ref()
    }

    pub fn decoded(&self) -> Option<&str> {
        self.decoded.as_deref()
    }

    pub fn submission(&self) -> Option<&SubmitPayload> {
        self.submission.as_ref()
    }

    pub fn stream(&self) -> Option<&StreamHandle> {
        self.stream.as_ref()
    }

    pub fn scanner(&self) -> Option<&ScannerHandle> {
        self.scanner.as_ref()
    }

    pub fn video(&self) -> &VideoSurface {
        &self.video
    }

    pub fn object_urls(&self) -> &ObjectUrls {
        &self.urls
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.attempt.as_ref().map(|a| a.id)
    }

    // ========== Lifecycle ==========

    /// Tear down whatever is running and start the pipeline for the current mode
    pub fn start(&mut self) -> Acquisition {
        self.teardown();
        self.error = None;

        let id = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        let token = CancellationToken::new();
        self.attempt = Some(Attempt {
            id,
            token: token.clone(),
        });

        match self.mode {
            Mode::Photo => {
                if !self.secure_context {
                    tracing::warn!("Refusing camera access from an insecure origin");
                    self.fail_camera(CameraError::InsecureContext);
                    return Acquisition::None;
                }
                self.camera_phase = CameraPhase::Requesting;
                Acquisition::Camera {
                    attempt: id,
                    token,
                    facing: self.facing,
                }
            }
            Mode::Qr => {
                self.decoded = None;
                self.qr_phase = QrPhase::Scanning;
                Acquisition::Scanner {
                    attempt: id,
                    token,
                    facing: self.facing,
                }
            }
        }
    }

    /// Switch mode, dropping every result of the previous one
    pub fn set_mode(&mut self, mode: Mode) -> Acquisition {
        if mode == self.mode {
            return Acquisition::None;
        }
        tracing::info!("Switching to {} mode", mode);
        self.mode = mode;
        self.clear_results();
        self.start()
    }

    /// Switch to the other camera, dropping every result
    pub fn flip_facing(&mut self) -> Acquisition {
        self.facing = self.facing.flipped();
        tracing::info!(facing = ?self.facing, "Flipping camera");
        self.clear_results();
        self.start()
    }

    /// Release the stream, the scanner and the current attempt
    pub fn teardown(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.token.cancel();
        }
        self.video.detach();
        if let Some(stream) = self.stream.take() {
            stop_all_tracks(stream.as_ref());
        }
        if let Some(scanner) = self.scanner.take() {
            scanner.stop();
        }
        self.camera_phase = CameraPhase::Idle;
        self.qr_phase = QrPhase::Idle;
    }

    // ========== Async results ==========

    /// A camera acquisition finished
    pub fn on_stream(&mut self, attempt: AttemptId, result: Result<StreamHandle, CameraError>) {
        if !self.is_current(attempt) || self.mode != Mode::Photo {
            if let Ok(stream) = result {
                stop_all_tracks(stream.as_ref());
            }
            tracing::debug!(%attempt, "Ignoring stale camera result");
            return;
        }

        match result {
            Ok(stream) => {
                self.video.attach(stream.clone());
                // Autoplay is best-effort
                if let Err(e) = self.video.play() {
                    tracing::debug!("Video playback did not start: {}", e);
                }
                self.stream = Some(stream);
                self.camera_phase = CameraPhase::Streaming;
                tracing::info!(%attempt, "Camera streaming");
            }
            Err(CameraError::Superseded) => {}
            Err(e) => self.fail_camera(e),
        }
    }

    /// A scanner start-up finished
    pub fn on_scanner(&mut self, attempt: AttemptId, result: Result<ScannerHandle, ScanError>) {
        if !self.is_current(attempt) || self.mode != Mode::Qr {
            if let Ok(scanner) = result {
                scanner.stop();
            }
            tracing::debug!(%attempt, "Ignoring stale scanner");
            return;
        }

        match result {
            // Decoded before start-up reported back
            Ok(scanner) if self.qr_phase != QrPhase::Scanning => scanner.stop(),
            Ok(scanner) => {
                tracing::info!(%attempt, region = scanner.region_id(), "QR scanner running");
                self.scanner = Some(scanner);
            }
            Err(ScanError::Superseded) => {}
            Err(e) => {
                tracing::warn!("QR scanner failed: {}", e);
                self.qr_phase = QrPhase::Error;
                self.error = Some(e.to_string());
            }
        }
    }

    /// The scanner decoded a code. Only the first decode counts.
    pub fn on_decoded(&mut self, attempt: AttemptId, text: String) {
        if !self.is_current(attempt) || self.mode != Mode::Qr || self.qr_phase != QrPhase::Scanning {
            return;
        }

        tracing::info!(%attempt, "Decoded QR code ({} chars)", text.len());
        self.decoded = Some(text);
        self.qr_phase = QrPhase::Decoded;
        if let Some(scanner) = self.scanner.take() {
            scanner.stop();
        }
    }

    // ========== Photo capture ==========

    /// Draw the current video frame into a canvas ready for encoding
    pub fn begin_capture(&self) -> Option<(AttemptId, Canvas)> {
        if self.mode != Mode::Photo {
            return None;
        }
        let attempt = self.current_attempt()?;

        let mut canvas = Canvas::sized_for(&self.video);
        if let Some(frame) = self.video.current_frame() {
            canvas.draw_frame(&frame);
        }
        Some((attempt, canvas))
    }

    /// An encoded still is ready; replace the previous photo
    pub fn on_photo_encoded(&mut self, attempt: AttemptId, result: Result<EncodedImage, EncodeError>) {
        if !self.is_current(attempt) || self.mode != Mode::Photo {
            tracing::debug!(%attempt, "Ignoring stale capture");
            return;
        }

        let image = match result {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Capture failed: {}", e);
                return;
            }
        };

        if let Some(previous) = self.photo.take() {
            self.urls.revoke(&previous.url);
        }
        let url = self.urls.create(image.bytes.clone());
        self.photo = Some(CapturedPhoto {
            url,
            byte_len: image.byte_len(),
            mime_type: image.mime_type,
            width: image.width,
            height: image.height,
        });
        self.submission = None;
    }

    // ========== Submission ==========

    /// True once the active mode has produced a result
    pub fn can_submit(&self) -> bool {
        match self.mode {
            Mode::Photo => self.photo.is_some(),
            Mode::Qr => self.decoded.is_some(),
        }
    }

    /// Assemble the payload for the active mode
    pub fn submit(&mut self, username: Option<String>, now: DateTime<Utc>) -> Option<&SubmitPayload> {
        let payload = match self.mode {
            Mode::Photo => SubmitPayload::photo(username, now, self.photo.as_ref()?),
            Mode::Qr => SubmitPayload::qr(username, now, self.decoded.as_deref()?),
        };
        self.submission = Some(payload);
        self.submission.as_ref()
    }

    // ========== Helpers ==========

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.attempt
            .as_ref()
            .is_some_and(|a| a.id == attempt && !a.token.is_cancelled())
    }

    fn fail_camera(&mut self, error: CameraError) {
        tracing::warn!("Camera unavailable: {}", error);
        self.camera_phase = CameraPhase::Error;
        self.error = Some(error.to_string());
    }

    fn clear_results(&mut self) {
        if let Some(photo) = self.photo.take() {
            self.urls.revoke(&photo.url);
        }
        self.decoded = None;
        self.submission = None;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
        self.clear_results();
    }
}
