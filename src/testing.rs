/// Fake devices and scanners for unit tests

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::camera::media::{
    is_active, CameraError, LegacyFailure, LegacySuccess, LegacyUserMedia, MediaConstraints,
    MediaDevices, MediaStream, MediaTrack, StreamHandle, TrackSettings, VideoTrack,
};
use crate::qr::scanner::{OnDecode, OnFrameError, QrScanner, ScanConfig, ScanError, ScannerFactory, ScannerHandle};
use crate::state::data::FacingMode;

/// Stream with a single solid grey frame
#[derive(Debug)]
pub struct FakeStream {
    id: String,
    track: Arc<VideoTrack>,
    frame: Arc<RgbaImage>,
}

impl FakeStream {
    pub fn new(id: &str, width: u32, height: u32) -> Self {
        Self {
            id: id.to_string(),
            track: Arc::new(VideoTrack::new(id)),
            frame: Arc::new(RgbaImage::from_pixel(width, height, image::Rgba([128, 128, 128, 255]))),
        }
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        vec![self.track.clone() as Arc<dyn MediaTrack>]
    }

    fn settings(&self) -> TrackSettings {
        TrackSettings {
            width: self.frame.width(),
            height: self.frame.height(),
        }
    }

    fn latest_frame(&self) -> Option<Arc<RgbaImage>> {
        self.track.is_live().then(|| self.frame.clone())
    }
}

#[derive(Default)]
struct CameraLog {
    calls: usize,
    last_constraints: Option<MediaConstraints>,
    streams: Vec<StreamHandle>,
}

/// Standard-API camera that records every request
pub struct FakeCamera {
    failure: Option<CameraError>,
    gate: Option<Arc<Notify>>,
    log: Arc<Mutex<CameraLog>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            failure: None,
            gate: None,
            log: Arc::default(),
        }
    }

    pub fn failing(error: CameraError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    /// Requests stay pending until [`FakeCamera::release`]
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::new()
        }
    }

    /// Let one pending request complete
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.log.lock().calls
    }

    pub fn last_constraints(&self) -> Option<MediaConstraints> {
        self.log.lock().last_constraints
    }

    pub fn streams(&self) -> Vec<StreamHandle> {
        self.log.lock().streams.clone()
    }

    /// Streams handed out that still hold the camera
    pub fn active_streams(&self) -> usize {
        self.log
            .lock()
            .streams
            .iter()
            .filter(|s| is_active(s.as_ref()))
            .count()
    }
}

impl MediaDevices for FakeCamera {
    fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> BoxFuture<'static, Result<StreamHandle, CameraError>> {
        let call = {
            let mut log = self.log.lock();
            log.calls += 1;
            log.last_constraints = Some(constraints);
            log.calls
        };
        let failure = self.failure.clone();
        let gate = self.gate.clone();
        let log = self.log.clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if let Some(error) = failure {
                return Err(error);
            }
            let stream: StreamHandle = Arc::new(FakeStream::new(&format!("fake-{}", call), 320, 240));
            log.lock().streams.push(stream.clone());
            Ok(stream)
        })
    }
}

/// Callback-style camera
pub struct FakeLegacyCamera {
    failure: Option<CameraError>,
}

impl FakeLegacyCamera {
    pub fn succeeding() -> Self {
        Self { failure: None }
    }

    pub fn failing(error: CameraError) -> Self {
        Self { failure: Some(error) }
    }
}

impl LegacyUserMedia for FakeLegacyCamera {
    fn get_user_media(
        &self,
        _constraints: MediaConstraints,
        on_success: LegacySuccess,
        on_error: LegacyFailure,
    ) {
        match &self.failure {
            Some(error) => on_error(error.clone()),
            None => on_success(Arc::new(FakeStream::new("legacy", 640, 480))),
        }
    }
}

#[derive(Default)]
struct ScannerState {
    on_decode: Option<OnDecode>,
    on_error: Option<OnFrameError>,
    started_with: Option<(FacingMode, ScanConfig)>,
    scanning: bool,
}

/// Scanner whose decodes are triggered by the test
pub struct FakeScanner {
    region_id: String,
    failure: Option<ScanError>,
    gate: Option<Arc<Notify>>,
    active: Arc<AtomicUsize>,
    state: Arc<Mutex<ScannerState>>,
}

impl FakeScanner {
    pub fn emit_decode(&self, text: &str) {
        let mut state = self.state.lock();
        if let Some(on_decode) = state.on_decode.as_mut() {
            on_decode(text.to_string());
        }
    }

    pub fn emit_frame_error(&self, message: &str) {
        let mut state = self.state.lock();
        if let Some(on_error) = state.on_error.as_mut() {
            on_error(message.to_string());
        }
    }

    pub fn started_with(&self) -> Option<(FacingMode, ScanConfig)> {
        self.state.lock().started_with
    }
}

impl fmt::Debug for FakeScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeScanner")
            .field("region_id", &self.region_id)
            .field("scanning", &self.is_scanning())
            .finish()
    }
}

impl QrScanner for FakeScanner {
    fn region_id(&self) -> &str {
        &self.region_id
    }

    fn start(
        &self,
        facing: FacingMode,
        config: ScanConfig,
        on_decode: OnDecode,
        on_error: OnFrameError,
    ) -> BoxFuture<'static, Result<(), ScanError>> {
        let failure = self.failure.clone();
        let gate = self.gate.clone();
        let active = self.active.clone();
        let state = self.state.clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if let Some(error) = failure {
                return Err(error);
            }
            let mut state = state.lock();
            state.on_decode = Some(on_decode);
            state.on_error = Some(on_error);
            state.started_with = Some((facing, config));
            if !state.scanning {
                state.scanning = true;
                active.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.on_decode = None;
        state.on_error = None;
        if state.scanning {
            state.scanning = false;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_scanning(&self) -> bool {
        self.state.lock().scanning
    }
}

/// Builds [`FakeScanner`]s and tracks how many are scanning at once
pub struct FakeScannerFactory {
    unavailable: bool,
    start_failure: Option<ScanError>,
    gate: Option<Arc<Notify>>,
    active: Arc<AtomicUsize>,
    created: Mutex<Vec<Arc<FakeScanner>>>,
}

impl FakeScannerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            unavailable: false,
            start_failure: None,
            gate: None,
            active: Arc::default(),
            created: Mutex::default(),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            unavailable: true,
            start_failure: None,
            gate: None,
            active: Arc::default(),
            created: Mutex::default(),
        })
    }

    pub fn failing_start(error: ScanError) -> Arc<Self> {
        Arc::new(Self {
            unavailable: false,
            start_failure: Some(error),
            gate: None,
            active: Arc::default(),
            created: Mutex::default(),
        })
    }

    /// Starts stay pending until [`FakeScannerFactory::release`]
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            unavailable: false,
            start_failure: None,
            gate: Some(Arc::new(Notify::new())),
            active: Arc::default(),
            created: Mutex::default(),
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn factory(self: &Arc<Self>) -> ScannerFactory {
        let this = self.clone();
        Arc::new(move |region_id: &str| this.create(region_id))
    }

    fn create(&self, region_id: &str) -> Result<ScannerHandle, ScanError> {
        if self.unavailable {
            return Err(ScanError::LibraryUnavailable);
        }
        let scanner = Arc::new(FakeScanner {
            region_id: region_id.to_string(),
            failure: self.start_failure.clone(),
            gate: self.gate.clone(),
            active: self.active.clone(),
            state: Arc::default(),
        });
        self.created.lock().push(scanner.clone());
        Ok(scanner)
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn last(&self) -> Option<Arc<FakeScanner>> {
        self.created.lock().last().cloned()
    }

    /// Scanners currently scanning
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
