/// QR scanner that decodes camera frames with `rqrr`

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use image::imageops;
use image::{DynamicImage, RgbaImage};
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::scanner::{cover_scale, OnDecode, OnFrameError, QrScanner, ScanBox, ScanConfig, ScanError};
use crate::camera::acquire::acquire_camera;
use crate::camera::media::{stop_all_tracks, MediaConstraints, Navigator, StreamHandle};
use crate::state::data::FacingMode;

#[derive(Default)]
struct Session {
    stream: Option<StreamHandle>,
    token: Option<CancellationToken>,
    /// Start in flight, claimed before the camera is requested
    starting: Option<(u64, CancellationToken)>,
    next_start: u64,
}

/// Polls the camera at the configured rate and decodes the centre of each frame
pub struct FrameScanner {
    region_id: String,
    navigator: Navigator,
    secure_context: bool,
    session: Arc<Mutex<Session>>,
}

impl FrameScanner {
    pub fn new(region_id: &str, navigator: Navigator, secure_context: bool) -> Self {
        Self {
            region_id: region_id.to_string(),
            navigator,
            secure_context,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }
}

impl fmt::Debug for FrameScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameScanner")
            .field("region_id", &self.region_id)
            .field("scanning", &self.is_scanning())
            .finish()
    }
}

impl QrScanner for FrameScanner {
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
        let navigator = self.navigator.clone();
        let secure_context = self.secure_context;
        let session = self.session.clone();

        Box::pin(async move {
            let token = CancellationToken::new();
            let start_id = {
                let mut session = session.lock();
                if session.token.is_some() || session.starting.is_some() {
                    return Err(ScanError::Start("Scanner is already running".to_string()));
                }
                session.next_start += 1;
                session.starting = Some((session.next_start, token.clone()));
                session.next_start
            };

            let constraints =
                MediaConstraints::video_only(facing).with_aspect_ratio(config.aspect_ratio);
            let acquired = acquire_camera(secure_context, navigator, constraints, token.clone()).await;

            let stream = {
                let mut session = session.lock();
                if matches!(&session.starting, Some((id, _)) if *id == start_id) {
                    session.starting = None;
                }
                let stream = acquired?;
                // Stopped while the camera was opening
                if token.is_cancelled() {
                    stop_all_tracks(stream.as_ref());
                    return Err(ScanError::Superseded);
                }
                session.stream = Some(stream.clone());
                session.token = Some(token.clone());
                stream
            };

            tokio::spawn(scan_loop(stream, config, token, on_decode, on_error));
            Ok(())
        })
    }

    fn stop(&self) {
        let mut session = self.session.lock();
        if let Some((_, token)) = session.starting.take() {
            token.cancel();
        }
        if let Some(token) = session.token.take() {
            token.cancel();
        }
        if let Some(stream) = session.stream.take() {
            stop_all_tracks(stream.as_ref());
        }
    }

    fn is_scanning(&self) -> bool {
        self.session.lock().token.is_some()
    }

    fn preview_frame(&self) -> Option<Arc<RgbaImage>> {
        self.session.lock().stream.as_ref().and_then(|s| s.latest_frame())
    }
}

async fn scan_loop(
    stream: StreamHandle,
    config: ScanConfig,
    token: CancellationToken,
    mut on_decode: OnDecode,
    mut on_error: OnFrameError,
) {
    let mut ticker = tokio::time::interval(config.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(frame) = stream.latest_frame() else {
            continue;
        };
        let qrbox = config.qrbox;
        let decoded = tokio::task::spawn_blocking(move || decode_frame(&frame, qrbox)).await;

        // Stopped while decoding
        if token.is_cancelled() {
            break;
        }

        match decoded {
            Ok(Ok(text)) => on_decode(text),
            Ok(Err(message)) => on_error(message),
            Err(e) => on_error(e.to_string()),
        }
    }

    stop_all_tracks(stream.as_ref());
    tracing::debug!("QR scan loop finished");
}

/// Crop rectangle `(x, y, width, height)` of the drawn detection box in frame pixels
fn detection_window(width: u32, height: u32, qrbox: ScanBox) -> (u32, u32, u32, u32) {
    let scale = cover_scale(width, height);
    let box_width = ((qrbox.width as f32 / scale).round() as u32).clamp(1, width.max(1));
    let box_height = ((qrbox.height as f32 / scale).round() as u32).clamp(1, height.max(1));

    let x = width.saturating_sub(box_width) / 2;
    let y = height.saturating_sub(box_height) / 2;
    (x, y, box_width.min(width), box_height.min(height))
}

/// Decode the first QR code inside the detection box
fn decode_frame(frame: &RgbaImage, qrbox: ScanBox) -> Result<String, String> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err("Empty frame".to_string());
    }

    let (x, y, w, h) = detection_window(width, height, qrbox);
    let region = imageops::crop_imm(frame, x, y, w, h).to_image();
    let luma = DynamicImage::ImageRgba8(region).to_luma8();

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |px, py| luma.get_pixel(px as u32, py as u32)[0],
    );

    let mut last_error = "No QR code found".to_string();
    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_meta, content)) => return Ok(content),
            Err(e) => last_error = format!("{:?}", e),
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::media::is_active;
    use crate::testing::FakeCamera;

    #[test]
    fn test_detection_window_scales_with_frame() {
        let qrbox = ScanConfig::default().qrbox;
        assert_eq!(detection_window(480, 480, qrbox), (115, 115, 250, 250));
        assert_eq!(detection_window(960, 600, qrbox), (230, 50, 500, 500));
        assert_eq!(detection_window(240, 150, qrbox), (57, 12, 125, 125));
    }

    #[test]
    fn test_detection_window_matches_drawn_box() {
        use crate::qr::scanner::{REGION_MIN_HEIGHT, REGION_WIDTH};
        use crate::ui::scan_region::ScanOverlay;

        let qrbox = ScanConfig::default().qrbox;
        let overlay = ScanOverlay { qrbox, decoded: false };
        let drawn = overlay.detection_rect(iced::Size::new(REGION_WIDTH, REGION_MIN_HEIGHT));

        for (width, height) in [(480, 480), (640, 480), (1280, 720), (720, 1280), (300, 300)] {
            // Map the drawn box from region pixels back into the covered frame
            let scale = cover_scale(width, height);
            let offset_x = (REGION_WIDTH - width as f32 * scale) / 2.0;
            let offset_y = (REGION_MIN_HEIGHT - height as f32 * scale) / 2.0;
            let expected = (
                ((drawn.x - offset_x) / scale).round() as i64,
                ((drawn.y - offset_y) / scale).round() as i64,
                (drawn.width / scale).round() as i64,
                (drawn.height / scale).round() as i64,
            );

            let (x, y, w, h) = detection_window(width, height, qrbox);
            let actual = (x as i64, y as i64, w as i64, h as i64);
            assert!(
                (actual.0 - expected.0).abs() <= 1
                    && (actual.1 - expected.1).abs() <= 1
                    && actual.2 == expected.2
                    && actual.3 == expected.3,
                "{}x{}: window {:?} vs drawn {:?}",
                width,
                height,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_blank_frame_has_no_code() {
        let frame = RgbaImage::from_pixel(300, 300, image::Rgba([255, 255, 255, 255]));
        assert!(decode_frame(&frame, ScanConfig::default().qrbox).is_err());
        assert!(decode_frame(&RgbaImage::new(0, 0), ScanConfig::default().qrbox).is_err());
    }

    #[tokio::test]
    async fn test_start_and_stop_release_camera() {
        let camera = Arc::new(FakeCamera::new());
        let scanner = FrameScanner::new("qr-reader", Navigator::standard(camera.clone()), true);

        scanner
            .start(
                FacingMode::Environment,
                ScanConfig::default(),
                Box::new(|_| {}),
                Box::new(|_| {}),
            )
            .await
            .unwrap();

        assert!(scanner.is_scanning());
        assert_eq!(camera.active_streams(), 1);
        let requested = camera.last_constraints().unwrap();
        assert_eq!(requested.video.aspect_ratio, Some(1.0));
        assert!(scanner.preview_frame().is_some());

        scanner.stop();
        assert!(!scanner.is_scanning());
        assert_eq!(camera.active_streams(), 0);
        assert!(camera.streams().iter().all(|s| !is_active(s.as_ref())));
    }

    fn start_task(scanner: &FrameScanner) -> tokio::task::JoinHandle<Result<(), ScanError>> {
        tokio::spawn(scanner.start(
            FacingMode::Environment,
            ScanConfig::default(),
            Box::new(|_| {}),
            Box::new(|_| {}),
        ))
    }

    #[tokio::test]
    async fn test_second_start_while_first_is_pending_is_rejected() {
        let camera = Arc::new(FakeCamera::gated());
        let scanner = FrameScanner::new("qr-reader", Navigator::standard(camera.clone()), true);

        let first = start_task(&scanner);
        tokio::task::yield_now().await;

        let err = start_task(&scanner).await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Scanner is already running");

        camera.release();
        first.await.unwrap().unwrap();
        assert!(scanner.is_scanning());
        assert_eq!(camera.calls(), 1);
        assert_eq!(camera.active_streams(), 1);

        scanner.stop();
        assert_eq!(camera.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_stop_during_pending_start_releases_camera() {
        let camera = Arc::new(FakeCamera::gated());
        let scanner = FrameScanner::new("qr-reader", Navigator::standard(camera.clone()), true);

        let pending = start_task(&scanner);
        tokio::task::yield_now().await;
        scanner.stop();
        camera.release();

        assert!(pending.await.unwrap().is_err());
        assert!(!scanner.is_scanning());
        assert_eq!(camera.active_streams(), 0);

        // The claim is gone, so a fresh start goes through
        let camera_calls = camera.calls();
        let next = start_task(&scanner);
        tokio::task::yield_now().await;
        camera.release();
        next.await.unwrap().unwrap();
        assert_eq!(camera.calls(), camera_calls + 1);
        assert!(scanner.is_scanning());
        scanner.stop();
    }

    #[tokio::test]
    async fn test_insecure_context_fails_to_start() {
        let camera = Arc::new(FakeCamera::new());
        let scanner = FrameScanner::new("qr-reader", Navigator::standard(camera.clone()), false);

        let err = scanner
            .start(FacingMode::User, ScanConfig::default(), Box::new(|_| {}), Box::new(|_| {}))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Camera requires HTTPS or localhost.");
        assert_eq!(camera.calls(), 0);
        assert!(!scanner.is_scanning());
    }
}
