/// Capture screen
///
/// Wires [`CaptureSession`] into iced: acquisitions become tasks, results come
/// back as messages tagged with their attempt, and a subscription refreshes
/// the live preview while a camera or scanner is running.

use std::sync::Arc;

use chrono::Utc;
use futures::channel::mpsc;
use futures::StreamExt;
use iced::widget::image::Handle;
use iced::widget::{button, canvas, column, container, radio, row, scrollable, stack, text, Space};
use iced::{Alignment, Color, ContentFit, Element, Font, Length, Subscription, Task};
use image::RgbaImage;

use super::scan_region::ScanOverlay;
use crate::camera::acquire::{acquire_camera, AttemptId};
use crate::camera::media::{CameraError, MediaConstraints, StreamHandle};
use crate::camera::object_url::ObjectUrl;
use crate::camera::still::{encode_jpeg, EncodeError, JPEG_QUALITY};
use crate::platform::Platform;
use crate::qr::scanner::{init_scanner, ScanError, ScannerHandle, REGION_MIN_HEIGHT, REGION_WIDTH};
use crate::state::capture::{Acquisition, CameraPhase, CaptureSession, QrPhase};
use crate::state::data::{EncodedImage, FacingMode, Mode};
use crate::state::session::SessionContext;

const VIEWFINDER_WIDTH: f32 = REGION_WIDTH;
const VIEWFINDER_HEIGHT: f32 = 360.0;
const ERROR_COLOR: Color = Color::from_rgb(0.9, 0.3, 0.3);

#[derive(Debug, Clone)]
pub enum CaptureMessage {
    ModeSelected(Mode),
    FlipCamera,
    StreamReady(AttemptId, Result<StreamHandle, CameraError>),
    ScannerReady(AttemptId, Result<ScannerHandle, ScanError>),
    QrDecoded(AttemptId, String),
    Capture,
    PhotoEncoded(AttemptId, Result<EncodedImage, EncodeError>),
    Submit,
    /// Refresh the live preview
    Tick,
}

#[derive(Debug)]
pub struct CaptureScreen {
    platform: Platform,
    session: CaptureSession,
    /// Latest live frame
    preview: Option<Handle>,
    /// Decoded still of the current photo, keyed by its object URL
    still: Option<(ObjectUrl, Handle)>,
    /// Pretty-printed submission
    submitted: Option<String>,
}

impl CaptureScreen {
    /// Mount the screen and start the default mode
    pub fn new(platform: Platform, facing: FacingMode) -> (Self, Task<CaptureMessage>) {
        let session = CaptureSession::new(Mode::default(), facing, platform.secure_context);
        let mut screen = Self {
            platform,
            session,
            preview: None,
            still: None,
            submitted: None,
        };

        let acquisition = screen.session.start();
        let task = screen.launch(acquisition);
        (screen, task)
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn submitted_json(&self) -> Option<&str> {
        self.submitted.as_deref()
    }

    pub fn update(&mut self, message: CaptureMessage, identity: &SessionContext) -> Task<CaptureMessage> {
        let task = match message {
            CaptureMessage::ModeSelected(mode) if mode == self.session.mode() => Task::none(),
            CaptureMessage::ModeSelected(mode) => {
                let acquisition = self.session.set_mode(mode);
                self.preview = None;
                self.launch(acquisition)
            }
            CaptureMessage::FlipCamera => {
                let acquisition = self.session.flip_facing();
                self.preview = None;
                self.launch(acquisition)
            }
            CaptureMessage::StreamReady(attempt, result) => {
                self.session.on_stream(attempt, result);
                self.refresh_preview();
                Task::none()
            }
            CaptureMessage::ScannerReady(attempt, result) => {
                self.session.on_scanner(attempt, result);
                Task::none()
            }
            CaptureMessage::QrDecoded(attempt, decoded) => {
                self.session.on_decoded(attempt, decoded);
                Task::none()
            }
            CaptureMessage::Capture => match self.session.begin_capture() {
                Some((attempt, canvas)) => Task::perform(encode_jpeg(canvas, JPEG_QUALITY), move |result| {
                    CaptureMessage::PhotoEncoded(attempt, result)
                }),
                None => Task::none(),
            },
            CaptureMessage::PhotoEncoded(attempt, result) => {
                self.session.on_photo_encoded(attempt, result);
                Task::none()
            }
            CaptureMessage::Submit => {
                self.session.submit(identity.username(), Utc::now());
                Task::none()
            }
            CaptureMessage::Tick => {
                self.refresh_preview();
                Task::none()
            }
        };

        self.sync_results();
        task
    }

    pub fn subscription(&self) -> Subscription<CaptureMessage> {
        if self.is_live() {
            iced::time::every(self.platform.frame_interval()).map(|_| CaptureMessage::Tick)
        } else {
            Subscription::none()
        }
    }

    /// Turn an acquisition into the tasks that carry it out
    fn launch(&self, acquisition: Acquisition) -> Task<CaptureMessage> {
        match acquisition {
            Acquisition::Camera { attempt, token, facing } => Task::perform(
                acquire_camera(
                    self.platform.secure_context,
                    self.platform.navigator.clone(),
                    MediaConstraints::video_only(facing),
                    token,
                ),
                move |result| CaptureMessage::StreamReady(attempt, result),
            ),
            Acquisition::Scanner { attempt, token, facing } => {
                let (decoded_tx, decoded_rx) = mpsc::unbounded();
                // Decodes stop flowing once the attempt is cancelled
                let decodes = decoded_rx.take_until(token.clone().cancelled_owned());

                Task::batch([
                    Task::perform(
                        init_scanner(
                            self.platform.scanners.clone(),
                            facing,
                            self.platform.scan_config,
                            token,
                            decoded_tx,
                        ),
                        move |result| CaptureMessage::ScannerReady(attempt, result),
                    ),
                    Task::run(decodes, move |decoded| CaptureMessage::QrDecoded(attempt, decoded)),
                ])
            }
            Acquisition::None => Task::none(),
        }
    }

    fn is_live(&self) -> bool {
        self.session.video().is_playing()
            || self.session.scanner().is_some_and(|scanner| scanner.is_scanning())
    }

    fn refresh_preview(&mut self) {
        let frame = match self.session.mode() {
            Mode::Photo => self.session.video().current_frame(),
            Mode::Qr => self.session.scanner().and_then(|scanner| scanner.preview_frame()),
        };
        // Keep the last frame once a code was read
        if frame.is_none() && self.session.qr_phase() == QrPhase::Decoded {
            return;
        }
        self.preview = frame.map(|frame| rgba_handle(&frame));
    }

    /// Keep the decoded still and the rendered JSON in step with the session
    fn sync_results(&mut self) {
        match self.session.photo() {
            None => self.still = None,
            Some(photo) => {
                let current = self.still.as_ref().is_some_and(|(url, _)| *url == photo.url);
                if !current {
                    self.still = self
                        .session
                        .object_urls()
                        .resolve(&photo.url)
                        .map(|bytes| (photo.url.clone(), Handle::from_bytes(bytes.as_ref().clone())));
                }
            }
        }

        self.submitted = self.session.submission().and_then(|payload| match payload.to_pretty_json() {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!("Failed to render submission: {}", e);
                None
            }
        });
    }

    // ========== View ==========

    pub fn view(&self) -> Element<CaptureMessage> {
        let mode = self.session.mode();
        let mode_picker = row![
            radio(Mode::Photo.to_string(), Mode::Photo, Some(mode), CaptureMessage::ModeSelected),
            radio(Mode::Qr.to_string(), Mode::Qr, Some(mode), CaptureMessage::ModeSelected),
        ]
        .spacing(24);

        let body = match mode {
            Mode::Photo => self.photo_view(),
            Mode::Qr => self.qr_view(),
        };

        let submit = self.session.can_submit().then_some(CaptureMessage::Submit);

        let mut content = column![
            text("Capture Meter").size(32),
            mode_picker,
            body,
        ]
        .spacing(20)
        .padding(24)
        .align_x(Alignment::Center);

        if let Some(error) = self.session.error() {
            content = content.push(text(error).color(ERROR_COLOR));
        }

        content = content.push(button("Submit").on_press_maybe(submit).padding(10));

        if let Some(json) = &self.submitted {
            content = content.push(
                container(text(json.as_str()).font(Font::MONOSPACE).size(14))
                    .padding(12)
                    .width(Length::Fixed(VIEWFINDER_WIDTH))
                    .style(container::rounded_box),
            );
        }

        scrollable(container(content).center_x(Length::Fill)).into()
    }

    fn photo_view(&self) -> Element<CaptureMessage> {
        let viewfinder: Element<CaptureMessage> = match &self.preview {
            Some(handle) => iced::widget::image(handle.clone())
                .width(Length::Fixed(VIEWFINDER_WIDTH))
                .height(Length::Fixed(VIEWFINDER_HEIGHT))
                .content_fit(ContentFit::Contain)
                .into(),
            None => {
                let placeholder = match self.session.camera_phase() {
                    CameraPhase::Requesting => "Starting camera...",
                    CameraPhase::Error => "Camera unavailable",
                    CameraPhase::Idle | CameraPhase::Streaming => "",
                };
                container(text(placeholder))
                    .width(Length::Fixed(VIEWFINDER_WIDTH))
                    .height(Length::Fixed(VIEWFINDER_HEIGHT))
                    .center_x(Length::Fixed(VIEWFINDER_WIDTH))
                    .center_y(Length::Fixed(VIEWFINDER_HEIGHT))
                    .style(container::rounded_box)
                    .into()
            }
        };

        let controls = row![
            button(self.session.facing().flip_label()).on_press(CaptureMessage::FlipCamera),
            button("Capture").on_press(CaptureMessage::Capture),
        ]
        .spacing(12);

        let mut section = column![viewfinder, controls]
            .spacing(12)
            .align_x(Alignment::Center);

        if let Some(photo) = self.session.photo() {
            section = section.push(text(photo.summary()).size(14));
            if let Some((_, handle)) = &self.still {
                section = section.push(
                    iced::widget::image(handle.clone()).width(Length::Fixed(VIEWFINDER_WIDTH / 2.0)),
                );
            }
        }

        section.into()
    }

    fn qr_view(&self) -> Element<CaptureMessage> {
        let feed: Element<CaptureMessage> = match &self.preview {
            Some(handle) => iced::widget::image(handle.clone())
                .width(Length::Fill)
                .height(Length::Fill)
                .content_fit(ContentFit::Cover)
                .into(),
            None => Space::new(Length::Fill, Length::Fill).into(),
        };

        let overlay = canvas(ScanOverlay {
            qrbox: self.platform.scan_config.qrbox,
            decoded: self.session.qr_phase() == QrPhase::Decoded,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        let region = container(stack![feed, overlay])
            .width(Length::Fixed(REGION_WIDTH))
            .height(Length::Fixed(REGION_MIN_HEIGHT))
            .style(container::rounded_box);

        let controls = row![
            button(self.session.facing().flip_label()).on_press(CaptureMessage::FlipCamera),
        ];

        let mut section = column![region, controls]
            .spacing(12)
            .align_x(Alignment::Center);

        match (self.session.qr_phase(), self.session.decoded()) {
            (QrPhase::Scanning, _) => section = section.push(text("Scanning...")),
            (_, Some(decoded)) => {
                section = section.push(
                    container(text(decoded).font(Font::MONOSPACE))
                        .padding(12)
                        .width(Length::Fixed(VIEWFINDER_WIDTH))
                        .style(container::rounded_box),
                );
            }
            _ => {}
        }

        section.into()
    }
}

fn rgba_handle(frame: &Arc<RgbaImage>) -> Handle {
    Handle::from_rgba(frame.width(), frame.height(), frame.as_raw().clone())
}
