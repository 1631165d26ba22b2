/// Shared data structures for the capture screen
///
/// These structs represent the data model that flows between
/// the capture pipeline and the UI layer.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::camera::object_url::ObjectUrl;

/// Acquisition mode of the capture screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Still photo through the camera stream
    #[default]
    Photo,
    /// Continuous QR scanning until the first decode
    Qr,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Photo => write!(f, "Photo"),
            Mode::Qr => write!(f, "QR"),
        }
    }
}

/// Which camera to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front-facing camera
    User,
    /// Rear-facing camera
    #[default]
    Environment,
}

impl FacingMode {
    /// The opposite camera
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    /// Label for the flip button, naming the camera it switches to
    pub fn flip_label(self) -> &'static str {
        match self {
            FacingMode::Environment => "Use Front Camera",
            FacingMode::User => "Use Back Camera",
        }
    }
}

/// An encoded still image, as produced by the canvas encoder
#[derive(Clone, PartialEq)]
pub struct EncodedImage {
    /// Encoded bytes (shared so messages stay cheap to clone)
    pub bytes: Arc<Vec<u8>>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// Skip the byte dump in logs
impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// The most recently captured still, replaced wholesale on each capture
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPhoto {
    /// Display handle; must be revoked when the photo is replaced or cleared
    pub url: ObjectUrl,
    pub byte_len: u64,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl CapturedPhoto {
    /// Summary line shown under the preview
    pub fn summary(&self) -> String {
        format!("Size: {} bytes • {}×{}", self.byte_len, self.width, self.height)
    }
}

/// The record rendered after "Submit"
///
/// Exactly one of the photo fields or `qr_data` is populated,
/// depending on the mode that was active at submit time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPayload {
    pub username: Option<String>,
    /// ISO-8601 timestamp, UTC with millisecond precision
    pub captured_at: String,
    pub image_bytes: Option<u64>,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub qr_data: Option<String>,
}

impl SubmitPayload {
    /// Payload for a photo submission
    pub fn photo(username: Option<String>, at: DateTime<Utc>, photo: &CapturedPhoto) -> Self {
        Self {
            username,
            captured_at: iso_timestamp(at),
            image_bytes: Some(photo.byte_len),
            mime_type: Some(photo.mime_type.clone()),
            width: Some(photo.width),
            height: Some(photo.height),
            qr_data: None,
        }
    }

    /// Payload for a QR submission
    pub fn qr(username: Option<String>, at: DateTime<Utc>, text: &str) -> Self {
        Self {
            username,
            captured_at: iso_timestamp(at),
            image_bytes: None,
            mime_type: None,
            width: None,
            height: None,
            qr_data: Some(text.to_string()),
        }
    }

    /// Pretty-printed JSON for display
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// `2024-05-01T10:20:30.123Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
