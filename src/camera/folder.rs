/// Folder-backed camera
///
/// Streams still images from one directory per facing mode, cycling through
/// them at a fixed frame rate. This is the device the desktop build ships
/// with; drop frames into the configured folders to feed the capture screen.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use image::imageops;
use image::RgbaImage;
use walkdir::WalkDir;

use super::media::{
    CameraError, MediaConstraints, MediaDevices, MediaStream, MediaTrack, StreamHandle, TrackSettings,
    VideoTrack,
};
use crate::state::data::FacingMode;

const DEVICE_NOT_FOUND: &str = "Requested device not found";

/// Supported frame file extensions
const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct FolderCamera {
    front_dir: PathBuf,
    back_dir: PathBuf,
    frame_rate: u32,
    max_frames: usize,
}

impl FolderCamera {
    pub fn new(front_dir: PathBuf, back_dir: PathBuf, frame_rate: u32, max_frames: usize) -> Self {
        Self {
            front_dir,
            back_dir,
            frame_rate: frame_rate.max(1),
            max_frames: max_frames.max(1),
        }
    }

    fn dir_for(&self, facing: FacingMode) -> &Path {
        match facing {
            FacingMode::User => &self.front_dir,
            FacingMode::Environment => &self.back_dir,
        }
    }
}

impl MediaDevices for FolderCamera {
    fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> BoxFuture<'static, Result<StreamHandle, CameraError>> {
        let dir = self.dir_for(constraints.video.facing_mode).to_path_buf();
        let max_frames = self.max_frames;
        let frame_interval = Duration::from_millis(1000 / u64::from(self.frame_rate));
        let aspect_ratio = constraints.video.aspect_ratio;

        Box::pin(async move {
            let label = format!("folder:{}", dir.display());
            let frames =
                tokio::task::spawn_blocking(move || load_frames(&dir, max_frames, aspect_ratio))
                    .await
                    .map_err(|e| CameraError::device(format!("Camera task failed: {}", e)))??;

            tracing::info!("📷 Opened {} ({} frames)", label, frames.len());
            Ok(Arc::new(FolderStream::new(label, frames, frame_interval)) as StreamHandle)
        })
    }
}

/// Load and decode up to `max_frames` images from `dir`, sorted by path
fn load_frames(
    dir: &Path,
    max_frames: usize,
    aspect_ratio: Option<f32>,
) -> Result<Vec<Arc<RgbaImage>>, CameraError> {
    if !dir.is_dir() {
        tracing::warn!("Camera folder does not exist: {}", dir.display());
        return Err(CameraError::device(DEVICE_NOT_FOUND));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_frame_file(p))
        .collect();
    paths.sort();
    paths.truncate(max_frames);

    let frames: Vec<Arc<RgbaImage>> = paths
        .iter()
        .filter_map(|path| match image::open(path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                tracing::warn!("Skipping unreadable frame {}: {}", path.display(), e);
                None
            }
        })
        .map(|frame| match aspect_ratio {
            Some(ratio) => crop_to_aspect(&frame, ratio),
            None => frame,
        })
        .map(Arc::new)
        .collect();

    if frames.is_empty() {
        return Err(CameraError::device(DEVICE_NOT_FOUND));
    }
    Ok(frames)
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.as_str()))
}

/// Centre-crop `frame` to width / height == `ratio`
fn crop_to_aspect(frame: &RgbaImage, ratio: f32) -> RgbaImage {
    let (width, height) = frame.dimensions();
    if ratio <= 0.0 || width == 0 || height == 0 {
        return frame.clone();
    }

    let target_width = ((height as f32) * ratio).round() as u32;
    let (crop_width, crop_height) = if target_width <= width {
        (target_width.max(1), height)
    } else {
        (width, ((width as f32) / ratio).round().max(1.0) as u32)
    };

    let x = (width - crop_width) / 2;
    let y = (height - crop_height) / 2;
    imageops::crop_imm(frame, x, y, crop_width, crop_height).to_image()
}

/// A stream that cycles through pre-decoded frames
pub struct FolderStream {
    id: String,
    track: Arc<VideoTrack>,
    frames: Vec<Arc<RgbaImage>>,
    started: Instant,
    frame_interval: Duration,
}

impl FolderStream {
    fn new(label: String, frames: Vec<Arc<RgbaImage>>, frame_interval: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            track: Arc::new(VideoTrack::new(label)),
            frames,
            started: Instant::now(),
            frame_interval,
        }
    }

    fn frame_index(&self) -> usize {
        let interval = self.frame_interval.as_millis().max(1);
        let elapsed = self.started.elapsed().as_millis();
        ((elapsed / interval) % self.frames.len() as u128) as usize
    }
}

impl std::fmt::Debug for FolderStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderStream")
            .field("id", &self.id)
            .field("track", &self.track)
            .field("frames", &self.frames.len())
            .finish()
    }
}

impl MediaStream for FolderStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        vec![self.track.clone() as Arc<dyn MediaTrack>]
    }

    fn settings(&self) -> TrackSettings {
        let (width, height) = self.frames[0].dimensions();
        TrackSettings { width, height }
    }

    fn latest_frame(&self) -> Option<Arc<RgbaImage>> {
        if !self.track.is_live() {
            return None;
        }
        self.frames.get(self.frame_index()).cloned()
    }
}
