/// The surface a camera stream is attached to for live preview and capture

use std::sync::Arc;

use image::RgbaImage;

use super::media::{is_active, CameraError, StreamHandle};

/// Plays an attached stream; reports zero size while nothing is playing
#[derive(Debug, Default)]
pub struct VideoSurface {
    source: Option<StreamHandle>,
    playing: bool,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a stream as the surface's source. Playback is not started.
    pub fn attach(&mut self, stream: StreamHandle) {
        self.source = Some(stream);
        self.playing = false;
    }

    /// Start playback of the attached stream
    pub fn play(&mut self) -> Result<(), CameraError> {
        match &self.source {
            Some(stream) if is_active(stream.as_ref()) => {
                self.playing = true;
                Ok(())
            }
            Some(_) => Err(CameraError::device("The attached stream has ended")),
            None => Err(CameraError::device("No stream attached")),
        }
    }

    /// Drop the source without stopping it; the owner stops the tracks
    pub fn detach(&mut self) {
        self.source = None;
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing && self.source.as_deref().is_some_and(|s| is_active(s))
    }

    pub fn video_width(&self) -> u32 {
        self.live_source().map_or(0, |s| s.settings().width)
    }

    pub fn video_height(&self) -> u32 {
        self.live_source().map_or(0, |s| s.settings().height)
    }

    /// The frame currently shown, if the stream is live
    pub fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        self.live_source().and_then(|s| s.latest_frame())
    }

    fn live_source(&self) -> Option<&StreamHandle> {
        self.source.as_ref().filter(|s| is_active(s.as_ref()))
    }
}
