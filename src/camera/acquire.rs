/// Camera acquisition for one capture attempt
///
/// Every attempt carries its own [`CancellationToken`]. The token is checked
/// after each suspension point, and a stream that arrives for a cancelled
/// attempt is stopped before it is dropped.

use tokio_util::sync::CancellationToken;

use super::media::{stop_all_tracks, AcquisitionStrategy, CameraError, MediaConstraints, Navigator, StreamHandle};

/// Sequence number tagging the async results of one acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Acquire a video stream, honouring the secure-context rule
///
/// An insecure origin fails with [`CameraError::InsecureContext`] without
/// touching the device API. A cancelled attempt yields
/// [`CameraError::Superseded`].
pub async fn acquire_camera(
    secure_context: bool,
    navigator: Navigator,
    constraints: MediaConstraints,
    token: CancellationToken,
) -> Result<StreamHandle, CameraError> {
    if !secure_context {
        return Err(CameraError::InsecureContext);
    }
    if token.is_cancelled() {
        return Err(CameraError::Superseded);
    }

    let strategy = AcquisitionStrategy::select(&navigator)?;
    tracing::debug!(
        strategy = strategy.name(),
        facing = ?constraints.video.facing_mode,
        "Requesting camera stream"
    );

    let result = strategy.acquire(constraints).await;

    if token.is_cancelled() {
        if let Ok(stream) = &result {
            stop_all_tracks(stream.as_ref());
        }
        tracing::debug!("Dropping camera result of a superseded attempt");
        return Err(CameraError::Superseded);
    }

    result
}
