/// Camera access
///
/// Devices are reached through the `Navigator` traits in `media.rs`, so the
/// capture screen works the same against real hardware, the folder-backed
/// camera or the test fakes.
///
/// Layout:
/// - `context.rs` - secure-origin check
/// - `media.rs` - streams, tracks, constraints and acquisition strategies
/// - `acquire.rs` - one cancellable acquisition attempt
/// - `video.rs` - the surface a stream is played into
/// - `still.rs` - offscreen canvas and JPEG encoding
/// - `object_url.rs` - display handles for captured stills
/// - `folder.rs` - camera backed by image folders

pub mod context;
pub mod media;
pub mod acquire;
pub mod video;
pub mod still;
pub mod object_url;
pub mod folder;
