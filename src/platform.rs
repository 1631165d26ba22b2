/// Devices and services the capture screen talks to

use std::fmt;
use std::sync::Arc;

use crate::camera::context::is_secure_origin;
use crate::camera::folder::FolderCamera;
use crate::camera::media::Navigator;
use crate::config::AppConfig;
use crate::qr::frame_scanner::FrameScanner;
use crate::qr::scanner::{ScanConfig, ScannerFactory, ScannerHandle};

/// Everything the capture screen needs from the outside world
#[derive(Clone)]
pub struct Platform {
    /// Whether the app runs on a secure origin
    pub secure_context: bool,
    pub navigator: Navigator,
    pub scanners: ScannerFactory,
    pub scan_config: ScanConfig,
    /// Live preview refresh rate
    pub frame_rate: u32,
}

impl Platform {
    /// Folder-backed camera and an `rqrr` scanner on top of it
    pub fn from_config(config: &AppConfig) -> Self {
        let secure_context = is_secure_origin(&config.origin);
        if !secure_context {
            tracing::warn!(origin = %config.origin, "Origin is not a secure context, camera access will be refused");
        }

        let camera = Arc::new(FolderCamera::new(
            config.camera.front_dir.clone(),
            config.camera.back_dir.clone(),
            config.camera.frame_rate,
            config.camera.max_frames,
        ));
        let navigator = Navigator::standard(camera);

        let scanner_navigator = navigator.clone();
        let scanners: ScannerFactory = Arc::new(move |region_id: &str| {
            let scanner: ScannerHandle = Arc::new(FrameScanner::new(
                region_id,
                scanner_navigator.clone(),
                secure_context,
            ));
            Ok(scanner)
        });

        Self {
            secure_context,
            navigator,
            scanners,
            scan_config: ScanConfig::default(),
            frame_rate: config.camera.frame_rate.max(1),
        }
    }

    /// Interval between preview refreshes
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.frame_rate.max(1)))
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("secure_context", &self.secure_context)
            .field("navigator", &self.navigator)
            .field("scan_config", &self.scan_config)
            .field("frame_rate", &self.frame_rate)
            .finish()
    }
}
