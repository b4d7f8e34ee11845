//! Configuration supplied by the outer application.
//!
//! The engine consumes a small JSON file; every field has a default so a
//! missing or partial file still yields a usable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AutomationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Absolute path of the primary (market-data) application executable.
    pub app_path: PathBuf,
    /// File name of the order-entry executable, resolved as a sibling of
    /// `app_path`. The vendor ships both binaries in one directory.
    pub companion_exe: String,
    /// Exact title of the trading terminal's top-level window.
    pub trading_window_title: String,
    /// Directory for transient artifacts (the captured captcha image).
    pub cache_dir: PathBuf,
    /// Directory containing the Tesseract OCR binary.
    pub ocr_dir: PathBuf,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            app_path: PathBuf::from("D:\\同花顺软件\\同花顺\\hexin.exe"),
            companion_exe: "xiadan.exe".to_string(),
            trading_window_title: "网上股票交易系统5.0".to_string(),
            cache_dir: PathBuf::from("cache"),
            ocr_dir: PathBuf::from("Tesseract-OCR"),
        }
    }
}

impl DeskConfig {
    /// Load the configuration from a JSON file. A missing file falls back to
    /// the defaults; a malformed file is a hard error so typos do not
    /// silently drive the wrong window.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                AutomationError::InvalidArgument(format!(
                    "failed to parse config {}: {e}",
                    path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AutomationError::PlatformError(format!(
                "failed to read config {}: {e}",
                path.display()
            ))),
        }
    }

    /// Path of the order-entry executable: `companion_exe` next to
    /// `app_path`. Re-derived on every activation, never cached as a handle.
    pub fn trading_executable(&self) -> PathBuf {
        match self.app_path.parent() {
            Some(dir) => dir.join(&self.companion_exe),
            None => PathBuf::from(&self.companion_exe),
        }
    }

    /// Where the captured captcha image is written, overwritten per solve.
    pub fn captcha_image_path(&self) -> PathBuf {
        self.cache_dir.join("image.png")
    }
}
