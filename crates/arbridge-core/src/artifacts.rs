//! Audit screenshots written around each executed step.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::driver::{DeviceControl, DriverError};

/// Builds `screenshot_<label>_<unix-seconds>.png`.
///
/// Characters outside `[A-Za-z0-9_-]` in the label become `_`, so step names
/// such as `Tap [Place Object]_before` are safe on every filesystem.
pub fn screenshot_filename(label: &str, at: DateTime<Utc>) -> String {
    let slug: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("screenshot_{}_{}.png", slug, at.timestamp())
}

/// Writes device screenshots into a directory.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captures the current frame and saves it under a name derived from
    /// `label` and the current time.
    ///
    /// # Returns
    ///
    /// The path of the written file.
    pub async fn capture<D>(&self, device: &D, label: &str) -> Result<PathBuf, DriverError>
    where
        D: DeviceControl + ?Sized,
    {
        let png = device.screenshot().await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(screenshot_filename(label, Utc::now()));
        tokio::fs::write(&path, &png).await?;
        info!(path = %path.display(), bytes = png.len(), "saved screenshot");
        Ok(path)
    }
}
