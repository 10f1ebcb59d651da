//! Local avatar storage.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::Config;
use crate::services::{ServiceError, ServiceResult};

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";

/// Copies avatar images into a directory and hands back `file://` URLs.
pub struct AvatarStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl AvatarStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.avatars.dir.clone(), config.avatars.max_bytes)
    }

    /// Validate `source` and copy it in as `<user_id>-<millis>.<ext>`.
    /// Returns the stored file's URL.
    pub fn store(&self, user_id: &str, source: &Path) -> ServiceResult<String> {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| ServiceError::Validation("Unsupported file format".to_string()))?;

        let size = std::fs::metadata(source)
            .map_err(|e| {
                tracing::warn!(path = %source.display(), error = %e, "Avatar source unreadable");
                ServiceError::Validation(format!("Cannot read {}", source.display()))
            })?
            .len();
        if size > self.max_bytes {
            return Err(ServiceError::Validation(format!(
                "File size exceeds {}MB",
                self.max_bytes / (1024 * 1024)
            )));
        }

        let stored = self.copy_in(user_id, source, &extension).map_err(|e| {
            tracing::error!(user_id, error = %e, "Avatar upload failed");
            ServiceError::Internal(UPLOAD_FAILED_MESSAGE.to_string())
        })?;

        tracing::info!(user_id, path = %stored.display(), size, "Avatar stored");
        Ok(format!("file://{}", stored.display()))
    }

    fn copy_in(&self, user_id: &str, source: &Path, extension: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let dir = self.dir.canonicalize()?;
        let target = dir.join(format!(
            "{}-{}.{}",
            user_id,
            Utc::now().timestamp_millis(),
            extension
        ));
        std::fs::copy(source, &target)?;
        Ok(target)
    }
}
