//! Avatar Store
//!
//! Thin passthrough for avatar uploads: writes the bytes under the data
//! directory and hands back the URL the front end should use.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShelfError};
use crate::state::UserId;

/// Image extensions accepted for avatars
const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// File-backed avatar storage
#[derive(Debug, Clone)]
pub struct AvatarStore {
    dir: PathBuf,
    url_prefix: String,
}

impl AvatarStore {
    pub fn new(dir: &Path, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Store `data` as the avatar of `user`, replacing any previous one
    ///
    /// The stored name is `user_<id>_avatar.<ext>`, taking the extension
    /// from the uploaded filename. Returns the public URL.
    pub fn save(&self, user: UserId, filename: &str, data: &[u8]) -> Result<String> {
        if filename.trim().is_empty() {
            return Err(ShelfError::validation("No selected file"));
        }
        if data.is_empty() {
            return Err(ShelfError::validation("Empty avatar upload"));
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                ShelfError::Validation(format!("Unsupported avatar file type: {}", filename))
            })?;

        fs::create_dir_all(&self.dir)?;
        let name = format!("user_{}_avatar.{}", user, extension);
        fs::write(self.dir.join(&name), data)?;

        tracing::debug!(user, file = %name, bytes = data.len(), "Stored avatar");
        Ok(format!("{}/{}", self.url_prefix.trim_end_matches('/'), name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
