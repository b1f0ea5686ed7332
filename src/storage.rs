// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for photos and recordings

use crate::backends::camera::BgrFrame;
use crate::backends::camera::format_converters::bgr_to_image;
use crate::errors::{AppError, AppResult};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `<prefix>_YYYYmmdd_HHMMSS.<ext>` for the current local time
pub fn timestamped_name(prefix: &str, extension: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, extension)
}

/// A directory gets a timestamped file name appended; anything else is
/// used as is
pub fn resolve_output(path: &Path, prefix: &str, extension: &str) -> PathBuf {
    if path.is_dir() {
        path.join(timestamped_name(prefix, extension))
    } else {
        path.to_path_buf()
    }
}

/// Create the parent directory of `path` if it does not exist
pub fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Storage(format!("{}: {}", parent.display(), e)))?;
    }
    Ok(())
}

/// Write a BGR frame as JPEG
pub fn save_frame_jpeg(frame: &BgrFrame, path: &Path) -> AppResult<()> {
    let image = bgr_to_image(frame).ok_or_else(|| {
        AppError::Storage(format!(
            "frame buffer does not match {}x{}",
            frame.width, frame.height
        ))
    })?;

    ensure_parent_dir(path)?;
    image.save_with_format(path, image::ImageFormat::Jpeg)?;
    debug!(path = %path.display(), width = frame.width, height = frame.height, "Saved frame");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_name() {
        let name = timestamped_name("photo", "jpg");
        assert!(name.starts_with("photo_"));
        assert!(name.ends_with(".jpg"));
        // photo_ + 8 digits + _ + 6 digits + .jpg
        assert_eq!(name.len(), "photo_".len() + 15 + ".jpg".len());
    }

    #[test]
    fn test_resolve_output() {
        let dir = tempfile::tempdir().unwrap();
        let in_dir = resolve_output(dir.path(), "photo", "jpg");
        assert_eq!(in_dir.parent(), Some(dir.path()));

        let file = dir.path().join("shot.jpg");
        assert_eq!(resolve_output(&file, "photo", "jpg"), file);
    }

    #[test]
    fn test_save_frame_jpeg_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test_photo.jpg");

        let mut frame = BgrFrame::black(32, 24);
        frame.data[2] = 255;
        save_frame_jpeg(&frame, &path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }
}
