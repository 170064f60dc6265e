use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const CLASSIFY_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
pub const SEGMENT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub fn is_eligible(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Lists the eligible image files directly inside `dir`, ordered by file name.
/// Symlinks are followed.
pub fn scan_images(dir: impl AsRef<Path>, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut images = Vec::new();

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_eligible(&path, extensions) {
            images.push(path);
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}
