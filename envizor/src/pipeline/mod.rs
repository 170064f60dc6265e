pub mod classify;
pub mod segment;

pub use classify::ClassifierInference;
pub use segment::{SegmentationInference, SegmentationRun};

use crate::{Error, Result};
use log::warn;
use std::path::Path;

pub(crate) fn require_file(what: &'static str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::not_found(what, path))
    }
}

pub(crate) fn require_dir(what: &'static str, path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::not_found(what, path))
    }
}

/// File name used as the image identifier in every output row.
pub(crate) fn image_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A failing image is logged and skipped unless the run is fail-fast or the
/// fault is one that affects every image.
pub(crate) fn handle_image_fault(path: &Path, err: Error, fail_fast: bool) -> Result<()> {
    if fail_fast || err.is_fatal() {
        return Err(err);
    }

    warn!("Skipping {}: {err}", path.display());
    Ok(())
}
