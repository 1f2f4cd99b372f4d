//! Disk persistence for generated images.
//!
//! [`DiskImageStore`] implements the pipeline's [`ImageSink`] trait. Payloads
//! arrive base64-encoded in whatever format the remote service produced and
//! are always written as PNG.
//!
//! # Directory Structure
//!
//! ```text
//! {root}/{folder}/{id}_small.png
//! {root}/{folder}/{id}_big.png
//! ```

use crate::pipeline::{ImageId, ImagePayload, ImageSink, PersistenceError, Variant};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::debug;

/// Default output root, relative to the working directory.
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Writes image variants below a root directory.
///
/// Storing the same `(folder, id, variant)` twice overwrites the first file.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    root: PathBuf,
}

impl DiskImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Constructs the path of one image variant.
    pub fn path_for(&self, folder: &str, id: ImageId, variant: Variant) -> PathBuf {
        self.root
            .join(folder)
            .join(format!("{}_{}.png", id, variant.suffix()))
    }
}

impl Default for DiskImageStore {
    fn default() -> Self {
        Self::new(DEFAULT_RESULTS_DIR)
    }
}

impl ImageSink for DiskImageStore {
    async fn store(
        &self,
        folder: &str,
        id: ImageId,
        variant: Variant,
        image: &ImagePayload,
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.path_for(folder, id, variant);
        let payload = image.clone();

        // Decoding and PNG encoding are CPU-bound
        let png = spawn_blocking(move || to_png(&payload))
            .await
            .map_err(|e| PersistenceError::TaskPanicked(format!("png conversion: {}", e)))??;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| PersistenceError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let size_bytes = png.len();
        tokio::fs::write(&path, png)
            .await
            .map_err(|source| PersistenceError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), size_bytes, "Wrote image");
        Ok(path)
    }
}

/// Converts a base64 payload in any supported format to PNG bytes.
fn to_png(payload: &ImagePayload) -> Result<Vec<u8>, PersistenceError> {
    let bytes = decode_base64(payload.as_str())?;

    let image =
        image::load_from_memory(&bytes).map_err(|e| PersistenceError::Image(e.to_string()))?;

    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| PersistenceError::Image(e.to_string()))?;

    Ok(png.into_inner())
}

/// Decodes standard base64, ignoring embedded line breaks and spaces.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, PersistenceError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    STANDARD
        .decode(compact)
        .map_err(|e| PersistenceError::Decode(e.to_string()))
}
