//! Input resolution: pick the file that is actually uploaded.
//!
//! The service accepts JPEG, TIFF and JPEG 2000, but TIFF scans are large
//! and slow to upload. A TIFF input is therefore swapped for a `.jpg`
//! sibling with the same stem when one exists, and converted into a
//! temporary JPEG otherwise.
//!
//! The temporary JPEG lives in a `pero_*` [`TempDir`] owned by
//! [`ResolvedImage`], so it disappears when the value is dropped, on the
//! error path as well as after [`ResolvedImage::cleanup`].

use crate::error::PeroError;
use crate::pipeline::transcode;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Prefix of the per-run temporary directory.
pub const TEMP_DIR_PREFIX: &str = "pero_";

/// Image container formats the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Tiff,
    Jpeg,
    Jp2,
}

impl ImageKind {
    /// Classify a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "tif" | "tiff" => Some(ImageKind::Tiff),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "jp2" => Some(ImageKind::Jp2),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Tiff => "image/tiff",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Jp2 => "image/jp2",
        }
    }
}

/// MIME type for an extension, or [`PeroError::UnsupportedFormat`].
pub fn content_type_for(extension: &str) -> Result<&'static str, PeroError> {
    ImageKind::from_extension(extension)
        .map(ImageKind::mime_type)
        .ok_or_else(|| PeroError::UnsupportedFormat {
            path: PathBuf::new(),
            extension: extension.to_string(),
        })
}

/// Classify a path by its extension.
pub fn image_kind(path: &Path) -> Result<ImageKind, PeroError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    ImageKind::from_extension(&extension).ok_or_else(|| PeroError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension,
    })
}

/// How the uploaded file was obtained.
#[derive(Debug)]
pub enum ImageSource {
    /// The input itself.
    Original,
    /// A `.jpg` next to a TIFF input.
    Sibling,
    /// A JPEG converted from a TIFF input into a temporary directory.
    Converted { temp_dir: TempDir },
}

/// The file to upload plus everything the protocol needs to name it.
#[derive(Debug)]
pub struct ResolvedImage {
    /// File that will be uploaded.
    pub path: PathBuf,
    /// Name the service knows the image by (the input's file stem).
    pub file_name: String,
    /// MIME type of `path`.
    pub content_type: &'static str,
    source: ImageSource,
}

impl ResolvedImage {
    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Whether a temporary conversion file was created.
    pub fn is_converted(&self) -> bool {
        matches!(self.source, ImageSource::Converted { .. })
    }

    /// Remove the temporary JPEG and its directory, if any.
    pub fn cleanup(self) -> Result<(), PeroError> {
        if let ImageSource::Converted { temp_dir } = self.source {
            let dir = temp_dir.path().to_path_buf();
            std::fs::remove_file(&self.path).map_err(|e| {
                PeroError::Internal(format!("Failed to remove {}: {e}", self.path.display()))
            })?;
            temp_dir.close().map_err(|e| {
                PeroError::Internal(format!("Failed to remove {}: {e}", dir.display()))
            })?;
            debug!("Removed temporary directory {}", dir.display());
        }
        Ok(())
    }
}

/// Resolve `input` to the file that should be uploaded.
///
/// `work_dir` is the parent of the temporary directory created for a
/// conversion; `None` means the system temp directory. Nothing is created
/// unless a conversion is actually needed.
pub async fn resolve_image(input: &Path, work_dir: Option<&Path>) -> Result<ResolvedImage, PeroError> {
    let kind = image_kind(input)?;

    if !input.is_file() {
        return Err(PeroError::ImageNotFound {
            path: input.to_path_buf(),
        });
    }

    let file_name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| PeroError::ImageNotFound {
            path: input.to_path_buf(),
        })?;

    if kind != ImageKind::Tiff {
        debug!("Using input image as-is: {}", input.display());
        return Ok(ResolvedImage {
            path: input.to_path_buf(),
            file_name,
            content_type: kind.mime_type(),
            source: ImageSource::Original,
        });
    }

    let jpeg_name = transcode::jpeg_name_for(input).ok_or_else(|| PeroError::ImageNotFound {
        path: input.to_path_buf(),
    })?;

    let sibling = input.with_file_name(&jpeg_name);
    if sibling.is_file() {
        info!("Using existing JPEG sibling: {}", sibling.display());
        return Ok(ResolvedImage {
            path: sibling,
            file_name,
            content_type: ImageKind::Jpeg.mime_type(),
            source: ImageSource::Sibling,
        });
    }

    let temp_dir = create_temp_dir(work_dir)?;
    let target = temp_dir.path().join(&jpeg_name);
    info!("Converting {} → {}", input.display(), target.display());
    transcode::tiff_to_jpeg(input, &target).await?;

    Ok(ResolvedImage {
        path: target,
        file_name,
        content_type: ImageKind::Jpeg.mime_type(),
        source: ImageSource::Converted { temp_dir },
    })
}

fn create_temp_dir(work_dir: Option<&Path>) -> Result<TempDir, PeroError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_DIR_PREFIX);
    let result = match work_dir {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    };
    result.map_err(|e| PeroError::Internal(format!("Failed to create temporary directory: {e}")))
}
