//! TIFF → JPEG conversion for inputs that have no pre-made JPEG sibling.
//!
//! Decoding a large scan is CPU-bound, so the work runs in
//! `spawn_blocking` to keep the runtime thread free.

use crate::error::PeroError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// JPEG quality used for converted scans.
pub const JPEG_QUALITY: u8 = 50;

/// Convert `source` into a JPEG at `target`.
pub async fn tiff_to_jpeg(source: &Path, target: &Path) -> Result<(), PeroError> {
    let source = source.to_path_buf();
    let target = target.to_path_buf();
    let err_path = source.clone();

    tokio::task::spawn_blocking(move || tiff_to_jpeg_blocking(&source, &target))
        .await
        .map_err(|e| PeroError::ConversionFailed {
            path: err_path,
            detail: format!("conversion task panicked: {e}"),
        })?
}

/// Blocking implementation of [`tiff_to_jpeg`].
fn tiff_to_jpeg_blocking(source: &Path, target: &Path) -> Result<(), PeroError> {
    let fail = |detail: String| PeroError::ConversionFailed {
        path: source.to_path_buf(),
        detail,
    };

    let img = ImageReader::open(source)
        .map_err(|e| fail(format!("cannot open: {e}")))?
        .with_guessed_format()
        .map_err(|e| fail(format!("cannot read header: {e}")))?
        .decode()
        .map_err(|e| fail(format!("cannot decode: {e}")))?;

    let out = File::create(target).map_err(|e| fail(format!("cannot create {}: {e}", target.display())))?;
    let mut writer = BufWriter::new(out);
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);

    jpeg_compatible(img)
        .write_with_encoder(encoder)
        .map_err(|e| fail(format!("cannot encode JPEG: {e}")))?;
    writer
        .flush()
        .map_err(|e| fail(format!("cannot write {}: {e}", target.display())))?;

    debug!("Converted {} → {}", source.display(), target.display());
    Ok(())
}

/// JPEG has no alpha channel and no 16-bit samples: grayscale stays
/// grayscale, everything else becomes 8-bit RGB.
fn jpeg_compatible(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            DynamicImage::ImageLuma8(img.to_luma8())
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// File name of the JPEG produced for `tiff` (`scan.tiff` → `scan.jpg`).
pub fn jpeg_name_for(tiff: &Path) -> Option<PathBuf> {
    tiff.file_stem().map(|stem| {
        let mut name = stem.to_os_string();
        name.push(".jpg");
        PathBuf::from(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn jpeg_name_replaces_extension() {
        assert_eq!(
            jpeg_name_for(Path::new("/scans/page_01.tiff")),
            Some(PathBuf::from("page_01.jpg"))
        );
        assert_eq!(
            jpeg_name_for(Path::new("page.tif")),
            Some(PathBuf::from("page.jpg"))
        );
    }

    #[test]
    fn alpha_is_dropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 128])));
        assert!(matches!(jpeg_compatible(img), DynamicImage::ImageRgb8(_)));
    }

    #[tokio::test]
    async fn converts_rgba_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("scan.tiff");
        let dst = dir.path().join("scan.jpg");
        RgbaImage::from_pixel(16, 8, Rgba([200, 10, 10, 255]))
            .save(&src)
            .unwrap();

        tiff_to_jpeg(&src, &dst).await.unwrap();

        let decoded = image::open(&dst).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[tokio::test]
    async fn bad_tiff_is_conversion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.tif");
        std::fs::write(&src, b"definitely not a tiff").unwrap();

        let err = tiff_to_jpeg(&src, &dir.path().join("broken.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, PeroError::ConversionFailed { .. }));
    }
}
