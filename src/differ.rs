//! Pixel differ.
//!
//! The dissimilarity score is the mean absolute per-channel RGBA delta,
//! normalized to `[0, 1]`: `sum(|a - b|) / (width * height * 4 * 255)`.
//! Growing the set of differing pixels never lowers the score, and identical
//! images always score exactly zero.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::{ReportError, Result};
use crate::model::DiffStats;

/// Output of one successful comparison.
#[derive(Debug, Clone)]
pub struct ImageDiff {
    pub score: f64,
    pub stats: DiffStats,
    pub diff_image: RgbaImage,
}

/// Decodes an artifact into RGBA8.
pub fn load_rgba8(path: &Path) -> Result<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| ReportError::ArtifactDecode {
            path: path.to_path_buf(),
            source,
        })
}

/// Compares `source` against `reference`.
pub fn diff(source: &RgbaImage, reference: &RgbaImage) -> Result<ImageDiff> {
    if source.dimensions() != reference.dimensions() {
        return Err(ReportError::DimensionMismatch {
            source_dims: source.dimensions(),
            reference_dims: reference.dimensions(),
        });
    }

    let (width, height) = source.dimensions();
    let total_pixels = u64::from(width) * u64::from(height);
    let mut diff_image = RgbaImage::new(width, height);

    let mut delta_sum: u64 = 0;
    let mut different_pixels: u64 = 0;
    let mut max_channel_delta: u8 = 0;

    for ((x, y, sp), rp) in source.enumerate_pixels().zip(reference.pixels()) {
        let mut pixel_max = 0u8;
        for c in 0..4 {
            let d = sp.0[c].abs_diff(rp.0[c]);
            delta_sum += u64::from(d);
            pixel_max = pixel_max.max(d);
        }
        max_channel_delta = max_channel_delta.max(pixel_max);

        let out = if pixel_max == 0 {
            context_pixel(sp)
        } else {
            different_pixels += 1;
            Rgba([255, 255 - pixel_max, 0, 255])
        };
        diff_image.put_pixel(x, y, out);
    }

    let score = if total_pixels == 0 {
        0.0
    } else {
        delta_sum as f64 / (total_pixels as f64 * 4.0 * 255.0)
    };

    Ok(ImageDiff {
        score,
        stats: DiffStats {
            total_pixels,
            different_pixels,
            max_channel_delta,
        },
        diff_image,
    })
}

/// Darkened luminance of an unchanged pixel, so changes stand out.
fn context_pixel(p: &Rgba<u8>) -> Rgba<u8> {
    let luma =
        (2126 * u32::from(p.0[0]) + 7152 * u32::from(p.0[1]) + 722 * u32::from(p.0[2])) / 10_000;
    let v = (luma / 4) as u8;
    Rgba([v, v, v, 255])
}

/// Encodes the diff image as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

/// Writes the diff image to `path`, creating parent directories.
pub fn persist(diff: &ImageDiff, path: &Path) -> Result<()> {
    let bytes = encode_png(&diff.diff_image).map_err(|e| ReportError::output_write(path, e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ReportError::output_write(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| ReportError::output_write(path, e))
}
