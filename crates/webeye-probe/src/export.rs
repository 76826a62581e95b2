use std::path::Path;

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use webeye_core::{Frame, PixelFormat};

/// Converts a BGR(A) frame to RGBA, dropping row padding.
pub fn to_rgba(frame: &Frame) -> Result<RgbaImage> {
    let bytes_per_pixel = match frame.format {
        PixelFormat::Rgb24 => 3,
        PixelFormat::Rgb32 => 4,
        other => bail!("cannot export {other} frames"),
    };
    let mut rgba = Vec::with_capacity(frame.size().total_pixels() as usize * 4);
    for row in frame.rows() {
        for bgr in row.chunks_exact(bytes_per_pixel).take(frame.width as usize) {
            rgba.extend_from_slice(&[bgr[2], bgr[1], bgr[0], 0xFF]);
        }
    }
    RgbaImage::from_raw(frame.width, frame.height, rgba).context("frame does not match its dimensions")
}

pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    to_rgba(frame)?
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}
