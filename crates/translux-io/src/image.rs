// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Image decoding for texture-space inputs and PNG export of frames.

use std::path::Path;
use thiserror::Error;

/// Errors raised while encoding images.
#[derive(Error, Debug)]
pub enum ImageIoError {
    #[error("Pixel buffer holds {actual} values, expected {expected} for {width}x{height} RGBA")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),
}

/// Decoded pixel storage. Always four channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePixels {
    /// 8-bit RGBA.
    Rgba8(Vec<u8>),
    /// 32-bit float RGBA.
    Rgba32F(Vec<f32>),
}

/// An image decoded to RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major pixels, top row first unless decoded with `flip`.
    pub pixels: ImagePixels,
}

impl DecodedImage {
    /// Pixels as linear `[f32; 4]`, 8-bit channels scaled to `[0, 1]`.
    pub fn to_rgba_f32(&self) -> Vec<[f32; 4]> {
        match &self.pixels {
            ImagePixels::Rgba8(bytes) => bytes
                .chunks_exact(4)
                .map(|p| {
                    [
                        p[0] as f32 / 255.0,
                        p[1] as f32 / 255.0,
                        p[2] as f32 / 255.0,
                        p[3] as f32 / 255.0,
                    ]
                })
                .collect(),
            ImagePixels::Rgba32F(values) => values
                .chunks_exact(4)
                .map(|p| [p[0], p[1], p[2], p[3]])
                .collect(),
        }
    }

    /// Nearest-neighbour resample to `width x height` as linear RGBA.
    pub fn resample_rgba_f32(&self, width: u32, height: u32) -> Vec<[f32; 4]> {
        let source = self.to_rgba_f32();
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height.max(1) as u64) as usize;
            for x in 0..width {
                let sx = (x as u64 * self.width as u64 / width.max(1) as u64) as usize;
                out.push(source[sy * self.width as usize + sx]);
            }
        }
        out
    }
}

/// Decodes the image at `path` to four channels.
///
/// `flip` flips it vertically (bottom row first); `float_format` decodes to
/// 32-bit floats instead of 8-bit channels. Failures are logged and yield
/// `None` so callers can fall back to default data.
pub fn decode_image(path: impl AsRef<Path>, flip: bool, float_format: bool) -> Option<DecodedImage> {
    let path = path.as_ref();
    let img = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Failed to load image {}: {}", path.display(), e);
            return None;
        }
    };
    let img = if flip { img.flipv() } else { img };
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        log::warn!("Image {} is empty", path.display());
        return None;
    }

    let pixels = if float_format {
        ImagePixels::Rgba32F(img.to_rgba32f().into_raw())
    } else {
        ImagePixels::Rgba8(img.to_rgba8().into_raw())
    };
    log::debug!("Decoded image {} ({}x{})", path.display(), width, height);
    Some(DecodedImage {
        width,
        height,
        pixels,
    })
}

/// Saves linear RGBA floats as an 8-bit PNG, clamping to `[0, 1]`.
///
/// Row 0 of `pixels` becomes the top row of the file.
pub fn save_rgba_png(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
    pixels: &[[f32; 4]],
) -> Result<(), ImageIoError> {
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
        return Err(ImageIoError::SizeMismatch {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }
    let bytes: Vec<u8> = pixels
        .iter()
        .flat_map(|p| p.map(|c| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8))
        .collect();
    image::save_buffer(
        path.as_ref(),
        &bytes,
        width,
        height,
        image::ExtendedColorType::Rgba8,
    )?;
    log::info!("Saved {}x{} image to {}", width, height, path.as_ref().display());
    Ok(())
}
