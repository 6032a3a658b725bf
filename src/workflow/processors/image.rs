//! Image codec - the pure bytes-in, bytes/descriptor-out primitives
//!
//! Includes:
//! - Image decoding with format sniffing
//! - Fixed-frame normalization (crop to fill, source format preserved)
//! - Blur hash placeholder computation

use anyhow::{Context, Result, anyhow, bail};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::common::{BLURHASH_COMPONENTS, NORMALIZED_HEIGHT, NORMALIZED_WIDTH};

/// Decode/resize/encode primitives the transform worker is built on.
pub trait ImageCodec: Send + Sync {
    /// Re-encodes `bytes` at exactly the configured frame, in the source format.
    fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>>;

    /// Computes the placeholder descriptor for `bytes`.
    fn placeholder(&self, bytes: &[u8]) -> Result<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct ImageCrateCodec {
    pub width: u32,
    pub height: u32,
    pub components: (u32, u32),
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self {
            width: NORMALIZED_WIDTH,
            height: NORMALIZED_HEIGHT,
            components: BLURHASH_COMPONENTS,
        }
    }
}

impl ImageCodec for ImageCrateCodec {
    fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let (dynamic_image, format) = generate_dynamic_image(bytes)?;
        let resized = dynamic_image.resize_to_fill(self.width, self.height, FilterType::Lanczos3);
        encode_image(resized, format)
    }

    fn placeholder(&self, bytes: &[u8]) -> Result<String> {
        let (dynamic_image, _) = generate_dynamic_image(bytes)?;
        // Fit inside the frame, no cropping.
        let resized = dynamic_image.resize(self.width, self.height, FilterType::Triangle);
        generate_blurhash(&resized, self.components)
    }
}

// ────────────────────────────────────────────────────────────────
// DynamicImage Generation
// ────────────────────────────────────────────────────────────────

pub fn generate_dynamic_image(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
    let format = image::guess_format(bytes).context("unrecognized image format")?;

    let decoders: Vec<fn(&[u8], ImageFormat) -> Result<DynamicImage>> = vec![image_crate_decoder];

    let mut last_error = None;
    for decoder in decoders {
        match decoder(bytes, format) {
            Ok(decoded_image) => return Ok((decoded_image, format)),
            Err(err) => last_error = Some(err),
        }
    }

    let summary = format!("all decoders failed for {:?} input of {} bytes", format, bytes.len());
    match last_error {
        Some(err) => Err(err.context(summary)),
        None => bail!(summary),
    }
}

fn image_crate_decoder(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage> {
    let dynamic_image = image::load_from_memory_with_format(bytes, format)
        .context("image crate failed to decode image from memory")?;
    Ok(dynamic_image)
}

// ────────────────────────────────────────────────────────────────
// Encoding
// ────────────────────────────────────────────────────────────────

pub fn encode_image(dynamic_image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let dynamic_image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(dynamic_image.to_rgb8()),
        _ => dynamic_image,
    };
    let mut buffer = Cursor::new(Vec::new());
    dynamic_image
        .write_to(&mut buffer, format)
        .with_context(|| format!("failed to encode image as {:?}", format))?;
    Ok(buffer.into_inner())
}

// ────────────────────────────────────────────────────────────────
// Placeholder
// ────────────────────────────────────────────────────────────────

pub fn generate_blurhash(dynamic_image: &DynamicImage, components: (u32, u32)) -> Result<String> {
    let rgba_image = dynamic_image.to_rgba8();
    let (width, height) = (rgba_image.width(), rgba_image.height());
    blurhash::encode(components.0, components.1, width, height, rgba_image.as_raw())
        .map_err(|err| anyhow!("blurhash encoding failed: {:?}", err))
}
