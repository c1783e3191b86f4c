//! Raster transform engine in pure Rust, no system libraries.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, TIFF, GIF, BMP) | `image::load_from_memory` |
//! | Sample window | `image::imageops::crop_imm` |
//! | Resample | `image::imageops::resize` with `Lanczos3` filter |
//! | Paint | `imageops::replace` (no fill) / `imageops::overlay` (over pad fill) |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` (alpha dropped) |
//! | Encode → PNG | `PngEncoder` (quality ignored) |
//! | Encode → WebP | `webp::Encoder::encode` (lossy, bundled libwebp) |

use super::geometry::Geometry;
use super::params::{OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use thiserror::Error;

/// Largest canvas the engine will allocate, in pixels.
pub const MAX_CANVAS_PIXELS: u64 = 16_384 * 16_384;

/// Resampling filter used for every scaled paint.
const FILTER: FilterType = FilterType::Lanczos3;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("not a decodable image: {0}")]
    Decode(String),
    #[error("encoding {format} failed: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
    #[error("canvas {width}x{height} exceeds the raster limit")]
    CanvasTooLarge { width: u32, height: u32 },
}

/// A decoded source image. Immutable once decoded.
#[derive(Debug, Clone)]
pub struct ImageSource {
    image: DynamicImage,
}

impl ImageSource {
    /// Decode raw file bytes, sniffing the format from the content.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransformError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| TransformError::Decode(e.to_string()))?;
        Ok(Self { image })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Natural (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Paint `source` onto a fresh canvas according to `geometry`.
pub fn render(source: &ImageSource, geometry: &Geometry) -> Result<RgbaImage, TransformError> {
    let (cw, ch) = geometry.canvas();
    if cw as u64 * ch as u64 > MAX_CANVAS_PIXELS {
        return Err(TransformError::CanvasTooLarge {
            width: cw,
            height: ch,
        });
    }

    let rgba = source.image.to_rgba8();
    if geometry.is_passthrough(source.dimensions()) {
        return Ok(rgba);
    }

    let src = geometry.source;
    let window = imageops::crop_imm(&rgba, src.x, src.y, src.width, src.height).to_image();
    let dest = geometry.dest;
    let painted = if window.dimensions() == (dest.width, dest.height) {
        window
    } else {
        imageops::resize(&window, dest.width, dest.height, FILTER)
    };

    let canvas = match geometry.fill {
        Some(background) => {
            let mut canvas = RgbaImage::from_pixel(cw, ch, Rgba(background.rgba()));
            imageops::overlay(&mut canvas, &painted, dest.x as i64, dest.y as i64);
            canvas
        }
        None => {
            let mut canvas = RgbaImage::new(cw, ch);
            imageops::replace(&mut canvas, &painted, dest.x as i64, dest.y as i64);
            canvas
        }
    };
    Ok(canvas)
}

/// Encode a canvas into `format`. `quality` only affects JPEG.
pub fn encode(
    canvas: &RgbaImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, TransformError> {
    let (width, height) = canvas.dimensions();
    let mut buf = Vec::new();
    let encode_err = |e: image::ImageError| TransformError::Encode {
        format,
        message: e.to_string(),
    };

    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel; transparent pixels keep their colour values.
            let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.value())
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(encode_err)?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut buf)
                .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(encode_err)?;
        }
        OutputFormat::WebP => {
            let encoded = webp::Encoder::from_rgba(canvas.as_raw(), width, height)
                .encode(f32::from(quality.value()));
            buf.extend_from_slice(&encoded);
        }
    }

    if buf.is_empty() {
        return Err(TransformError::Encode {
            format,
            message: "encoder produced no output".into(),
        });
    }
    Ok(buf)
}

/// Render and encode in one step.
pub fn transform(
    source: &ImageSource,
    geometry: &Geometry,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, TransformError> {
    let canvas = render(source, geometry)?;
    encode(&canvas, format, quality)
}
