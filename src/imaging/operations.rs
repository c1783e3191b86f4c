//! High-level image operations.
//!
//! These functions combine geometry resolution with the transform engine and
//! output naming: bytes and a name hint in, an upload-ready file out.

use super::geometry::{Geometry, resolve};
use super::params::TransformSpec;
use super::transform::{ImageSource, TransformError, transform};
use crate::naming::output_file_name;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// An encoded image ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// File name with the output format's extension.
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Natural dimensions of the decoded source.
    pub source_dimensions: (u32, u32),
    pub geometry: Geometry,
}

impl EncodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.geometry.canvas()
    }
}

/// Decode, resize and encode one image according to `spec`.
pub fn prepare_upload(bytes: &[u8], name_hint: &str, spec: &TransformSpec) -> Result<EncodedImage> {
    let source = ImageSource::decode(bytes)?;
    let source_dimensions = source.dimensions();
    let geometry = resolve(source_dimensions, &spec.resize);

    tracing::debug!(
        name = name_hint,
        mode = spec.resize.mode.name(),
        from = ?source_dimensions,
        to = ?geometry.canvas(),
        "transforming image"
    );

    let encoded = transform(&source, &geometry, spec.format, spec.quality)?;
    Ok(EncodedImage {
        file_name: output_file_name(name_hint, spec.format),
        bytes: encoded,
        source_dimensions,
        geometry,
    })
}

/// Resolve the geometry an image of `dimensions` would get, without pixels.
pub fn plan(dimensions: (u32, u32), spec: &TransformSpec) -> Geometry {
    resolve(dimensions, &spec.resize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{
        Anchor, OutputFormat, Quality, ResizeMode, ResizeSpec, TargetBox,
    };
    use image::{ImageEncoder, RgbImage};

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    fn spec(mode: ResizeMode, w: u32, h: u32, format: OutputFormat) -> TransformSpec {
        TransformSpec {
            resize: ResizeSpec {
                target: TargetBox::new(Some(w), Some(h)).unwrap(),
                mode,
                no_upscale: false,
            },
            format,
            quality: Quality::new(85),
        }
    }

    #[test]
    fn prepare_upload_resizes_and_renames() {
        let bytes = jpeg_bytes(400, 200);
        let encoded = prepare_upload(
            &bytes,
            "holiday.jpg",
            &spec(ResizeMode::Fit, 100, 100, OutputFormat::WebP),
        )
        .unwrap();

        assert_eq!(encoded.file_name, "holiday.webp");
        assert_eq!(encoded.source_dimensions, (400, 200));
        assert_eq!(encoded.dimensions(), (100, 50));

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn prepare_upload_crop_output_matches_target() {
        let bytes = jpeg_bytes(320, 180);
        let encoded = prepare_upload(
            &bytes,
            "wide.jpg",
            &spec(
                ResizeMode::Crop {
                    position: Anchor::Center,
                },
                64,
                64,
                OutputFormat::Png,
            ),
        )
        .unwrap();

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
        assert_eq!(encoded.file_name, "wide.png");
    }

    #[test]
    fn prepare_upload_rejects_non_image() {
        let result = prepare_upload(
            b"%PDF-1.7",
            "doc.pdf",
            &spec(ResizeMode::Fit, 10, 10, OutputFormat::Png),
        );
        assert!(matches!(result, Err(TransformError::Decode(_))));
    }

    #[test]
    fn plan_matches_prepare_geometry() {
        let s = spec(ResizeMode::Stretch, 90, 30, OutputFormat::Jpeg);
        let bytes = jpeg_bytes(60, 60);
        let encoded = prepare_upload(&bytes, "sq.jpg", &s).unwrap();
        assert_eq!(plan((60, 60), &s), encoded.geometry);
    }
}
