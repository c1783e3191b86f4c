//! Image processing on the `image` crate, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` (content sniffing) |
//! | **Geometry** | [`resolve`]: pure per-mode math |
//! | **Resample** | `imageops::resize` with Lanczos3 |
//! | **Encode** | WebP (lossless), JPEG (quality), PNG |
//!
//! The module is split into:
//! - **Parameters**: what the caller asks for ([`ResizeSpec`], [`TransformSpec`])
//! - **Geometry**: pure functions from dimensions + spec to a drawing plan
//! - **Transform**: the pixel work (decode, paint, encode)
//! - **Operations**: bytes in, named upload-ready file out

pub mod geometry;
pub mod operations;
mod params;
pub mod transform;

pub use geometry::{Geometry, Rect, fits_target, resolve};
pub use operations::{EncodedImage, plan, prepare_upload};
pub use params::{
    Anchor, Background, HAlign, MAX_DIMENSION, OutputFormat, ParamError, Quality, ResizeMode,
    ResizeSpec, SideOption, TargetBox, TransformSpec, VAlign,
};
pub use transform::{ImageSource, TransformError};
