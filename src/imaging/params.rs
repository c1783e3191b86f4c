//! Parameter types for image transforms.
//!
//! These types describe *what* output the caller wants, not *how* pixels get
//! there. The [`geometry`](super::geometry) resolver turns them into concrete
//! rectangles and the [`transform`](super::transform) engine does the pixel work.
//!
//! ## Types
//!
//! - [`TargetBox`]: Requested width/height, each independently optional.
//! - [`ResizeMode`]: One variant per resize policy, carrying only that policy's options.
//! - [`ResizeSpec`]: Target box + mode + the `no_upscale` override.
//! - [`Anchor`] / [`SideOption`] / [`Background`]: Mode-specific options.
//! - [`OutputFormat`] + [`Quality`]: Encoder selection.
//! - [`TransformSpec`]: Everything needed to turn one source into one encoded upload.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest accepted target dimension on either axis.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("target {axis} {value} exceeds the maximum of {MAX_DIMENSION}px")]
    TooLarge { axis: &'static str, value: u32 },
    #[error("unknown resize mode '{0}' (expected fit, stretch, side, pad or crop)")]
    UnknownMode(String),
    #[error("unknown side option '{0}' (expected longest, shortest, width or height)")]
    UnknownSide(String),
    #[error("unknown anchor '{0}'")]
    UnknownAnchor(String),
    #[error("invalid colour '{0}' (expected #rgb, #rrggbb or #rrggbbaa)")]
    InvalidColor(String),
    #[error("unsupported output format '{0}' (expected webp, jpg or png)")]
    UnknownFormat(String),
}

/// Requested output box. `None` on an axis means "not constrained".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetBox {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl TargetBox {
    /// Build a target box, treating `Some(0)` as unset.
    pub fn new(width: Option<u32>, height: Option<u32>) -> Result<Self, ParamError> {
        let width = width.filter(|&w| w > 0);
        let height = height.filter(|&h| h > 0);
        if let Some(w) = width.filter(|&w| w > MAX_DIMENSION) {
            return Err(ParamError::TooLarge {
                axis: "width",
                value: w,
            });
        }
        if let Some(h) = height.filter(|&h| h > MAX_DIMENSION) {
            return Err(ParamError::TooLarge {
                axis: "height",
                value: h,
            });
        }
        Ok(Self { width, height })
    }

    /// Unconstrained box: every mode passes the image through.
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn is_unset(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}

/// Reference side used by [`ResizeMode::Side`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideOption {
    #[default]
    Longest,
    Shortest,
    Width,
    Height,
}

impl FromStr for SideOption {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "longest" => Ok(Self::Longest),
            "shortest" => Ok(Self::Shortest),
            "width" => Ok(Self::Width),
            "height" => Ok(Self::Height),
            _ => Err(ParamError::UnknownSide(s.to_string())),
        }
    }
}

/// Horizontal placement resolved from an [`Anchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Vertical placement resolved from an [`Anchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// Where the image sits inside a pad canvas, or which part of it a crop keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    /// Split into independent horizontal and vertical alignment.
    ///
    /// Edge anchors pin one axis and center the other; corner anchors pin both.
    pub fn align(self) -> (HAlign, VAlign) {
        match self {
            Anchor::Center => (HAlign::Center, VAlign::Center),
            Anchor::Top => (HAlign::Center, VAlign::Top),
            Anchor::Bottom => (HAlign::Center, VAlign::Bottom),
            Anchor::Left => (HAlign::Left, VAlign::Center),
            Anchor::Right => (HAlign::Right, VAlign::Center),
            Anchor::TopLeft => (HAlign::Left, VAlign::Top),
            Anchor::TopRight => (HAlign::Right, VAlign::Top),
            Anchor::BottomLeft => (HAlign::Left, VAlign::Bottom),
            Anchor::BottomRight => (HAlign::Right, VAlign::Bottom),
        }
    }
}

impl FromStr for Anchor {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "" | "center" | "centre" => Ok(Self::Center),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            _ => Err(ParamError::UnknownAnchor(s.to_string())),
        }
    }
}

/// Pad fill colour as straight (non-premultiplied) RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 4]);

impl Background {
    pub fn white() -> Self {
        Self([255, 255, 255, 255])
    }

    pub fn rgba(self) -> [u8; 4] {
        self.0
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::white()
    }
}

impl FromStr for Background {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParamError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let nibble = |i: usize| {
            u8::from_str_radix(&hex[i..i + 1], 16)
                .map(|n| n * 17)
                .map_err(|_| invalid())
        };
        match hex.len() {
            3 => Ok(Self([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
            6 => Ok(Self([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Ok(Self([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

/// Resize policy. Each variant carries only the options that policy reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Preserve aspect ratio inside the target box.
    #[default]
    Fit,
    /// Fill the target box exactly, ignoring aspect ratio.
    Stretch,
    /// Scale so one reference side matches the single target value.
    Side(SideOption),
    /// Fit inside the box, then fill the rest of the box with `background`.
    Pad {
        background: Background,
        position: Anchor,
    },
    /// Cover the box, then cut away the overflow around `position`.
    Crop { position: Anchor },
}

impl ResizeMode {
    pub fn name(&self) -> &'static str {
        match self {
            ResizeMode::Fit => "fit",
            ResizeMode::Stretch => "stretch",
            ResizeMode::Side(_) => "side",
            ResizeMode::Pad { .. } => "pad",
            ResizeMode::Crop { .. } => "crop",
        }
    }

    /// Build a mode from its name plus the option pool a form or config file provides.
    ///
    /// Options that do not belong to the named mode are ignored.
    pub fn from_parts(
        name: &str,
        side: SideOption,
        background: Background,
        position: Anchor,
    ) -> Result<Self, ParamError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "fit" => Ok(Self::Fit),
            "stretch" => Ok(Self::Stretch),
            "side" => Ok(Self::Side(side)),
            "pad" => Ok(Self::Pad {
                background,
                position,
            }),
            "crop" => Ok(Self::Crop { position }),
            _ => Err(ParamError::UnknownMode(name.to_string())),
        }
    }
}

/// Full resize request for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeSpec {
    pub target: TargetBox,
    pub mode: ResizeMode,
    /// Leave images that already fit the target untouched.
    pub no_upscale: bool,
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Canonical file extension, including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::WebP => ".webp",
            OutputFormat::Jpeg => ".jpg",
            OutputFormat::Png => ".png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::WebP),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            _ => Err(ParamError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension()[1..])
    }
}

/// Quality setting for lossy image encoding (1-100; 0 is raised to 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Everything needed to turn one source image into one encoded upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformSpec {
    pub resize: ResizeSpec,
    pub format: OutputFormat,
    pub quality: Quality,
}
