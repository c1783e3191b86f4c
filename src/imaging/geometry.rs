//! Pure geometry resolution for resize policies.
//!
//! Given the source dimensions and a [`ResizeSpec`], [`resolve`] decides the
//! output canvas size, which part of the source to sample, where to paint it,
//! and whether the canvas gets a background fill. No pixels are touched here,
//! so every policy is unit testable without images.
//!
//! All rectangles live on the integer pixel grid. Scaled lengths are rounded
//! half away from zero and clamped to at least one pixel; centering offsets
//! use floor division. The same inputs always produce the same [`Geometry`].

use super::params::{Anchor, Background, HAlign, ResizeMode, ResizeSpec, SideOption, VAlign};

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Rectangle anchored at the origin.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Resolved drawing plan for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Region of the source image to sample.
    pub source: Rect,
    /// Region of the canvas the sampled pixels are scaled into.
    pub dest: Rect,
    /// Colour to fill the whole canvas with before painting, if any.
    pub fill: Option<Background>,
}

impl Geometry {
    /// Pass the image through unchanged.
    pub fn identity(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            canvas_width: width,
            canvas_height: height,
            source: Rect::sized(width, height),
            dest: Rect::sized(width, height),
            fill: None,
        }
    }

    /// Scale the whole source into a canvas of exactly `width`×`height`.
    fn scaled(source: (u32, u32), width: u32, height: u32) -> Self {
        Self {
            canvas_width: width,
            canvas_height: height,
            source: Rect::sized(source.0, source.1),
            dest: Rect::sized(width, height),
            fill: None,
        }
    }

    pub fn canvas(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    /// True when painting this geometry reproduces the source pixel for pixel.
    pub fn is_passthrough(&self, source: (u32, u32)) -> bool {
        *self == Self::identity(source.0, source.1)
    }
}

/// Resolve the drawing plan for a `source` of (width, height) under `spec`.
///
/// The `no_upscale` override runs after the mode's own math: when the source
/// already fits the target, the computed geometry is discarded in favour of
/// an identity passthrough with no background fill.
///
/// # Examples
/// ```
/// # use imgcommit::imaging::{ResizeSpec, TargetBox, ResizeMode, resolve};
/// let spec = ResizeSpec {
///     target: TargetBox::new(Some(800), None).unwrap(),
///     mode: ResizeMode::Fit,
///     no_upscale: false,
/// };
/// assert_eq!(resolve((4000, 2000), &spec).canvas(), (800, 400));
/// ```
pub fn resolve(source: (u32, u32), spec: &ResizeSpec) -> Geometry {
    let (w, h) = source;
    if w == 0 || h == 0 {
        return Geometry::identity(w, h);
    }

    let geometry = resolve_mode(source, spec);

    if spec.no_upscale && fits_target(source, spec) {
        return Geometry::identity(w, h);
    }
    geometry
}

fn resolve_mode(source: (u32, u32), spec: &ResizeSpec) -> Geometry {
    let (w, h) = source;
    let (tw, th) = (spec.target.width, spec.target.height);

    match spec.mode {
        ResizeMode::Stretch => Geometry::scaled(source, tw.unwrap_or(w), th.unwrap_or(h)),
        ResizeMode::Fit => match (tw, th) {
            (Some(tw), Some(th)) => {
                let scale = ratio(tw, w).min(ratio(th, h));
                Geometry::scaled(source, scale_len(w, scale), scale_len(h, scale))
            }
            (Some(tw), None) => Geometry::scaled(source, tw, scale_len(h, ratio(tw, w))),
            (None, Some(th)) => Geometry::scaled(source, scale_len(w, ratio(th, h)), th),
            (None, None) => Geometry::identity(w, h),
        },
        ResizeMode::Side(option) => match tw.or(th) {
            Some(target_side) => {
                let scale = ratio(target_side, reference_side(source, option));
                Geometry::scaled(source, scale_len(w, scale), scale_len(h, scale))
            }
            None => Geometry::identity(w, h),
        },
        ResizeMode::Pad {
            background,
            position,
        } => {
            if spec.target.is_unset() {
                return Geometry::identity(w, h);
            }
            let (tw, th) = (tw.unwrap_or(w), th.unwrap_or(h));
            let scale = ratio(tw, w).min(ratio(th, h));
            let dw = scale_len(w, scale).min(tw);
            let dh = scale_len(h, scale).min(th);
            let (dx, dy) = anchor_offset((tw, th), (dw, dh), position);
            Geometry {
                canvas_width: tw,
                canvas_height: th,
                source: Rect::sized(w, h),
                dest: Rect {
                    x: dx,
                    y: dy,
                    width: dw,
                    height: dh,
                },
                fill: Some(background),
            }
        }
        ResizeMode::Crop { position } => {
            let (Some(tw), Some(th)) = (tw, th) else {
                return Geometry::identity(w, h);
            };
            let scale = ratio(tw, w).max(ratio(th, h));
            let sw = unscale_len(tw, scale).min(w);
            let sh = unscale_len(th, scale).min(h);
            let (sx, sy) = anchor_offset((w, h), (sw, sh), position);
            Geometry {
                canvas_width: tw,
                canvas_height: th,
                source: Rect {
                    x: sx,
                    y: sy,
                    width: sw,
                    height: sh,
                },
                dest: Rect::sized(tw, th),
                fill: None,
            }
        }
    }
}

/// Whether the source already fits inside the target on every constrained axis.
///
/// For `side` the comparison uses the reference side the mode would scale by.
/// An unconstrained target never "fits", so the mode's own (identity) result stands.
pub fn fits_target(source: (u32, u32), spec: &ResizeSpec) -> bool {
    let (w, h) = source;
    let (tw, th) = (spec.target.width, spec.target.height);

    if let ResizeMode::Side(option) = spec.mode {
        return match tw.or(th) {
            Some(target_side) => reference_side(source, option) <= target_side,
            None => false,
        };
    }

    match (tw, th) {
        (Some(tw), Some(th)) => w <= tw && h <= th,
        (Some(tw), None) => w <= tw,
        (None, Some(th)) => h <= th,
        (None, None) => false,
    }
}

fn reference_side(source: (u32, u32), option: SideOption) -> u32 {
    let (w, h) = source;
    match option {
        SideOption::Longest => w.max(h),
        SideOption::Shortest => w.min(h),
        SideOption::Width => w,
        SideOption::Height => h,
    }
}

/// Offset that places `inner` inside `outer` according to `anchor`.
///
/// Shared by pad (placing the scaled image on the canvas) and crop (placing
/// the sample window on the source). `inner` never exceeds `outer` here, so
/// the result is always within bounds.
fn anchor_offset(outer: (u32, u32), inner: (u32, u32), anchor: Anchor) -> (u32, u32) {
    let free_x = outer.0.saturating_sub(inner.0);
    let free_y = outer.1.saturating_sub(inner.1);
    let (halign, valign) = anchor.align();

    let x = match halign {
        HAlign::Left => 0,
        HAlign::Center => free_x / 2,
        HAlign::Right => free_x,
    };
    let y = match valign {
        VAlign::Top => 0,
        VAlign::Center => free_y / 2,
        VAlign::Bottom => free_y,
    };
    (x, y)
}

fn ratio(target: u32, actual: u32) -> f64 {
    target as f64 / actual as f64
}

/// `len * scale`, rounded, never below one pixel.
fn scale_len(len: u32, scale: f64) -> u32 {
    ((len as f64 * scale).round() as u32).max(1)
}

/// `len / scale`, rounded, never below one pixel.
fn unscale_len(len: u32, scale: f64) -> u32 {
    ((len as f64 / scale).round() as u32).max(1)
}
