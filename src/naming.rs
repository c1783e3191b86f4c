//! File and path naming for uploads.
//!
//! Transformed images keep their base name and take the canonical extension
//! of the output format; the folder prefix turns that into a repository path:
//!
//! - `IMG_0042.jpeg` + webp → `IMG_0042.webp`
//! - `holiday.final.png` + jpg → `holiday.final.jpg`
//! - folder `images/blog/` + `IMG_0042.webp` → `images/blog/IMG_0042.webp`
//!
//! Repository paths never start or end with `/` and never contain empty segments.

use crate::imaging::OutputFormat;

/// Fallback stem when the hint carries no usable name.
const DEFAULT_STEM: &str = "image";

/// Derive the uploaded file name from a local name hint.
///
/// Any directory part of the hint is dropped, the last extension is replaced
/// with the format's canonical one. A leading dot is part of the stem, not an
/// extension.
pub fn output_file_name(hint: &str, format: OutputFormat) -> String {
    let base = hint.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    };
    let stem = if stem.is_empty() { DEFAULT_STEM } else { stem };
    format!("{}{}", stem, format.extension())
}

/// Normalize a repository path: forward slashes, no empty/leading/trailing segments.
pub fn normalize_path(path: &str) -> String {
    path.split(['/', '\\'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a folder and a file name into a repository path.
pub fn remote_path(folder: &str, file_name: &str) -> String {
    let folder = normalize_path(folder);
    if folder.is_empty() {
        normalize_path(file_name)
    } else {
        format!("{}/{}", folder, normalize_path(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_extension() {
        assert_eq!(output_file_name("IMG_0042.jpeg", OutputFormat::WebP), "IMG_0042.webp");
        assert_eq!(output_file_name("photo.PNG", OutputFormat::Jpeg), "photo.jpg");
    }

    #[test]
    fn keeps_inner_dots() {
        assert_eq!(
            output_file_name("holiday.final.png", OutputFormat::Jpeg),
            "holiday.final.jpg"
        );
    }

    #[test]
    fn adds_extension_when_missing() {
        assert_eq!(output_file_name("scan", OutputFormat::Png), "scan.png");
    }

    #[test]
    fn leading_dot_is_not_an_extension() {
        assert_eq!(output_file_name(".hidden", OutputFormat::Png), ".hidden.png");
    }

    #[test]
    fn drops_directories_from_hint() {
        assert_eq!(
            output_file_name("/home/me/Pictures/cat.jpg", OutputFormat::WebP),
            "cat.webp"
        );
        assert_eq!(
            output_file_name("C:\\Users\\me\\dog.bmp", OutputFormat::WebP),
            "dog.webp"
        );
    }

    #[test]
    fn empty_hint_uses_default_stem() {
        assert_eq!(output_file_name("", OutputFormat::WebP), "image.webp");
        assert_eq!(output_file_name("dir/", OutputFormat::WebP), "image.webp");
    }

    #[test]
    fn normalize_strips_extra_slashes() {
        assert_eq!(normalize_path("/images//blog/"), "images/blog");
        assert_eq!(normalize_path("./a/./b"), "a/b");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn remote_path_joins_folder() {
        assert_eq!(remote_path("images/", "a.webp"), "images/a.webp");
        assert_eq!(remote_path("/images/blog", "a.webp"), "images/blog/a.webp");
        assert_eq!(remote_path("", "a.webp"), "a.webp");
    }
}
