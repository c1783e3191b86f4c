//! CLI output formatting.
//!
//! # Progress log
//!
//! A batch commit reports [`CommitEvent`]s; each renders to one or more log
//! lines. The log is append-only and reads top to bottom as the batch runs:
//!
//! ```text
//! Fetching current branch info...
//!     Base commit: 3f1c9e…
//!     Base tree: 77ab02…
//! [1/2] Processing IMG_0042.jpg...
//!     Created blob 9d0e41… for images/IMG_0042.webp (800×533, 41.2 KB)
//! Deleting images/old.png
//! Creating new tree (3 changes)...
//!     New tree SHA: c4e8f0…
//! Creating commit...
//!     New commit SHA: 5b7d22…
//! Updating branch main...
//! ✓ Success! 3 changes committed to main (5b7d22…)
//! ```
//!
//! A failing batch ends with a single line prefixed `✗`, naming the stage and
//! carrying the remote's message when there is one.
//!
//! # Architecture
//!
//! Every `format_*` function returns `Vec<String>` and does no I/O, so output
//! is testable; `print_*` wrappers write to stdout.

use crate::commit::CommitEvent;
use crate::imaging::{Geometry, TransformSpec};
use crate::remote::FolderEntry;

pub const SUCCESS_PREFIX: &str = "✓ ";
pub const FAILURE_PREFIX: &str = "✗ ";

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte size: `512 B`, `41.2 KB`, `3.4 MB`.
pub fn format_file_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Commit progress
// ============================================================================

/// Format a single commit progress event as display lines.
pub fn format_commit_event(event: &CommitEvent) -> Vec<String> {
    match event {
        CommitEvent::ResolvingHead { .. } => vec!["Fetching current branch info...".into()],
        CommitEvent::HeadResolved { head } => vec![
            format!("{}Base commit: {}", indent(1), head.commit_sha),
            format!("{}Base tree: {}", indent(1), head.tree_sha),
        ],
        CommitEvent::ProcessingItem { index, total, name } => {
            vec![format!("[{}/{}] Processing {}...", index, total, name)]
        }
        CommitEvent::BlobCreated {
            path,
            sha,
            size,
            dimensions: (w, h),
        } => vec![format!(
            "{}Created blob {} for {} ({}×{}, {})",
            indent(1),
            sha,
            path,
            w,
            h,
            format_file_size(*size)
        )],
        CommitEvent::DeletionQueued { path } => vec![format!("Deleting {}", path)],
        CommitEvent::CreatingTree { changes } => {
            vec![format!("Creating new tree ({})...", plural(*changes, "change"))]
        }
        CommitEvent::TreeCreated { sha } => vec![format!("{}New tree SHA: {}", indent(1), sha)],
        CommitEvent::CreatingCommit => vec!["Creating commit...".into()],
        CommitEvent::CommitCreated { sha } => {
            vec![format!("{}New commit SHA: {}", indent(1), sha)]
        }
        CommitEvent::UpdatingRef { branch } => vec![format!("Updating branch {}...", branch)],
        CommitEvent::RefUpdated {
            branch,
            commit,
            changes,
        } => vec![format!(
            "{}Success! {} committed to {} ({})",
            SUCCESS_PREFIX,
            plural(*changes, "change"),
            branch,
            commit
        )],
        CommitEvent::NothingToCommit => {
            vec![format!("{}Nothing to commit: no items selected", SUCCESS_PREFIX)]
        }
        CommitEvent::Failed {
            stage,
            message,
            retryable,
        } => {
            let mut lines = vec![format!(
                "{}Error during {}: {}",
                FAILURE_PREFIX, stage, message
            )];
            if *retryable {
                lines.push(format!(
                    "{}The branch moved while committing; run the batch again.",
                    indent(1)
                ));
            }
            lines
        }
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

// ============================================================================
// Folder listing
// ============================================================================

/// Format a folder listing, one file per line with its download URL beneath.
pub fn format_folder_listing(folder: &str, entries: &[FolderEntry]) -> Vec<String> {
    let shown = if folder.is_empty() { "/" } else { folder };
    if entries.is_empty() {
        return vec![format!("{} (empty)", shown)];
    }
    let mut lines = vec![format!("{} ({})", shown, plural(entries.len(), "file"))];
    for entry in entries {
        lines.push(format!("{}{}", indent(1), entry.path));
        if let Some(url) = &entry.download_url {
            lines.push(format!("{}{}", indent(2), url));
        }
    }
    lines
}

pub fn print_folder_listing(folder: &str, entries: &[FolderEntry]) {
    for line in format_folder_listing(folder, entries) {
        println!("{}", line);
    }
}

// ============================================================================
// Geometry plan
// ============================================================================

/// Describe what a transform would do to an image without running it.
///
/// ```text
/// photo.jpg 4000×2000 → 800×400 (fit, webp)
///     Source: 4000×2000 at (0, 0)
///     Dest: 800×400 at (0, 0)
/// ```
pub fn format_plan(
    name: &str,
    source: (u32, u32),
    spec: &TransformSpec,
    geometry: &Geometry,
) -> Vec<String> {
    let (cw, ch) = geometry.canvas();
    let mut lines = vec![format!(
        "{} {}×{} → {}×{} ({}, {})",
        name,
        source.0,
        source.1,
        cw,
        ch,
        spec.resize.mode.name(),
        spec.format
    )];
    if geometry.is_passthrough(source) {
        lines.push(format!("{}unchanged", indent(1)));
        return lines;
    }
    let s = geometry.source;
    let d = geometry.dest;
    lines.push(format!(
        "{}Source: {}×{} at ({}, {})",
        indent(1),
        s.width,
        s.height,
        s.x,
        s.y
    ));
    lines.push(format!(
        "{}Dest: {}×{} at ({}, {})",
        indent(1),
        d.width,
        d.height,
        d.x,
        d.y
    ));
    if let Some(fill) = geometry.fill {
        lines.push(format!("{}Fill: {}", indent(1), fill));
    }
    lines
}

pub fn print_plan(name: &str, source: (u32, u32), spec: &TransformSpec, geometry: &Geometry) {
    for line in format_plan(name, source, spec, geometry) {
        println!("{}", line);
    }
}
