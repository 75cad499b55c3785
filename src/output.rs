//! CLI output formatting for all pipeline surfaces.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every entity (engine, item, derivative) is its semantic identity —
//! name and positional index — with filesystem paths shown as secondary
//! context via indented lines. This makes the output readable as an
//! inventory while still letting users trace data back to specific files.
//!
//! # Output Format
//!
//! ## Engines
//!
//! ```text
//! Engines
//! 001 native (available)
//!     Version: image 0.25
//!     Writes: avif, webp
//!     Reads: image/jpeg, image/png, ...
//! 002 magick (unavailable)
//! ```
//!
//! ## Convert
//!
//! ```text
//! dawn.jpg → dawn.webp
//!     182.4 KiB written
//!     thumbnail: dawn-150x150-c.webp (150x150)
//!     medium: dawn-300x225.webp (300x225)
//! ```
//!
//! ## Batch
//!
//! ```text
//! convert: chunk at offset 30 (limit 15)
//!     item 34: source file exceeds size ceiling
//!     37/37 processed
//! convert finished: 37/37 processed, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each surface has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::batch::ProgressEvent;
use crate::convert::ConversionOutcome;
use crate::engine::EngineInfo;
use crate::store::{Item, ItemId};
use crate::thumbs::Derivative;
use std::path::Path;
use std::sync::mpsc::Receiver;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count: `512 B`, `14.2 KiB`, `1.8 MiB`.
fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

/// Comma-join an iterator of displayable values, `-` when empty.
fn join_or_dash<T: std::fmt::Display>(values: impl Iterator<Item = T>) -> String {
    let joined: Vec<String> = values.map(|v| v.to_string()).collect();
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined.join(", ")
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Engine report
// ============================================================================

/// Format the engine capability report from probe results.
///
/// Information-first: each engine leads with its positional index and name;
/// version and capabilities are indented context lines. Unavailable engines
/// get the header line only.
pub fn format_engine_report<'a>(infos: impl Iterator<Item = &'a EngineInfo>) -> Vec<String> {
    let mut lines = vec!["Engines".to_string()];
    let mut any = false;

    for (i, info) in infos.enumerate() {
        any = true;
        let status = if info.available {
            "available"
        } else {
            "unavailable"
        };
        lines.push(format!("{} {} ({})", format_index(i + 1), info.name, status));
        if !info.available {
            continue;
        }
        if let Some(version) = &info.version {
            lines.push(format!("    Version: {version}"));
        }
        lines.push(format!(
            "    Writes: {}",
            join_or_dash(info.writes.iter().map(|f| f.as_str()))
        ));
        lines.push(format!(
            "    Reads: {}",
            join_or_dash(info.reads.iter())
        ));
    }

    if !any {
        lines.push("    (none)".to_string());
    }
    lines
}

pub fn print_engine_report<'a>(infos: impl Iterator<Item = &'a EngineInfo>) {
    for line in format_engine_report(infos) {
        println!("{}", line);
    }
}

// ============================================================================
// Single conversion
// ============================================================================

/// Format one conversion outcome: `source → dest` plus status context.
pub fn format_conversion_outcome(
    source: &Path,
    dest: &Path,
    outcome: &ConversionOutcome,
) -> Vec<String> {
    let header = format!("{} \u{2192} {}", file_name_of(source), file_name_of(dest));
    match outcome {
        ConversionOutcome::Success { bytes_written } => {
            vec![header, format!("    {} written", human_bytes(*bytes_written))]
        }
        ConversionOutcome::Failure { reason } => {
            vec![header, format!("    failed: {reason} [{}]", reason.code())]
        }
    }
}

pub fn print_conversion_outcome(source: &Path, dest: &Path, outcome: &ConversionOutcome) {
    for line in format_conversion_outcome(source, dest, outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Derivatives
// ============================================================================

/// Format generated derivatives as indented `profile: file (WxH)` lines.
pub fn format_derivatives<'a>(derivatives: impl Iterator<Item = &'a Derivative>) -> Vec<String> {
    derivatives
        .map(|d| {
            format!(
                "    {}: {} ({}x{})",
                d.profile, d.file, d.width, d.height
            )
        })
        .collect()
}

pub fn print_derivatives<'a>(derivatives: impl Iterator<Item = &'a Derivative>) {
    for line in format_derivatives(derivatives) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch progress
// ============================================================================

/// Format a single batch progress event as display lines.
///
/// Chunk boundaries print at the left margin, per-item failures and running
/// counts as indented context.
pub fn format_progress_event(event: &ProgressEvent) -> Vec<String> {
    match event {
        ProgressEvent::ChunkStarted {
            kind,
            offset,
            limit,
        } => {
            vec![format!("{kind}: chunk at offset {offset} (limit {limit})")]
        }
        ProgressEvent::ItemFailed { id, message } => {
            vec![format!("    item {id}: {message}")]
        }
        ProgressEvent::ChunkFinished {
            processed, total, ..
        } => {
            vec![format!("    {processed}/{total} processed")]
        }
        ProgressEvent::RunFinished {
            kind,
            processed,
            total,
            failed,
        } => {
            let mut line = format!("{kind} finished: {processed}/{total} processed");
            if *failed > 0 {
                line.push_str(&format!(", {failed} failed"));
            }
            vec![line]
        }
    }
}

/// Drain a progress channel to stdout until the sender hangs up. Intended to
/// run on a dedicated printer thread alongside a batch driver.
pub fn print_progress(events: Receiver<ProgressEvent>) {
    for event in events {
        for line in format_progress_event(&event) {
            println!("{}", line);
        }
    }
}

// ============================================================================
// Store listing
// ============================================================================

/// Format the store inventory: one entity per item, active file first, the
/// import-time original and derivative profiles as context lines.
pub fn format_store_listing<'a>(items: impl Iterator<Item = (ItemId, &'a Item)>) -> Vec<String> {
    let mut lines = Vec::new();
    for (id, item) in items {
        let meta = &item.metadata;
        let dims = if meta.width > 0 && meta.height > 0 {
            format!(", {}x{}", meta.width, meta.height)
        } else {
            String::new()
        };
        lines.push(format!(
            "{} {} ({}{})",
            format_index(id as usize),
            meta.file,
            meta.mime,
            dims
        ));
        if meta.file != item.original_path {
            lines.push(format!("    Original: {}", item.original_path));
        }
        if !meta.sizes.is_empty() {
            lines.push(format!(
                "    Sizes: {}",
                join_or_dash(meta.sizes.keys())
            ));
        }
    }
    if lines.is_empty() {
        lines.push("(empty store)".to_string());
    }
    lines
}

pub fn print_store_listing<'a>(items: impl Iterator<Item = (ItemId, &'a Item)>) {
    for line in format_store_listing(items) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
