//! CLI output formatting.
//!
//! # Output Format
//!
//! ## apply
//!
//! ```text
//! cat.jpg (2 groups)
//! 001/002 w=100&h=100&fit=crop
//!     Artifact: /tmp/3f0c…e1/cat.jpg
//! 002/002 blur=5
//!     Artifact: /tmp/9a4b…07/cat.jpg
//! Saved → out/cat.jpg
//! ```
//!
//! An empty sequence prints `Saved → out/cat.jpg (input copied unchanged)`.
//!
//! ## manipulations
//!
//! ```text
//! Manipulation        Engine key
//! width               w
//! …
//! optimize            (dropped)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability; most also have a `print_*` wrapper that writes to stdout.
//! Format functions are pure, with no I/O.

use crate::engine::query_string;
use crate::pipeline::PipelineEvent;
use crate::translate::Manipulation;
use std::path::Path;

/// Width of the name column in the manipulation table.
const NAME_COLUMN: usize = 20;

/// Format a 1-based position out of `total`, both 3-digit zero-padded.
fn format_position(index: usize, total: usize) -> String {
    format!("{:0>3}/{:0>3}", index + 1, total)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// apply
// ============================================================================

/// Header printed before a conversion starts.
pub fn format_conversion_header(input: &Path, groups: usize) -> Vec<String> {
    let name = input
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let noun = if groups == 1 { "group" } else { "groups" };
    vec![format!("{} ({} {})", name, groups, noun)]
}

/// Format a single pipeline progress event as display lines.
pub fn format_pipeline_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::GroupApplied {
            index,
            total,
            parameters,
            artifact,
        } => {
            let query = query_string(parameters);
            let query = if query.is_empty() {
                "(no parameters)".to_string()
            } else {
                query
            };
            vec![
                format!("{} {}", format_position(*index, *total), query),
                format!("{}Artifact: {}", indent(1), artifact.display()),
            ]
        }
        PipelineEvent::Published {
            destination,
            from_input,
        } => {
            let suffix = if *from_input {
                " (input copied unchanged)"
            } else {
                ""
            };
            vec![format!("Saved → {}{}", destination.display(), suffix)]
        }
    }
}

pub fn print_conversion_header(input: &Path, groups: usize) {
    for line in format_conversion_header(input, groups) {
        println!("{}", line);
    }
}

// ============================================================================
// manipulations
// ============================================================================

/// The translation table: every accepted name and the key the engine sees.
pub fn format_manipulation_table() -> Vec<String> {
    let mut lines = vec![format!(
        "{:<width$}{}",
        "Manipulation",
        "Engine key",
        width = NAME_COLUMN
    )];
    for manipulation in Manipulation::ALL {
        let key = manipulation.engine_key().unwrap_or("(dropped)");
        lines.push(format!(
            "{:<width$}{}",
            manipulation.name(),
            key,
            width = NAME_COLUMN
        ));
    }
    lines
}

pub fn print_manipulation_table() {
    for line in format_manipulation_table() {
        println!("{}", line);
    }
}
