//! Shared test utilities for the image-chain test suite.
//!
//! Helpers for laying out input files and intermediate artifacts inside a
//! `TempDir`, and for asserting on what a workspace contains afterwards.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let input = write_input(tmp.path(), "photos/cat.jpg", "cat");
//! // ... run a conversion with its workspace at tmp/work ...
//! assert!(workspace_files(&tmp.path().join("work")).is_empty());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_input(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Place a fake intermediate artifact at `workspace/relative`.
///
/// Same as [`write_input`]; the separate name keeps intent readable.
pub fn artifact_in(workspace: &Path, relative: &str, content: &str) -> PathBuf {
    write_input(workspace, relative, content)
}

// =========================================================================
// Workspace inspection
// =========================================================================

/// Every regular file below `dir`, sorted. Empty if `dir` does not exist.
pub fn workspace_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
