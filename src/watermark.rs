//! Watermark path splitting.
//!
//! The engine resolves a watermark by bare filename inside a configured
//! search directory. A `watermark` argument given as a path is therefore split
//! in two: the directory becomes engine configuration and only the filename
//! stays in the group. This runs before translation.

use crate::manipulation::{Argument, ManipulationGroup};
use crate::translate::Manipulation;
use std::path::{Path, PathBuf};

/// Return a copy of `group` with the watermark reduced to its filename, plus
/// the directory the engine should search.
///
/// Groups without a watermark, or whose watermark is not a path, come back
/// unchanged with no directory. The caller's group is never modified.
pub fn extract_watermark(group: &ManipulationGroup) -> (ManipulationGroup, Option<PathBuf>) {
    let key = Manipulation::Watermark.name();
    let Some((directory, filename)) = group.get(key).and_then(split_watermark_path) else {
        return (group.clone(), None);
    };

    let mut stripped = group.clone();
    stripped.insert(key, Argument::Text(filename));
    (stripped, Some(directory))
}

fn split_watermark_path(argument: &Argument) -> Option<(PathBuf, String)> {
    let path = argument.as_path()?;
    let filename = path.file_name()?.to_string_lossy().into_owned();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((directory, filename))
}

/// Directory an input image's engine call should read from.
pub(crate) fn containing_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
