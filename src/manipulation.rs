//! Manipulation groups and sequences.
//!
//! A [`ManipulationGroup`] is one atomic call to the image engine: an ordered
//! mapping from abstract operation name (`width`, `blur`, `watermark`, ...) to
//! its argument. A [`ManipulationSequence`] is the ordered list of groups a
//! caller wants applied; each group compounds on the output of the previous
//! one, so order is meaningful and never changed.
//!
//! Sequences are normally built by a higher-level DSL. For the CLI they can
//! also be loaded from a JSON array of objects, key order preserved:
//!
//! ```text
//! [
//!   {"width": 100, "height": 100, "crop": "crop"},
//!   {"blur": 5}
//! ]
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Argument of a single manipulation.
///
/// Untagged so JSON numbers land in `Integer`/`Float` and JSON strings in
/// `Text`. `Path` is only ever constructed programmatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Integer(i64),
    Float(f64),
    Text(String),
    Path(PathBuf),
}

impl Argument {
    /// The argument interpreted as a filesystem path, if it is textual.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Argument::Text(s) => Some(Path::new(s)),
            Argument::Path(p) => Some(p),
            Argument::Integer(_) | Argument::Float(_) => None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Integer(n) => write!(f, "{n}"),
            Argument::Float(n) => write!(f, "{n}"),
            Argument::Text(s) => f.write_str(s),
            Argument::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Integer(value)
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Integer(i64::from(value))
    }
}

impl From<u32> for Argument {
    fn from(value: u32) -> Self {
        Argument::Integer(i64::from(value))
    }
}

impl From<f64> for Argument {
    fn from(value: f64) -> Self {
        Argument::Float(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Text(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Text(value)
    }
}

impl From<PathBuf> for Argument {
    fn from(value: PathBuf) -> Self {
        Argument::Path(value)
    }
}

/// One atomic set of named operations, submitted as a single engine call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManipulationGroup {
    entries: IndexMap<String, Argument>,
}

impl ManipulationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, keeping first-insertion order.
    pub fn with(mut self, name: impl Into<String>, argument: impl Into<Argument>) -> Self {
        self.insert(name, argument);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, argument: impl Into<Argument>) {
        self.entries.insert(name.into(), argument.into());
    }

    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, A: Into<Argument>> FromIterator<(K, A)> for ManipulationGroup {
    fn from_iter<I: IntoIterator<Item = (K, A)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, a)| (k.into(), a.into()))
                .collect(),
        }
    }
}

/// Ordered list of manipulation groups, processed strictly in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManipulationSequence {
    groups: Vec<ManipulationGroup>,
}

impl ManipulationSequence {
    pub fn new(groups: Vec<ManipulationGroup>) -> Self {
        Self { groups }
    }

    pub fn push(&mut self, group: ManipulationGroup) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[ManipulationGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Parse a sequence from a JSON array of objects.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a sequence from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SequenceError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

impl From<Vec<ManipulationGroup>> for ManipulationSequence {
    fn from(groups: Vec<ManipulationGroup>) -> Self {
        Self::new(groups)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SequenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid sequence JSON: {0}")]
    Json(#[from] serde_json::Error),
}
