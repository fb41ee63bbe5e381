//! Errors surfaced by a conversion.
//!
//! Every failure aborts the public operation that raised it (`apply` or
//! `save`). Nothing is retried and nothing is silently ignored.

use crate::engine::EngineError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Why a workspace path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceProblem {
    NotCreatable,
    NotWritable,
}

impl fmt::Display for WorkspaceProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceProblem::NotCreatable => f.write_str("could not be created"),
            WorkspaceProblem::NotWritable => f.write_str("is not writable"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Temporary directory {} {problem}", path.display())]
    InvalidTemporaryDirectory {
        path: PathBuf,
        problem: WorkspaceProblem,
    },
    #[error("Unknown manipulation: {0}")]
    UnknownManipulation(String),
    #[error("IO error during {operation} of {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("Image engine failed: {0}")]
    Engine(#[from] EngineError),
    #[error("Input image not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("Engine reported artifact that does not exist: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("Workspace can no longer be changed (currently {})", .0.display())]
    WorkspaceLocked(PathBuf),
    #[error("Cannot {operation} while pipeline is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl ConversionError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        ConversionError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}
