//! Image engine trait and shared types.
//!
//! The [`ImageEngine`] trait is the one seam between the conversion pipeline
//! and whatever actually touches pixels. A call receives an [`EngineConfig`]
//! (where to read, where to write, which backend, where watermarks live), the
//! bare filename of the input, and the translated parameters. It must write
//! exactly one output file inside `EngineConfig::cache` and return its path
//! relative to that directory.
//!
//! The bundled implementation is [`RustEngine`](super::rust_backend::RustEngine).

use crate::translate::ParameterSet;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),
}

/// Per-call engine configuration. Built fresh for every group, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory the input filename is resolved against.
    pub source: PathBuf,
    /// Directory the output is written into (the conversion workspace).
    pub cache: PathBuf,
    /// Image-processing backend identifier.
    pub driver: String,
    /// Directory watermark filenames are resolved against.
    pub watermarks: Option<PathBuf>,
}

/// An external image-processing engine.
pub trait ImageEngine {
    /// Render `filename` (inside `config.source`) with `parameters`.
    ///
    /// Returns the output path relative to `config.cache`.
    fn render(
        &self,
        config: &EngineConfig,
        filename: &str,
        parameters: &ParameterSet,
    ) -> Result<PathBuf, EngineError>;
}

impl<E: ImageEngine + ?Sized> ImageEngine for &E {
    fn render(
        &self,
        config: &EngineConfig,
        filename: &str,
        parameters: &ParameterSet,
    ) -> Result<PathBuf, EngineError> {
        (**self).render(config, filename, parameters)
    }
}

/// Render parameters as an engine query string (`w=100&h=100&fit=crop`).
pub fn query_string(parameters: &ParameterSet) -> String {
    parameters
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
