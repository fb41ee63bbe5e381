//! # image-chain
//!
//! Applies an ordered chain of image manipulations through an image engine,
//! one engine call per manipulation group, and owns every intermediate file
//! the chain produces.
//!
//! # Architecture: Sequential Chain
//!
//! ```text
//! input.jpg ──group 0──▶ artifact ──group 1──▶ artifact ── … ──▶ destination
//!              (engine)              (engine)                  (save)
//! ```
//!
//! For each group the pipeline:
//!
//! 1. reads the current artifact (the input for the first group),
//! 2. splits a watermark path into engine search directory + filename,
//! 3. translates abstract names (`width`, `crop`, …) to engine keys
//!    (`w`, `fit`, …),
//! 4. calls the engine, which writes one new file into the workspace,
//! 5. records that file as the live artifact, deleting its predecessor.
//!
//! Saving copies the live artifact (or the untouched input, for an empty
//! chain) to the destination and cleans the workspace.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`manipulation`] | Groups, sequences and their arguments; JSON loading |
//! | [`translate`] | Closed table of manipulation names → engine parameter keys |
//! | [`watermark`] | Splits watermark paths before translation |
//! | [`workspace`] | Workspace validation and intermediate artifact lifecycle |
//! | [`pipeline`] | The conversion state machine: `apply` then `save` |
//! | [`engine`] | The engine seam and the bundled pure-Rust engine |
//! | [`config`] | `image-chain.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Default Workspace
//!
//! The system temp directory is read once, when a [`pipeline::Conversion`] is
//! constructed, and handed to the artifact store. Overriding it is allowed
//! exactly once and only before the chain runs.
//!
//! ## Aborts Keep the Last Artifact
//!
//! A failed group leaves the previous group's output on disk, so the caller
//! can inspect how far the chain got. [`pipeline::Conversion::discard`]
//! removes it.
//!
//! ## Pure-Rust Engine
//!
//! The bundled [`engine::RustEngine`] uses the `image` crate for every pixel
//! operation, so the binary has no system dependencies. Other engines plug in
//! through [`engine::ImageEngine`].

pub mod config;
pub mod engine;
pub mod error;
pub mod manipulation;
pub mod output;
pub mod pipeline;
pub mod translate;
pub mod watermark;
pub mod workspace;

pub use error::{ConversionError, Result};

#[cfg(test)]
pub(crate) mod test_helpers;
