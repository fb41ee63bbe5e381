//! The external image engine and the bundled pure-Rust implementation.
//!
//! The conversion pipeline only ever talks to the [`ImageEngine`] trait; it
//! never inspects parameter values or pixels. The module is split into:
//! - **Backend**: [`ImageEngine`] trait, [`EngineConfig`], [`EngineError`]
//! - **Parameters**: [`RenderPlan`], a typed reading of the short-key parameters
//! - **Calculations**: Pure functions for dimension and placement math
//! - **RustEngine**: [`RustEngine`], driver `"rust"`, backed by the `image` crate

pub mod backend;
mod calculations;
pub mod params;
pub mod rust_backend;

pub use backend::{EngineConfig, EngineError, ImageEngine, query_string};
pub use params::{Quality, RenderPlan};
pub use rust_backend::RustEngine;
