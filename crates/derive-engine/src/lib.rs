//! Variable derivation for weather-extract: resolving requested output
//! quantities to native dependencies, applying registered pure
//! transforms, and deciding batch group boundaries.

pub mod engine;
pub mod grouper;
pub mod transforms;

pub use engine::VariableEngine;
pub use grouper::{BatchGrouper, Grouping};
pub use transforms::{Transform, TransformRegistry};
