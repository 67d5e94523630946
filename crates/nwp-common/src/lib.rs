//! Common types shared across the weather-extract workspace.

pub mod domain;
pub mod error;
pub mod grid;
pub mod key;
pub mod variable;

pub use domain::{CoordBounds, DomainCatalog, DomainSpec, DomainWindow, IndexBounds};
pub use error::{ExtractError, ExtractResult};
pub use grid::{Grid, GridSpec};
pub use key::LogicalKey;
pub use variable::{ComputedVariable, Dependency, NativeVariable};
