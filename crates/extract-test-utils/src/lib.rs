//! Shared test utilities for the weather-extract workspace.
//!
//! Provides an in-memory scripted archive, a notification recorder, and
//! grid generators, so crate tests never touch the network or depend on
//! binary sample files.

pub mod archive;
pub mod generators;
pub mod notify;

pub use archive::FakeArchive;
pub use generators::{make_grid, make_grid_with_spec};
pub use notify::CollectingNotifier;

/// Macro for approximate floating-point equality assertions.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
