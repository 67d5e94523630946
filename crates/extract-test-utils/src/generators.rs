//! Grid generators for tests.

use nwp_common::{Grid, GridSpec};

/// Standard test geometry: 0.5° grid anchored at (0°E, 46°N), rows
/// running north to south. Sized by the caller.
pub fn test_spec(nx: usize, ny: usize) -> GridSpec {
    GridSpec::new(nx, ny, 0.5, -0.5, 0.0, 46.0)
}

/// Build a grid on the standard test geometry, with values derived from
/// the flat index.
pub fn make_grid(name: &str, nx: usize, ny: usize, value: impl Fn(usize) -> f32) -> Grid {
    make_grid_with_spec(name, test_spec(nx, ny), value)
}

/// Build a grid on an explicit geometry.
pub fn make_grid_with_spec(name: &str, spec: GridSpec, value: impl Fn(usize) -> f32) -> Grid {
    let values = (0..spec.len()).map(value).collect();
    Grid::new(name, "1", spec, values)
}
