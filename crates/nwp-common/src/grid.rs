//! Dense grid fields and their specifications.

use serde::{Deserialize, Serialize};

/// Specification of a regular grid.
///
/// Coordinates are degrees for geographic models, projection meters
/// otherwise. Data is row-major, first row at (`first_x`, `first_y`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of points in X (longitude) direction
    pub nx: usize,
    /// Number of points in Y (latitude) direction
    pub ny: usize,
    /// Grid resolution in X direction
    pub dx: f64,
    /// Grid resolution in Y direction
    pub dy: f64,
    /// First grid point longitude/X
    pub first_x: f64,
    /// First grid point latitude/Y
    pub first_y: f64,
}

impl GridSpec {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64, first_x: f64, first_y: f64) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            first_x,
            first_y,
        }
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// Check if the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }

    /// 1D array index for a 2D grid position (row-major).
    pub fn flat_index(&self, col: usize, row: usize) -> usize {
        row * self.nx + col
    }

    /// Coordinates of a grid point, or None when out of range.
    pub fn coord_at(&self, col: usize, row: usize) -> Option<(f64, f64)> {
        if col >= self.nx || row >= self.ny {
            return None;
        }
        Some((
            self.first_x + col as f64 * self.dx,
            self.first_y + row as f64 * self.dy,
        ))
    }

    /// Nearest grid index for a coordinate, or None when outside the grid.
    pub fn index_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.first_x) / self.dx).round() as isize;
        let row = ((y - self.first_y) / self.dy).round() as isize;

        if col < 0 || row < 0 || col >= self.nx as isize || row >= self.ny as isize {
            return None;
        }
        Some((col as usize, row as usize))
    }
}

/// A named, unit-tagged grid of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Canonical field name
    pub name: String,
    /// Physical units of the values
    pub units: String,
    /// Grid geometry
    pub spec: GridSpec,
    /// Row-major values, length `spec.len()`
    pub values: Vec<f32>,
}

impl Grid {
    pub fn new(name: impl Into<String>, units: impl Into<String>, spec: GridSpec, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            spec,
            values,
        }
    }

    /// A zero-filled grid with the same geometry as `other`.
    ///
    /// Used as the previous-step value of cumulative quantities at the
    /// first lead time.
    pub fn zeros_like(other: &Grid, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: other.units.clone(),
            spec: other.spec,
            values: vec![0.0; other.values.len()],
        }
    }

    /// Re-tag this grid with a new canonical name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Value at a 2D grid position.
    pub fn at(&self, col: usize, row: usize) -> f32 {
        self.values[self.spec.flat_index(col, row)]
    }
}
