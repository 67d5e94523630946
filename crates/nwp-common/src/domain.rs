//! Geographic domain catalog entries.

use serde::{Deserialize, Serialize};

/// Index bounds into a model grid, for index-addressable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBounds {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

impl IndexBounds {
    /// Number of rows in the window.
    pub fn n_rows(&self) -> usize {
        self.last_row - self.first_row + 1
    }

    /// Number of columns in the window.
    pub fn n_cols(&self) -> usize {
        self.last_col - self.first_col + 1
    }
}

/// Lower-left/upper-right coordinate bounding box, for
/// coordinate-addressable models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordBounds {
    pub ll_lon: f64,
    pub ll_lat: f64,
    pub ur_lon: f64,
    pub ur_lat: f64,
}

impl CoordBounds {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.ll_lon && lon <= self.ur_lon && lat >= self.ll_lat && lat <= self.ur_lat
    }
}

/// How a named domain addresses its sub-window of the model grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainWindow {
    Indices(IndexBounds),
    Coords(CoordBounds),
}

/// A named geographic sub-window of a model grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub name: String,
    pub window: DomainWindow,
}

impl DomainSpec {
    pub fn by_indices(name: impl Into<String>, bounds: IndexBounds) -> Self {
        Self {
            name: name.into(),
            window: DomainWindow::Indices(bounds),
        }
    }

    pub fn by_coords(name: impl Into<String>, bounds: CoordBounds) -> Self {
        Self {
            name: name.into(),
            window: DomainWindow::Coords(bounds),
        }
    }
}

/// Catalog of named domains, constructed once from configuration and
/// passed by reference.
#[derive(Debug, Clone, Default)]
pub struct DomainCatalog {
    domains: std::collections::HashMap<String, DomainSpec>,
}

impl DomainCatalog {
    pub fn new(specs: Vec<DomainSpec>) -> Self {
        let domains = specs.into_iter().map(|d| (d.name.clone(), d)).collect();
        Self { domains }
    }

    pub fn get(&self, name: &str) -> Option<&DomainSpec> {
        self.domains.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }
}
