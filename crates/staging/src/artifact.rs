//! Artifact decode/encode collaborator interfaces.
//!
//! The physical decoding of the archive's binary grid formats (FA,
//! GRIB) and the multidimensional-array file format of cache entries
//! are external collaborators; this module only fixes their contracts.
//! `JsonDatasetFormat` is the workspace's reference implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use nwp_common::{ExtractResult, Grid};

/// One field as read from a raw artifact.
///
/// Fields may arrive in a transformed (spectral) representation; spatial
/// sub-extraction is only valid after reduction to grid points.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub grid: Grid,
    pub spectral: bool,
}

impl RawField {
    pub fn gridpoint(grid: Grid) -> Self {
        Self {
            grid,
            spectral: false,
        }
    }
}

/// An open raw artifact (one fetched archive file), readable by field name.
pub trait RawArtifact: Send {
    /// Whether the artifact contains a field under this exact name.
    fn has_field(&self, name: &str) -> bool;

    /// Read one named field. Absence is a structural property of the
    /// artifact; callers fall back across alternate names, never retry.
    fn read_field(&mut self, name: &str) -> ExtractResult<RawField>;
}

/// An open cache entry, readable by canonical field name.
pub trait EntryReader: Send {
    fn read(&mut self, name: &str) -> ExtractResult<Grid>;
}

/// Dataset codec collaborator: opens raw artifacts, materializes and
/// reads cache entries, concatenates per-step artifacts along time.
#[async_trait]
pub trait DatasetFormat: Send + Sync {
    /// Open a fetched archive artifact for field reads.
    async fn open_raw(&self, path: &Path) -> ExtractResult<Box<dyn RawArtifact>>;

    /// Reduce a spectral field to its grid-point representation.
    /// A field already in grid-point representation passes through.
    fn to_gridpoint(&self, field: RawField) -> ExtractResult<RawField>;

    /// Write a complete cache entry or per-step computed artifact.
    /// Callers are responsible for atomic materialization (temp + rename).
    async fn write_entry(
        &self,
        path: &Path,
        grids: &[Grid],
        valid_time: DateTime<Utc>,
    ) -> ExtractResult<()>;

    /// Open a cache entry for reads.
    async fn open_entry(&self, path: &Path) -> ExtractResult<Box<dyn EntryReader>>;

    /// Concatenate per-step artifacts along the time axis into one
    /// grouped artifact. Input paths are already time-ordered.
    async fn concat(&self, paths: &[PathBuf], out: &Path) -> ExtractResult<()>;
}
