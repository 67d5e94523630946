//! JSON-backed dataset format.
//!
//! Reference implementation of the `DatasetFormat` collaborator: raw
//! artifacts, cache entries, and grouped artifacts are JSON documents
//! on disk. The production FA/GRIB/NetCDF codecs plug in behind the
//! same trait; this one keeps the pipeline runnable and testable
//! without binary decoders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nwp_common::{ExtractError, ExtractResult, Grid};

use crate::artifact::{DatasetFormat, EntryReader, RawArtifact, RawField};

/// On-disk shape of a raw artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub fields: Vec<RawFieldDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFieldDocument {
    pub grid: Grid,
    #[serde(default)]
    pub spectral: bool,
}

/// On-disk shape of a cache entry or per-step computed artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDocument {
    pub valid_time: DateTime<Utc>,
    pub grids: Vec<Grid>,
}

/// On-disk shape of a grouped (time-concatenated) artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDocument {
    pub times: Vec<DateTime<Utc>>,
    pub steps: Vec<Vec<Grid>>,
}

#[derive(Debug, Default, Clone)]
pub struct JsonDatasetFormat;

impl JsonDatasetFormat {
    pub fn new() -> Self {
        Self
    }

    /// Write a raw artifact document; used by tests and by tooling that
    /// seeds a native store without archive access.
    pub async fn write_raw(&self, path: &Path, doc: &RawDocument) -> ExtractResult<()> {
        let bytes = serde_json::to_vec(doc)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Read back a grouped artifact; used by tests and tooling.
    pub async fn read_group(&self, path: &Path) -> ExtractResult<GroupDocument> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

struct JsonRawArtifact {
    fields: HashMap<String, RawFieldDocument>,
}

impl RawArtifact for JsonRawArtifact {
    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn read_field(&mut self, name: &str) -> ExtractResult<RawField> {
        let doc = self.fields.get(name).ok_or_else(|| {
            ExtractError::DatasetFormat(format!("Field '{}' absent from artifact", name))
        })?;
        Ok(RawField {
            grid: doc.grid.clone(),
            spectral: doc.spectral,
        })
    }
}

struct JsonEntryReader {
    grids: HashMap<String, Grid>,
}

impl EntryReader for JsonEntryReader {
    fn read(&mut self, name: &str) -> ExtractResult<Grid> {
        self.grids.get(name).cloned().ok_or_else(|| {
            ExtractError::DatasetFormat(format!("Field '{}' absent from cache entry", name))
        })
    }
}

#[async_trait]
impl DatasetFormat for JsonDatasetFormat {
    async fn open_raw(&self, path: &Path) -> ExtractResult<Box<dyn RawArtifact>> {
        let bytes = tokio::fs::read(path).await?;
        let doc: RawDocument = serde_json::from_slice(&bytes)?;
        let fields = doc
            .fields
            .into_iter()
            .map(|f| (f.grid.name.clone(), f))
            .collect();
        Ok(Box::new(JsonRawArtifact { fields }))
    }

    fn to_gridpoint(&self, field: RawField) -> ExtractResult<RawField> {
        // The JSON format stores values in grid-point order even when
        // flagged spectral; the real spectral inverse transform lives in
        // the binary codec collaborator.
        Ok(RawField {
            grid: field.grid,
            spectral: false,
        })
    }

    async fn write_entry(
        &self,
        path: &Path,
        grids: &[Grid],
        valid_time: DateTime<Utc>,
    ) -> ExtractResult<()> {
        let doc = EntryDocument {
            valid_time,
            grids: grids.to_vec(),
        };
        let bytes = serde_json::to_vec(&doc)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn open_entry(&self, path: &Path) -> ExtractResult<Box<dyn EntryReader>> {
        let bytes = tokio::fs::read(path).await?;
        let doc: EntryDocument = serde_json::from_slice(&bytes)?;
        let grids = doc
            .grids
            .into_iter()
            .map(|g| (g.name.clone(), g))
            .collect();
        Ok(Box::new(JsonEntryReader { grids }))
    }

    async fn concat(&self, paths: &[PathBuf], out: &Path) -> ExtractResult<()> {
        let mut group = GroupDocument {
            times: Vec::new(),
            steps: Vec::new(),
        };

        for path in paths {
            let bytes = tokio::fs::read(path).await?;
            let entry: EntryDocument = serde_json::from_slice(&bytes)?;
            group.times.push(entry.valid_time);
            group.steps.push(entry.grids);
        }

        let bytes = serde_json::to_vec(&group)?;
        tokio::fs::write(out, bytes).await?;
        Ok(())
    }
}
