//! Subgrid cache: domain-clipped, format-normalized artifacts staged on
//! disk, one entry per logical key and declared variable set.
//!
//! Invariants:
//! - an entry is either absent or complete; materialization writes to a
//!   temp file in the same directory and renames on success
//! - population runs at most once per key per run, guarded by a per-key
//!   async lock
//! - open read handles are tracked per key and closed as soon as every
//!   declared variable has been delivered once

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use nwp_common::{
    DomainCatalog, ExtractError, ExtractResult, Grid, LogicalKey, NativeVariable,
};

use crate::artifact::DatasetFormat;
use crate::clip::clip_to_window;
use crate::native_store::NativeStore;
use crate::resolver::resolve_field;

/// Cache counters, mostly for tests and status logging.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Reads satisfied by an already-present entry
    pub hits: u64,
    /// Reads that found no entry on disk
    pub misses: u64,
    /// Entries actually materialized (at most one per key)
    pub populations: u64,
}

/// In-memory record of a cache entry opened for reading.
struct OpenHandle {
    reader: Box<dyn crate::artifact::EntryReader>,
    /// Declared variables not yet delivered from this entry
    pending: HashSet<String>,
}

/// On-disk staging area of reduced artifacts for one owner model.
///
/// Bound to one model, one declared variable set, and one dataset
/// format; the engine holds one cache per owner model.
pub struct SubgridCache {
    dir: PathBuf,
    model: String,
    variables: Vec<NativeVariable>,
    /// crc32 over the sorted declared variable names; part of the entry
    /// file name so a different variable set at the same key populates
    /// a distinct entry instead of silently reusing an incomplete one
    var_digest: u32,
    domains: DomainCatalog,
    native: Arc<NativeStore>,
    format: Arc<dyn DatasetFormat>,
    autofetch: bool,
    handles: Mutex<HashMap<LogicalKey, OpenHandle>>,
    population_locks: Mutex<HashMap<LogicalKey, Arc<Mutex<()>>>>,
    stats: Mutex<CacheStats>,
}

impl SubgridCache {
    pub async fn open(
        dir: PathBuf,
        model: impl Into<String>,
        variables: Vec<NativeVariable>,
        domains: DomainCatalog,
        native: Arc<NativeStore>,
        format: Arc<dyn DatasetFormat>,
        autofetch: bool,
    ) -> ExtractResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let var_digest = variable_digest(&variables);
        Ok(Self {
            dir,
            model: model.into(),
            variables,
            var_digest,
            domains,
            native,
            format,
            autofetch,
            handles: Mutex::new(HashMap::new()),
            population_locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        })
    }

    /// Owner model this cache is bound to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Canonical entry path for a key under this cache's variable set.
    pub fn entry_path(&self, key: &LogicalKey) -> PathBuf {
        self.dir
            .join(format!("{}_v{:08x}.nc", key.file_stem(), self.var_digest))
    }

    /// Read one declared variable for a key, populating the entry first
    /// on a miss.
    pub async fn read(&self, key: &LogicalKey, variable: &NativeVariable) -> ExtractResult<Grid> {
        if key.model != self.model {
            return Err(ExtractError::Configuration(format!(
                "Key for model '{}' read through cache bound to '{}'",
                key.model, self.model
            )));
        }
        if !self
            .variables
            .iter()
            .any(|v| v.primary_name == variable.primary_name)
        {
            return Err(ExtractError::Configuration(format!(
                "Variable '{}' is not declared for the '{}' cache",
                variable.primary_name, self.model
            )));
        }

        let entry = self.entry_path(key);

        if tokio::fs::try_exists(&entry).await? {
            self.stats.lock().await.hits += 1;
        } else {
            self.stats.lock().await.misses += 1;
            let lock = self.population_lock(key).await;
            let _guard = lock.lock().await;
            // Re-check under the lock: a concurrent reader may have
            // completed population while we waited.
            if !tokio::fs::try_exists(&entry).await? {
                self.populate(key, &entry).await?;
            }
        }

        self.read_from_entry(key, &entry, variable).await
    }

    /// Number of entries currently held open; bounded by the number of
    /// keys with in-flight reads.
    pub async fn open_handle_count(&self) -> usize {
        self.handles.lock().await.len()
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    async fn population_lock(&self, key: &LogicalKey) -> Arc<Mutex<()>> {
        let mut locks = self.population_locks.lock().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Materialize the cache entry for a key: fetch the raw artifact if
    /// needed, resolve every declared variable, normalize and clip, then
    /// write atomically. Any resolution failure aborts the whole entry.
    async fn populate(&self, key: &LogicalKey, entry: &std::path::Path) -> ExtractResult<()> {
        let native_path = self.native.ensure(key, self.autofetch).await?;

        let domain = self
            .domains
            .get(&key.domain)
            .ok_or_else(|| ExtractError::DomainNotFound(key.domain.clone()))?
            .clone();

        let mut raw = self.format.open_raw(&native_path).await?;

        let mut grids = Vec::with_capacity(self.variables.len());
        for variable in &self.variables {
            let mut field = resolve_field(raw.as_mut(), variable)?;
            if field.spectral {
                field = self.format.to_gridpoint(field)?;
            }
            grids.push(clip_to_window(&field.grid, &domain.window)?);
        }

        let valid_time = key.run_time + ChronoDuration::hours(key.term as i64);

        let temp = entry.with_extension("nc.tmp");
        let written = self.format.write_entry(&temp, &grids, valid_time).await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        tokio::fs::rename(&temp, entry).await?;

        self.stats.lock().await.populations += 1;
        info!(
            key = %key,
            entry = %entry.display(),
            variables = self.variables.len(),
            "Cache entry populated"
        );
        Ok(())
    }

    async fn read_from_entry(
        &self,
        key: &LogicalKey,
        entry: &std::path::Path,
        variable: &NativeVariable,
    ) -> ExtractResult<Grid> {
        let mut handles = self.handles.lock().await;

        let handle = match handles.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(o) => o.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => {
                let reader = self.format.open_entry(entry).await?;
                let pending = self
                    .variables
                    .iter()
                    .map(|var| var.primary_name.clone())
                    .collect();
                debug!(key = %key, "Opened cache entry handle");
                v.insert(OpenHandle { reader, pending })
            }
        };
        let grid = handle.reader.read(&variable.primary_name)?;
        handle.pending.remove(&variable.primary_name);

        if handle.pending.is_empty() {
            handles.remove(key);
            debug!(key = %key, "All variables delivered, closing entry handle");
        }

        Ok(grid)
    }
}

/// Digest of the sorted declared variable names.
fn variable_digest(variables: &[NativeVariable]) -> u32 {
    let mut names: Vec<&str> = variables.iter().map(|v| v.primary_name.as_str()).collect();
    names.sort_unstable();
    let mut hasher = crc32fast::Hasher::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize()
}
