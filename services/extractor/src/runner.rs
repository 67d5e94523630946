//! The extraction run loop.
//!
//! Walks the (run, term) schedule in order, computes every configured
//! output variable for each step, writes a per-step artifact under
//! `computed/`, and concatenates accumulated steps into a grouped
//! artifact under `final/` whenever the grouper reports a boundary.
//! Grouped artifacts already sealed stay valid when a later step fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use archive_client::{ArchiveAccess, Notifier, ResourceLocator, RetryPolicy};
use derive_engine::{BatchGrouper, Grouping, TransformRegistry, VariableEngine};
use nwp_common::{ComputedVariable, ExtractResult, Grid};
use staging::{DatasetFormat, NativeStore, SubgridCache};

use crate::config::ExtractionConfig;

/// Totals reported after a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub steps: usize,
    pub groups: usize,
}

struct PendingStep {
    run_time: DateTime<Utc>,
    path: PathBuf,
}

/// Drives one configured extraction over its step schedule.
pub struct ExtractionRunner {
    name: String,
    engine: VariableEngine,
    format: Arc<dyn DatasetFormat>,
    grouper: BatchGrouper,
    grouping: Grouping,
    variables: Vec<ComputedVariable>,
    domain: String,
    member: Option<u32>,
    computed_dir: PathBuf,
    final_dir: PathBuf,
    pending: Vec<PendingStep>,
    summary: RunSummary,
}

impl ExtractionRunner {
    /// Assemble the full pipeline under one working directory: native
    /// store, one subgrid cache per owner model, engine, and the stage
    /// directories for per-step and grouped artifacts.
    pub async fn open(
        config: &ExtractionConfig,
        workdir: &Path,
        archive: Arc<dyn ArchiveAccess>,
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
        format: Arc<dyn DatasetFormat>,
    ) -> ExtractResult<Self> {
        let grouping = config.grouping()?;
        let domains = config.domain_catalog();

        let native = Arc::new(
            NativeStore::open(
                workdir.join("native"),
                ResourceLocator::new(config.archive_catalog()),
                archive,
                notifier,
                policy,
            )
            .await?,
        );

        let mut caches = Vec::new();
        for (model, variables) in config.declared_variables() {
            caches.push(Arc::new(
                SubgridCache::open(
                    workdir.join("subgrid"),
                    model,
                    variables,
                    domains.clone(),
                    native.clone(),
                    format.clone(),
                    config.extraction.autofetch,
                )
                .await?,
            ));
        }

        let engine = VariableEngine::new(
            caches,
            TransformRegistry::standard(),
            config.extraction.first_term,
        );

        let computed_dir = workdir.join("computed");
        let final_dir = workdir.join("final");
        tokio::fs::create_dir_all(&computed_dir).await?;
        tokio::fs::create_dir_all(&final_dir).await?;

        Ok(Self {
            name: config.extraction.name.clone(),
            engine,
            format,
            grouper: BatchGrouper::new(grouping),
            grouping,
            variables: config.variables.clone(),
            domain: config.extraction.domain.clone(),
            member: config.extraction.member,
            computed_dir,
            final_dir,
            pending: Vec::new(),
            summary: RunSummary::default(),
        })
    }

    /// Run the whole step sequence, sealing the trailing group at the
    /// end of the stream.
    pub async fn run(&mut self, steps: &[(DateTime<Utc>, u32)]) -> ExtractResult<RunSummary> {
        for &(run_time, term) in steps {
            self.step(run_time, term).await?;
        }
        self.flush().await?;

        info!(
            extraction = %self.name,
            steps = self.summary.steps,
            groups = self.summary.groups,
            "Extraction complete"
        );
        Ok(self.summary)
    }

    async fn step(&mut self, run_time: DateTime<Utc>, term: u32) -> ExtractResult<()> {
        if self.grouper.advance(run_time, term)? {
            self.seal_group().await?;
        }

        let mut grids: Vec<Grid> = Vec::with_capacity(self.variables.len());
        for variable in &self.variables {
            grids.push(
                self.engine
                    .compute(variable, run_time, term, &self.domain, self.member)
                    .await?,
            );
        }

        let valid_time = run_time + Duration::hours(term as i64);
        let path = self.computed_dir.join(format!(
            "{}_{}_f{:03}.nc",
            self.name,
            run_time.format("%Y%m%d%H"),
            term
        ));

        // Temp-then-rename so a crash mid-write never leaves a readable
        // half artifact in computed/.
        let tmp = path.with_extension("nc.tmp");
        if let Err(e) = self.format.write_entry(&tmp, &grids, valid_time).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp, &path).await?;

        self.pending.push(PendingStep { run_time, path });
        self.summary.steps += 1;
        Ok(())
    }

    /// Seal whatever steps are still accumulated. Called once after the
    /// last step; a stream that never crossed a boundary still produces
    /// its one grouped artifact here.
    pub async fn flush(&mut self) -> ExtractResult<()> {
        self.seal_group().await
    }

    async fn seal_group(&mut self) -> ExtractResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let label = self.group_label(self.pending[0].run_time);
        let out = self.final_dir.join(format!("{}_{}.nc", self.name, label));
        let paths: Vec<PathBuf> = self.pending.iter().map(|p| p.path.clone()).collect();

        let tmp = out.with_extension("nc.tmp");
        if let Err(e) = self.format.concat(&paths, &tmp).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp, &out).await?;

        // Per-step artifacts are only an intermediate stage; drop them
        // once their group is sealed. A failed removal is not fatal.
        for path in &paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove per-step artifact");
            }
        }

        info!(
            extraction = %self.name,
            group = %label,
            steps = paths.len(),
            path = %out.display(),
            "Sealed grouped artifact"
        );

        self.pending.clear();
        self.summary.groups += 1;
        Ok(())
    }

    fn group_label(&self, run_time: DateTime<Utc>) -> String {
        match self.grouping {
            Grouping::Daily => run_time.format("%Y%m%d").to_string(),
            Grouping::Monthly => run_time.format("%Y%m").to_string(),
            Grouping::SingleForecast => run_time.format("%Y%m%dT%H").to_string(),
        }
    }
}
