//! Variable engine: resolves a requested output quantity to its native
//! dependencies, pulls each through the subgrid cache of its owner
//! model, and applies the registered pure transform.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use nwp_common::{ComputedVariable, ExtractError, ExtractResult, Grid, LogicalKey};
use staging::SubgridCache;

use crate::transforms::TransformRegistry;

/// Derives computed variables from cached native fields.
///
/// Holds one subgrid cache per owner model; dependencies may span
/// models (an atmospheric model and its surface companion share the
/// same run/term).
pub struct VariableEngine {
    caches: HashMap<String, Arc<SubgridCache>>,
    registry: TransformRegistry,
    /// Lead times below this value have no archive snapshot; shifted
    /// dependency reads landing under it resolve to a zero grid
    /// (accumulated quantities start at zero at the analysis).
    first_term: u32,
}

impl VariableEngine {
    pub fn new(caches: Vec<Arc<SubgridCache>>, registry: TransformRegistry, first_term: u32) -> Self {
        let caches = caches
            .into_iter()
            .map(|c| (c.model().to_string(), c))
            .collect();
        Self {
            caches,
            registry,
            first_term,
        }
    }

    /// Compute one output grid for one step.
    ///
    /// Dependency grids are gathered in declared order and handed to the
    /// transform; the result is re-tagged with the output name and
    /// units. No side effects beyond the cache reads this triggers.
    pub async fn compute(
        &self,
        computed: &ComputedVariable,
        run_time: DateTime<Utc>,
        term: u32,
        domain: &str,
        member: Option<u32>,
    ) -> ExtractResult<Grid> {
        let transform = self.registry.resolve(&computed.transform)?;

        // None marks a dependency below the first lead time; its zero
        // grid is shaped after the first concrete input.
        let mut slots: Vec<Option<Grid>> = Vec::with_capacity(computed.dependencies.len());

        for dep in &computed.dependencies {
            let base = LogicalKey::new(
                dep.variable.owner_model.clone(),
                run_time,
                term,
                domain,
                member,
            );
            let key = match base.with_term_shift(dep.term_shift) {
                Some(key) if key.term >= self.first_term => key,
                _ => {
                    debug!(
                        output = %computed.output_name,
                        variable = %dep.variable.primary_name,
                        term_shift = dep.term_shift,
                        "Shifted dependency before first lead time, substituting zero grid"
                    );
                    slots.push(None);
                    continue;
                }
            };

            let cache = self.caches.get(&dep.variable.owner_model).ok_or_else(|| {
                ExtractError::Configuration(format!(
                    "No cache bound for owner model '{}'",
                    dep.variable.owner_model
                ))
            })?;

            slots.push(Some(cache.read(&key, &dep.variable).await?));
        }

        let template = slots
            .iter()
            .flatten()
            .next()
            .ok_or_else(|| {
                ExtractError::Configuration(format!(
                    "Every dependency of '{}' lies before the first lead time",
                    computed.output_name
                ))
            })?
            .clone();

        let grids: Vec<Grid> = slots
            .into_iter()
            .zip(&computed.dependencies)
            .map(|(slot, dep)| {
                slot.unwrap_or_else(|| Grid::zeros_like(&template, &dep.variable.primary_name))
            })
            .collect();

        let out = transform(&grids)?;

        Ok(Grid {
            name: computed.output_name.clone(),
            units: computed.output_units.clone(),
            spec: out.spec,
            values: out.values,
        })
    }
}
