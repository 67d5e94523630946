//! Mapping from logical requests to candidate archive locations.
//!
//! The physical location of a snapshot has changed historically
//! (archive reorganizations, renamed resources), so one logical request
//! expands to an ordered list of candidate descriptors rendered from the
//! naming conventions declared for the model.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use nwp_common::{ExtractError, ExtractResult};

use crate::descriptor::ResourceDescriptor;

fn default_timeout_secs() -> u64 {
    600
}

/// One historical naming convention for a model's archive paths.
///
/// `path_template` placeholders: `{model}`, `{date}` (YYYYMMDD),
/// `{run:02}` (cycle hour), `{term:03}` (lead time hours),
/// `{member:03}` (ensemble member). A template naming `{member:03}`
/// is skipped for deterministic requests.
#[derive(Debug, Clone, Deserialize)]
pub struct NamingConvention {
    pub name: String,
    pub path_template: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Archive connection parameters for one model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArchiveConfig {
    pub model: String,
    pub archive_root: String,
    /// Conventions in priority order, newest (most likely correct) first
    pub conventions: Vec<NamingConvention>,
}

/// Catalog of per-model archive configurations.
///
/// Constructed once at startup and passed by reference; there is no
/// ambient global lookup.
#[derive(Debug, Clone, Default)]
pub struct ArchiveCatalog {
    models: HashMap<String, ModelArchiveConfig>,
}

impl ArchiveCatalog {
    pub fn new(configs: Vec<ModelArchiveConfig>) -> Self {
        let models = configs.into_iter().map(|c| (c.model.clone(), c)).collect();
        Self { models }
    }

    pub fn get(&self, model: &str) -> Option<&ModelArchiveConfig> {
        self.models.get(model)
    }
}

/// Expands a logical request into ordered candidate descriptors.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    catalog: ArchiveCatalog,
}

impl ResourceLocator {
    pub fn new(catalog: ArchiveCatalog) -> Self {
        Self { catalog }
    }

    /// Produce the ordered candidate descriptors for one snapshot.
    ///
    /// Earlier entries are tried first and are assumed more likely
    /// correct for recent data. Fails with a configuration error when
    /// no convention applies.
    pub fn locate(
        &self,
        model: &str,
        run_time: DateTime<Utc>,
        term: u32,
        member: Option<u32>,
    ) -> ExtractResult<Vec<ResourceDescriptor>> {
        let config = self.catalog.get(model).ok_or_else(|| {
            ExtractError::Configuration(format!("No archive configuration for model '{}'", model))
        })?;

        let mut descriptors = Vec::new();

        for convention in &config.conventions {
            if convention.path_template.contains("{member:03}") && member.is_none() {
                debug!(
                    model = %model,
                    convention = %convention.name,
                    "Skipping ensemble convention for deterministic request"
                );
                continue;
            }

            let path = render_template(&convention.path_template, model, run_time, term, member)?;

            descriptors.push(ResourceDescriptor {
                archive_root: config.archive_root.clone(),
                convention: convention.name.clone(),
                path,
                timeout: Duration::from_secs(convention.timeout_secs),
            });
        }

        if descriptors.is_empty() {
            return Err(ExtractError::Configuration(format!(
                "No naming convention applies for model '{}' (member = {:?})",
                model, member
            )));
        }

        Ok(descriptors)
    }
}

/// Render a path template, rejecting unknown placeholders.
fn render_template(
    template: &str,
    model: &str,
    run_time: DateTime<Utc>,
    term: u32,
    member: Option<u32>,
) -> ExtractResult<String> {
    let mut path = template
        .replace("{model}", model)
        .replace("{date}", &run_time.format("%Y%m%d").to_string())
        .replace("{run:02}", &run_time.format("%H").to_string())
        .replace("{term:03}", &format!("{:03}", term));

    if let Some(member) = member {
        path = path.replace("{member:03}", &format!("{:03}", member));
    }

    if path.contains('{') {
        return Err(ExtractError::Configuration(format!(
            "Unresolved placeholder in path template '{}'",
            template
        )));
    }

    Ok(path)
}
