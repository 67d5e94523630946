//! Extraction configuration loading.
//!
//! One YAML file describes a complete extraction: the archive catalogs
//! of the models involved, the spatial domains, the computed variables
//! with their native dependencies, and the run/term schedule.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use archive_client::{ArchiveCatalog, ModelArchiveConfig};
use derive_engine::{Grouping, TransformRegistry};
use nwp_common::{
    ComputedVariable, DomainCatalog, DomainSpec, DomainWindow, ExtractError, NativeVariable,
};

/// Root configuration loaded from an extraction YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub extraction: ExtractionInfo,
    pub models: Vec<ModelArchiveConfig>,
    pub domains: Vec<DomainSpec>,
    pub variables: Vec<ComputedVariable>,
    pub schedule: ScheduleConfig,
}

/// Identification and run-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionInfo {
    pub name: String,
    /// Domain to clip to, by name from the `domains` catalog
    pub domain: String,
    /// Batch grouping: "daily", "monthly" or "single_forecast"
    #[serde(default = "default_grouping")]
    pub grouping: String,
    /// Ensemble member, absent for deterministic models
    #[serde(default)]
    pub member: Option<u32>,
    /// Earliest archived lead time; shifted reads below it yield zeros
    #[serde(default = "default_first_term")]
    pub first_term: u32,
    /// Whether missing native files may be fetched from the archive
    #[serde(default = "default_autofetch")]
    pub autofetch: bool,
}

fn default_grouping() -> String {
    "daily".to_string()
}

fn default_first_term() -> u32 {
    1
}

fn default_autofetch() -> bool {
    true
}

/// The (run, term) step sequence to extract.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Run times in increasing order
    pub runs: Vec<DateTime<Utc>>,
    pub terms: TermRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TermRange {
    pub start: u32,
    pub end: u32,
    #[serde(default = "default_term_step")]
    pub step: u32,
}

fn default_term_step() -> u32 {
    1
}

impl TermRange {
    /// Generate the list of lead times.
    pub fn terms(&self) -> Vec<u32> {
        (self.start..=self.end)
            .step_by(self.step.max(1) as usize)
            .collect()
    }
}

impl ExtractionConfig {
    /// Load and validate an extraction configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ExtractionConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid extraction config: {}", path.display()))?;

        info!(
            extraction = %config.extraction.name,
            models = config.models.len(),
            variables = config.variables.len(),
            runs = config.schedule.runs.len(),
            "Loaded extraction configuration"
        );
        Ok(config)
    }

    /// Reject a bad catalog before any fetch is attempted.
    fn validate(&self) -> Result<(), ExtractError> {
        self.grouping()?;
        TransformRegistry::standard().validate(&self.variables)?;

        for domain in &self.domains {
            if let DomainWindow::Indices(bounds) = &domain.window {
                if bounds.first_row > bounds.last_row || bounds.first_col > bounds.last_col {
                    return Err(ExtractError::Configuration(format!(
                        "Domain '{}' declares inverted index bounds ({}..{}, {}..{})",
                        domain.name,
                        bounds.first_row,
                        bounds.last_row,
                        bounds.first_col,
                        bounds.last_col
                    )));
                }
            }
        }

        let domains = self.domain_catalog();
        if domains.get(&self.extraction.domain).is_none() {
            let declared: Vec<&str> = domains.names().collect();
            return Err(ExtractError::DomainNotFound(format!(
                "'{}' (declared: {:?})",
                self.extraction.domain, declared
            )));
        }

        let archives = self.archive_catalog();
        for variable in &self.variables {
            for owner in variable.owner_models() {
                if archives.get(owner).is_none() {
                    return Err(ExtractError::Configuration(format!(
                        "Computed variable '{}' depends on model '{}' with no archive configuration",
                        variable.output_name, owner
                    )));
                }
            }
        }

        if self.schedule.runs.is_empty() {
            return Err(ExtractError::Configuration(
                "Schedule lists no runs".to_string(),
            ));
        }
        if self.schedule.terms.start > self.schedule.terms.end {
            return Err(ExtractError::Configuration(format!(
                "Term range {}..{} is empty",
                self.schedule.terms.start, self.schedule.terms.end
            )));
        }

        Ok(())
    }

    pub fn grouping(&self) -> Result<Grouping, ExtractError> {
        match self.extraction.grouping.to_lowercase().as_str() {
            "daily" => Ok(Grouping::Daily),
            "monthly" => Ok(Grouping::Monthly),
            "single_forecast" => Ok(Grouping::SingleForecast),
            other => Err(ExtractError::Configuration(format!(
                "Unknown grouping '{}'",
                other
            ))),
        }
    }

    pub fn archive_catalog(&self) -> ArchiveCatalog {
        ArchiveCatalog::new(self.models.clone())
    }

    pub fn domain_catalog(&self) -> DomainCatalog {
        DomainCatalog::new(self.domains.clone())
    }

    /// Native variables grouped by owner model, deduplicated; this is
    /// the declared variable set of each model's subgrid cache.
    pub fn declared_variables(&self) -> BTreeMap<String, Vec<NativeVariable>> {
        let mut by_model: BTreeMap<String, Vec<NativeVariable>> = BTreeMap::new();
        for variable in &self.variables {
            for dep in &variable.dependencies {
                let list = by_model.entry(dep.variable.owner_model.clone()).or_default();
                if !list.contains(&dep.variable) {
                    list.push(dep.variable.clone());
                }
            }
        }
        debug!(models = by_model.len(), "Collected declared variable sets");
        by_model
    }

    /// All (run, term) steps in schedule order.
    pub fn steps(&self) -> Vec<(DateTime<Utc>, u32)> {
        let terms = self.schedule.terms.terms();
        self.schedule
            .runs
            .iter()
            .flat_map(|run| terms.iter().map(move |&term| (*run, term)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPS_SNOW: &str = r#"
extraction:
  name: alps_snow
  domain: alps
  grouping: daily
  first_term: 1

models:
  - model: arome
    archive_root: "https://archive.example.org/nwp"
    conventions:
      - name: "2020"
        path_template: "{model}/{date}T{run:02}00/forecast.term{term:03}.fa"
      - name: "2016"
        path_template: "{model}/{date}/r{run:02}/f{term:03}.fa"
        timeout_secs: 900

domains:
  - name: alps
    window:
      ll_lon: 5.0
      ll_lat: 44.0
      ur_lon: 8.0
      ur_lat: 46.5

variables:
  - output_name: snowfall
    output_units: "kg m-2"
    transform: decumulate
    dependencies:
      - owner_model: arome
        primary_name: SURFACCNEIGE
      - owner_model: arome
        primary_name: SURFACCNEIGE
        term_shift: -1

schedule:
  runs:
    - "2024-03-15T00:00:00Z"
    - "2024-03-16T00:00:00Z"
  terms:
    start: 1
    end: 24
    step: 3
"#;

    #[test]
    fn test_parse_extraction_config() {
        let config: ExtractionConfig = serde_yaml::from_str(ALPS_SNOW).unwrap();
        config.validate().unwrap();

        assert_eq!(config.extraction.name, "alps_snow");
        assert_eq!(config.grouping().unwrap(), Grouping::Daily);
        assert!(config.extraction.autofetch);
        assert_eq!(config.models[0].conventions.len(), 2);
        assert_eq!(config.models[0].conventions[1].timeout_secs, 900);
        assert_eq!(config.variables[0].dependencies[1].term_shift, -1);
        assert_eq!(
            config.schedule.terms.terms(),
            vec![1, 4, 7, 10, 13, 16, 19, 22]
        );
    }

    #[test]
    fn test_declared_variables_deduplicated() {
        let config: ExtractionConfig = serde_yaml::from_str(ALPS_SNOW).unwrap();
        let by_model = config.declared_variables();

        // Both dependencies name the same native variable
        assert_eq!(by_model["arome"].len(), 1);
        assert_eq!(by_model["arome"][0].primary_name, "SURFACCNEIGE");
    }

    #[test]
    fn test_steps_order_runs_then_terms() {
        let config: ExtractionConfig = serde_yaml::from_str(ALPS_SNOW).unwrap();
        let steps = config.steps();

        assert_eq!(steps.len(), 16);
        assert_eq!(steps[0].1, 1);
        assert_eq!(steps[7].1, 22);
        assert!(steps[8].0 > steps[7].0);
    }

    #[test]
    fn test_unknown_transform_rejected() {
        let bad = ALPS_SNOW.replace("transform: decumulate", "transform: frobnicate");
        let config: ExtractionConfig = serde_yaml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_domain_rejected() {
        let bad = ALPS_SNOW.replace("domain: alps\n", "domain: pyrenees\n");
        let config: ExtractionConfig = serde_yaml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_index_bounds_rejected() {
        let bad = ALPS_SNOW.replace(
            "    window:\n      ll_lon: 5.0\n      ll_lat: 44.0\n      ur_lon: 8.0\n      ur_lat: 46.5",
            "    window:\n      first_row: 4\n      last_row: 1\n      first_col: 0\n      last_col: 3",
        );
        let config: ExtractionConfig = serde_yaml::from_str(&bad).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ExtractError::Configuration(_)));
    }

    #[test]
    fn test_unconfigured_owner_model_rejected() {
        let bad = ALPS_SNOW.replace("      - owner_model: arome\n        primary_name: SURFACCNEIGE\n        term_shift: -1", "      - owner_model: arome_surface\n        primary_name: WETBT");
        let config: ExtractionConfig = serde_yaml::from_str(&bad).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ExtractError::Configuration(_)));
    }

    #[test]
    fn test_unknown_grouping_rejected() {
        let bad = ALPS_SNOW.replace("grouping: daily", "grouping: weekly");
        let config: ExtractionConfig = serde_yaml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }
}
