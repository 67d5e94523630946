//! Field resolution with alternate-name fallback.
//!
//! Archive field names have drifted over time; a variable declares its
//! canonical name plus historical alternatives. Absence of a name is a
//! structural property of the artifact, so there is no retry here.

use tracing::debug;

use nwp_common::{ExtractError, ExtractResult, NativeVariable};

use crate::artifact::{RawArtifact, RawField};

/// Read one variable from a raw artifact, trying the primary name first
/// and then each alternative in order.
///
/// A grid found under an alternative name is re-tagged with the primary
/// name so downstream consumers are name-agnostic.
pub fn resolve_field(
    raw: &mut dyn RawArtifact,
    variable: &NativeVariable,
) -> ExtractResult<RawField> {
    for name in variable.candidate_names() {
        if !raw.has_field(name) {
            continue;
        }

        let mut field = raw.read_field(name)?;
        if name != variable.primary_name {
            debug!(
                primary = %variable.primary_name,
                found_as = %name,
                "Resolved field under alternative name"
            );
            field.grid = field.grid.renamed(&variable.primary_name);
        }
        return Ok(field);
    }

    Err(ExtractError::FieldResolution {
        variable: variable.primary_name.clone(),
        tried: variable.candidate_names().map(String::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use nwp_common::{Grid, GridSpec};

    struct MapArtifact {
        fields: HashMap<String, RawField>,
    }

    impl RawArtifact for MapArtifact {
        fn has_field(&self, name: &str) -> bool {
            self.fields.contains_key(name)
        }

        fn read_field(&mut self, name: &str) -> ExtractResult<RawField> {
            self.fields
                .get(name)
                .cloned()
                .ok_or_else(|| ExtractError::DatasetFormat(format!("no field {}", name)))
        }
    }

    fn field(name: &str) -> RawField {
        RawField::gridpoint(Grid::new(
            name,
            "K",
            GridSpec::new(2, 2, 1.0, -1.0, 0.0, 46.0),
            vec![280.0, 281.0, 282.0, 283.0],
        ))
    }

    fn variable() -> NativeVariable {
        NativeVariable::new("arome", "CLSTEMPERATURE")
            .with_alternatives(vec!["CLSTEMP".into(), "SURFTEMPERATURE".into()])
    }

    #[test]
    fn test_primary_name_wins() {
        let mut raw = MapArtifact {
            fields: HashMap::from([
                ("CLSTEMPERATURE".to_string(), field("CLSTEMPERATURE")),
                ("CLSTEMP".to_string(), field("CLSTEMP")),
            ]),
        };
        let resolved = resolve_field(&mut raw, &variable()).unwrap();
        assert_eq!(resolved.grid.name, "CLSTEMPERATURE");
    }

    #[test]
    fn test_alternative_retagged_to_primary() {
        let mut raw = MapArtifact {
            fields: HashMap::from([("CLSTEMP".to_string(), field("CLSTEMP"))]),
        };
        let resolved = resolve_field(&mut raw, &variable()).unwrap();
        // Data came from the alternative, delivered under the canonical name
        assert_eq!(resolved.grid.name, "CLSTEMPERATURE");
        assert_eq!(resolved.grid.values[0], 280.0);
    }

    #[test]
    fn test_all_names_absent() {
        let mut raw = MapArtifact {
            fields: HashMap::new(),
        };
        let err = resolve_field(&mut raw, &variable()).unwrap_err();
        match err {
            ExtractError::FieldResolution { variable, tried } => {
                assert_eq!(variable, "CLSTEMPERATURE");
                assert_eq!(tried.len(), 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
