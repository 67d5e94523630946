//! Variable declarations: archive-native fields and derived outputs.

use serde::{Deserialize, Serialize};

/// A field identifier as known to the archive.
///
/// Not all fields live in the same physical model: some variables for a
/// logical key come from a companion model (e.g., a surface sub-model)
/// identified by `owner_model`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeVariable {
    /// Model catalog entry that owns this field
    pub owner_model: String,
    /// Canonical field name, used to tag delivered grids
    pub primary_name: String,
    /// Historical/alternate spellings, tried in order when the primary
    /// name is absent from an artifact
    #[serde(default)]
    pub alternative_names: Vec<String>,
}

impl NativeVariable {
    pub fn new(owner_model: impl Into<String>, primary_name: impl Into<String>) -> Self {
        Self {
            owner_model: owner_model.into(),
            primary_name: primary_name.into(),
            alternative_names: Vec::new(),
        }
    }

    pub fn with_alternatives(mut self, names: Vec<String>) -> Self {
        self.alternative_names = names;
        self
    }

    /// All names this field may appear under, primary first.
    pub fn candidate_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_name.as_str())
            .chain(self.alternative_names.iter().map(String::as_str))
    }
}

/// One input of a computed variable: a native field read at a
/// possibly shifted lead time.
///
/// `term_shift` is 0 for plain reads; cumulative quantities declare an
/// extra dependency at shift -1 (decumulation differences consecutive
/// lead times). A shift that lands before the first lead time delivers
/// a zero grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(flatten)]
    pub variable: NativeVariable,
    #[serde(default)]
    pub term_shift: i32,
}

impl Dependency {
    pub fn plain(variable: NativeVariable) -> Self {
        Self {
            variable,
            term_shift: 0,
        }
    }

    pub fn shifted(variable: NativeVariable, term_shift: i32) -> Self {
        Self {
            variable,
            term_shift,
        }
    }
}

/// Declarative description of a user-requested output quantity.
///
/// The transform is referenced by registry id and resolved to a pure
/// function at configuration load, so an unknown name fails at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedVariable {
    pub output_name: String,
    pub output_units: String,
    pub transform: String,
    pub dependencies: Vec<Dependency>,
}

impl ComputedVariable {
    /// Owner models touched by this variable's dependencies, deduplicated
    /// in first-seen order.
    pub fn owner_models(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for dep in &self.dependencies {
            let owner = dep.variable.owner_model.as_str();
            if !seen.contains(&owner) {
                seen.push(owner);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_names_order() {
        let var = NativeVariable::new("arome", "CLSTEMPERATURE")
            .with_alternatives(vec!["CLSTEMP".into(), "SURFTEMPERATURE".into()]);
        let names: Vec<&str> = var.candidate_names().collect();
        assert_eq!(names, vec!["CLSTEMPERATURE", "CLSTEMP", "SURFTEMPERATURE"]);
    }

    #[test]
    fn test_owner_models_dedup() {
        let cv = ComputedVariable {
            output_name: "snowfall".into(),
            output_units: "mm".into(),
            transform: "decumulate".into(),
            dependencies: vec![
                Dependency::plain(NativeVariable::new("arome", "SNOW")),
                Dependency::shifted(NativeVariable::new("arome", "SNOW"), -1),
                Dependency::plain(NativeVariable::new("arome_surface", "WETBT")),
            ],
        };
        assert_eq!(cv.owner_models(), vec!["arome", "arome_surface"]);
    }
}
