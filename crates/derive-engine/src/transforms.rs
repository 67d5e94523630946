//! Pure transforms and their registry.
//!
//! A computed variable references its transform by registry id; the id
//! is resolved to a function value at configuration load, so an unknown
//! name fails at startup rather than mid-run. Transforms are
//! deterministic, perform no I/O, and receive their inputs in declared
//! dependency order.

use std::collections::HashMap;

use nwp_common::{ComputedVariable, ExtractError, ExtractResult, Grid};

/// A pure transform over fetched grids.
pub type Transform = fn(&[Grid]) -> ExtractResult<Grid>;

/// Registry mapping transform ids to function values.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// The built-in transform catalog.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("identity", identity);
        registry.register("kelvin_to_celsius", kelvin_to_celsius);
        registry.register("wind_speed", wind_speed);
        registry.register("wind_direction", wind_direction);
        registry.register("decumulate", decumulate);
        registry.register("sum", sum);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, transform: Transform) {
        self.transforms.insert(name.into(), transform);
    }

    /// Resolve a transform id, failing with a configuration error on an
    /// unknown name.
    pub fn resolve(&self, name: &str) -> ExtractResult<Transform> {
        self.transforms.get(name).copied().ok_or_else(|| {
            ExtractError::Configuration(format!("Unknown transform '{}'", name))
        })
    }

    /// Check every computed variable against the registry, so a bad
    /// catalog is rejected before any fetch is attempted.
    pub fn validate(&self, variables: &[ComputedVariable]) -> ExtractResult<()> {
        for variable in variables {
            self.resolve(&variable.transform).map_err(|_| {
                ExtractError::Configuration(format!(
                    "Computed variable '{}' references unknown transform '{}'",
                    variable.output_name, variable.transform
                ))
            })?;
            if variable.dependencies.is_empty() {
                return Err(ExtractError::Configuration(format!(
                    "Computed variable '{}' has no dependencies",
                    variable.output_name
                )));
            }
        }
        Ok(())
    }
}

fn expect_arity(name: &str, inputs: &[Grid], arity: usize) -> ExtractResult<()> {
    if inputs.len() != arity {
        return Err(ExtractError::DatasetFormat(format!(
            "Transform '{}' expects {} inputs, got {}",
            name,
            arity,
            inputs.len()
        )));
    }
    Ok(())
}

fn expect_same_shape(name: &str, inputs: &[Grid]) -> ExtractResult<()> {
    if let Some(first) = inputs.first() {
        for grid in &inputs[1..] {
            if grid.spec != first.spec {
                return Err(ExtractError::DatasetFormat(format!(
                    "Transform '{}' received grids with mismatched geometry",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Pass the single input through unchanged.
pub fn identity(inputs: &[Grid]) -> ExtractResult<Grid> {
    expect_arity("identity", inputs, 1)?;
    Ok(inputs[0].clone())
}

pub fn kelvin_to_celsius(inputs: &[Grid]) -> ExtractResult<Grid> {
    expect_arity("kelvin_to_celsius", inputs, 1)?;
    let mut out = inputs[0].clone();
    for v in &mut out.values {
        *v -= 273.15;
    }
    out.units = "celsius".to_string();
    Ok(out)
}

/// Wind speed from zonal and meridional components.
pub fn wind_speed(inputs: &[Grid]) -> ExtractResult<Grid> {
    expect_arity("wind_speed", inputs, 2)?;
    expect_same_shape("wind_speed", inputs)?;
    let (u, v) = (&inputs[0], &inputs[1]);
    let values = u
        .values
        .iter()
        .zip(&v.values)
        .map(|(u, v)| (u * u + v * v).sqrt())
        .collect();
    Ok(Grid {
        name: u.name.clone(),
        units: u.units.clone(),
        spec: u.spec,
        values,
    })
}

/// Meteorological wind direction (degrees the wind blows from).
pub fn wind_direction(inputs: &[Grid]) -> ExtractResult<Grid> {
    expect_arity("wind_direction", inputs, 2)?;
    expect_same_shape("wind_direction", inputs)?;
    let (u, v) = (&inputs[0], &inputs[1]);
    let values = u
        .values
        .iter()
        .zip(&v.values)
        .map(|(u, v)| {
            let deg = v.atan2(*u).to_degrees();
            (270.0 - deg).rem_euclid(360.0)
        })
        .collect();
    Ok(Grid {
        name: u.name.clone(),
        units: "degrees".to_string(),
        spec: u.spec,
        values,
    })
}

/// Per-interval rate from an accumulated-since-run-start quantity:
/// current minus previous lead time, clamped at zero against codec
/// round-off.
pub fn decumulate(inputs: &[Grid]) -> ExtractResult<Grid> {
    expect_arity("decumulate", inputs, 2)?;
    expect_same_shape("decumulate", inputs)?;
    let (current, previous) = (&inputs[0], &inputs[1]);
    let values = current
        .values
        .iter()
        .zip(&previous.values)
        .map(|(c, p)| (c - p).max(0.0))
        .collect();
    Ok(Grid {
        name: current.name.clone(),
        units: current.units.clone(),
        spec: current.spec,
        values,
    })
}

/// Pointwise sum over any number of equally shaped inputs.
pub fn sum(inputs: &[Grid]) -> ExtractResult<Grid> {
    if inputs.is_empty() {
        return Err(ExtractError::DatasetFormat(
            "Transform 'sum' received no inputs".to_string(),
        ));
    }
    expect_same_shape("sum", inputs)?;
    let mut out = inputs[0].clone();
    for grid in &inputs[1..] {
        for (acc, v) in out.values.iter_mut().zip(&grid.values) {
            *acc += v;
        }
    }
    Ok(out)
}
