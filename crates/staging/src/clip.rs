//! Clipping grids to named geographic domains.
//!
//! Index bounds slice the array directly; coordinate bounds are first
//! converted to index bounds through the grid geometry. Interpolation
//! is out of scope — the clip keeps whole grid cells.

use nwp_common::{DomainWindow, ExtractError, ExtractResult, Grid, GridSpec, IndexBounds};

/// Reduce a grid to the sub-window named by a domain.
pub fn clip_to_window(grid: &Grid, window: &DomainWindow) -> ExtractResult<Grid> {
    let bounds = match window {
        DomainWindow::Indices(bounds) => *bounds,
        DomainWindow::Coords(coords) => {
            let (ll_col, ll_row) = grid.spec.index_at(coords.ll_lon, coords.ll_lat).ok_or_else(|| {
                ExtractError::DatasetFormat(format!(
                    "Domain corner ({}, {}) outside grid",
                    coords.ll_lon, coords.ll_lat
                ))
            })?;
            let (ur_col, ur_row) = grid.spec.index_at(coords.ur_lon, coords.ur_lat).ok_or_else(|| {
                ExtractError::DatasetFormat(format!(
                    "Domain corner ({}, {}) outside grid",
                    coords.ur_lon, coords.ur_lat
                ))
            })?;
            // Row order depends on the sign of dy; normalize.
            IndexBounds {
                first_row: ll_row.min(ur_row),
                last_row: ll_row.max(ur_row),
                first_col: ll_col.min(ur_col),
                last_col: ll_col.max(ur_col),
            }
        }
    };

    if bounds.first_row > bounds.last_row || bounds.first_col > bounds.last_col {
        return Err(ExtractError::Configuration(format!(
            "Inverted clip window ({}..{}, {}..{})",
            bounds.first_row, bounds.last_row, bounds.first_col, bounds.last_col
        )));
    }

    if bounds.last_col >= grid.spec.nx || bounds.last_row >= grid.spec.ny {
        return Err(ExtractError::DatasetFormat(format!(
            "Clip window ({}..{}, {}..{}) exceeds grid {}x{}",
            bounds.first_row,
            bounds.last_row,
            bounds.first_col,
            bounds.last_col,
            grid.spec.ny,
            grid.spec.nx
        )));
    }

    let nx = bounds.n_cols();
    let ny = bounds.n_rows();
    let mut values = Vec::with_capacity(nx * ny);
    for row in bounds.first_row..=bounds.last_row {
        let start = grid.spec.flat_index(bounds.first_col, row);
        values.extend_from_slice(&grid.values[start..start + nx]);
    }

    let first_x = grid.spec.first_x + bounds.first_col as f64 * grid.spec.dx;
    let first_y = grid.spec.first_y + bounds.first_row as f64 * grid.spec.dy;

    Ok(Grid {
        name: grid.name.clone(),
        units: grid.units.clone(),
        spec: GridSpec::new(nx, ny, grid.spec.dx, grid.spec.dy, first_x, first_y),
        values,
    })
}
