//! Residual norms and conserved totals.
//!
//! The steady-state residual is the L2 norm of the time derivative over
//! owned cells, area-weighted. Each rank computes the partial sums here;
//! the cross-rank reduction lives with the transport code.

use crate::mesh::Mesh2D;
use crate::state::CellField;

/// Per-variable partial residual sums: `sum qt^2 * A` over owned cells.
pub fn residual_partial(qt: &CellField, mesh: &Mesh2D) -> Vec<f64> {
    let n_vars = qt.n_vars();
    let mut partial = vec![0.0; n_vars];
    for cell in mesh.owned_cells() {
        let area = mesh.cell_area[cell];
        let row = qt.at(cell);
        for k in 0..n_vars {
            partial[k] += row[k] * row[k] * area;
        }
    }
    partial
}

/// Area-weighted total of one conserved variable over owned cells.
pub fn conserved_total(q: &CellField, mesh: &Mesh2D, k: usize) -> f64 {
    mesh.owned_cells()
        .map(|c| q.value(c, k) * mesh.cell_area[c])
        .sum()
}
