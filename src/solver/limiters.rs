//! Slope limiters.
//!
//! Venkatakrishnan-style construction with the Michalak smooth blend: the
//! raw limiter compares the reconstructed edge increment against the
//! one-ring bounds of the cell, and a cubic fade keyed to the cell size
//! switches limiting off entirely in smooth regions.

use crate::mesh::Mesh2D;
use crate::physics::Physics;
use crate::state::CellField;

/// Increments below this are treated as flat reconstruction.
const FLAT_TOL: f64 = 1e-15;

/// Compute per-cell, per-variable limiters in `[0, 1]`.
///
/// Phase 1 sweeps the edges to collect one-ring minima and maxima of `q`
/// into `qmin`/`qmax`. Phase 2 evaluates the limiter at every edge midpoint
/// of every owned cell and keeps the per-cell minimum.
pub fn compute_limiters<P: Physics>(
    limiter: &mut CellField,
    qmin: &mut CellField,
    qmax: &mut CellField,
    q: &CellField,
    gx: &CellField,
    gy: &CellField,
    mesh: &Mesh2D,
    physics: &P,
) {
    let n_vars = q.n_vars();
    limiter.fill(1.0);
    qmin.copy_from(q);
    qmax.copy_from(q);

    for edge in &mesh.edges {
        let (i, j) = edge.cells;
        if i == j {
            continue;
        }
        let (min_i, min_j) = qmin.pair_mut(i, j);
        let (max_i, max_j) = qmax.pair_mut(i, j);
        let qi = q.at(i);
        let qj = q.at(j);
        for k in 0..n_vars {
            min_i[k] = min_i[k].min(qj[k]);
            min_j[k] = min_j[k].min(qi[k]);
            max_i[k] = max_i[k].max(qj[k]);
            max_j[k] = max_j[k].max(qi[k]);
        }
    }

    for edge in &mesh.edges {
        let (ex, ey) = edge.center;
        for id in [edge.cells.0, edge.cells.1] {
            if !mesh.is_owned(id) {
                continue;
            }
            let dx = ex - mesh.cell_center_x[id];
            let dy = ey - mesh.cell_center_y[id];
            let area = mesh.cell_area[id];

            // Smooth-region fade scale from the cell size.
            let ka = area.sqrt();
            let k3a = ka * ka * ka;

            for k in 0..n_vars {
                let dqg = gx.value(id, k) * dx + gy.value(id, k) * dy;
                let delta_max = qmax.value(id, k) - q.value(id, k);
                let delta_min = qmin.value(id, k) - q.value(id, k);

                let spread2 = (delta_max - delta_min) * (delta_max - delta_min);
                let sigma = if spread2 <= k3a {
                    1.0
                } else if spread2 < 2.0 * k3a {
                    let y = spread2 / k3a - 1.0;
                    2.0 * y * y * y - 3.0 * y * y + 1.0
                } else {
                    0.0
                };

                let raw = if dqg > FLAT_TOL {
                    physics.limiter_func(delta_max / dqg)
                } else if dqg < -FLAT_TOL {
                    physics.limiter_func(delta_min / dqg)
                } else {
                    1.0
                };

                let blended = sigma + (1.0 - sigma) * raw;
                let current = limiter.value(id, k);
                limiter.set(id, k, current.min(blended));
            }
        }
    }
}
