//! Boundary application and flux assembly.
//!
//! The edge sweep evaluates the problem's flux kernel once per edge and
//! scatters the result conservatively into both endpoint cells. Ghost cells
//! accumulate contributions like everyone else but are zeroed in the
//! finalization pass, so they never advance in time.

use crate::mesh::Mesh2D;
use crate::physics::{EdgeGeometry, Physics, Reconstruction};
use crate::state::{CellField, SmoothWorkspace};

/// Write ghost-cell states by invoking each boundary binding's kernel.
pub fn apply_boundaries<P: Physics>(q: &mut CellField, mesh: &Mesh2D, physics: &P) {
    for binding in &mesh.boundary {
        let edge = &mesh.edges[binding.edge];
        let (owner, ghost) = edge.cells;
        let (interior, out) = q.pair_mut(owner, ghost);
        physics.boundary_kernel(binding.kernel, out, interior, edge.normal);
    }
}

/// Assemble the cell-area-normalized time derivative `qt` from edge fluxes.
pub fn compute_time_derivatives<P: Physics>(
    qt: &mut CellField,
    q: &CellField,
    gx: &CellField,
    gy: &CellField,
    limiter: &CellField,
    mesh: &Mesh2D,
    physics: &P,
) {
    let n_vars = q.n_vars();
    debug_assert!(n_vars <= MAX_VARS, "raise MAX_VARS for wider systems");
    qt.fill(0.0);

    let mut f = [0.0; MAX_VARS];
    let f = &mut f[..n_vars];

    for edge in &mesh.edges {
        let (i, j) = edge.cells;
        if i == j {
            continue;
        }
        let geom = EdgeGeometry {
            normal: edge.normal,
            di: (
                edge.center.0 - mesh.cell_center_x[i],
                edge.center.1 - mesh.cell_center_y[i],
            ),
            dj: (
                edge.center.0 - mesh.cell_center_x[j],
                edge.center.1 - mesh.cell_center_y[j],
            ),
            area_i: mesh.cell_area[i],
            length: edge.length,
        };
        let recon = Reconstruction {
            gx_i: gx.at(i),
            gy_i: gy.at(i),
            gx_j: gx.at(j),
            gy_j: gy.at(j),
            lim_i: limiter.at(i),
            lim_j: limiter.at(j),
        };
        physics.flux(f, q.at(i), q.at(j), &recon, &geom);

        let (qt_i, qt_j) = qt.pair_mut(i, j);
        for k in 0..n_vars {
            qt_i[k] -= f[k] * edge.length;
            qt_j[k] += f[k] * edge.length;
        }
    }

    for cell in 0..mesh.n_cells {
        if cell >= mesh.n_real_cells || mesh.cell_is_ghost[cell] {
            qt.at_mut(cell).fill(0.0);
        } else {
            let inv_area = 1.0 / mesh.cell_area[cell];
            for k in 0..n_vars {
                qt.set(cell, k, qt.value(cell, k) * inv_area);
            }
        }
    }
}

/// Stack capacity of the per-edge flux vector.
const MAX_VARS: usize = 16;

/// Jacobi sweeps applied by [`smooth_time_derivatives`].
const SMOOTH_SWEEPS: usize = 2;
/// Neighbour weight of the smoothing average.
const SMOOTH_EPS: f64 = 0.5;

/// Smooth `qt` with weighted neighbour averaging.
///
/// Each sweep replaces the owned-cell derivative with
/// `(qt + eps * sum_of_neighbours) / (1 + eps * degree)`. Ghost entries stay
/// zero, preserving the ghost-contribution invariant.
pub fn smooth_time_derivatives(qt: &mut CellField, work: &mut SmoothWorkspace, mesh: &Mesh2D) {
    let n_vars = qt.n_vars();
    for _ in 0..SMOOTH_SWEEPS {
        work.sums.fill(0.0);
        for edge in &mesh.edges {
            let (i, j) = edge.cells;
            if i == j {
                continue;
            }
            let (sum_i, sum_j) = work.sums.pair_mut(i, j);
            let qt_i = qt.at(i);
            let qt_j = qt.at(j);
            for k in 0..n_vars {
                sum_i[k] += qt_j[k];
                sum_j[k] += qt_i[k];
            }
        }
        for cell in mesh.owned_cells() {
            let scale = 1.0 / (1.0 + SMOOTH_EPS * work.degree[cell]);
            for k in 0..n_vars {
                let smoothed =
                    (qt.value(cell, k) + SMOOTH_EPS * work.sums.value(cell, k)) * scale;
                qt.set(cell, k, smoothed);
            }
        }
    }
}
