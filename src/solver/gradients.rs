//! Green-Gauss cell-based gradients.
//!
//! For each real cell the gradient is the area-normalized sum of edge
//! contributions `0.5 (q_i + q_j) n L`, accumulated symmetrically: positive
//! into the cell the normal leaves, negative into the cell it enters. Ghost
//! cells end the pass with zero gradients; the halo exchange then overwrites
//! halo entries with the owning rank's values.

use crate::mesh::Mesh2D;
use crate::state::CellField;

/// Compute Green-Gauss gradients of `q` into `gx`, `gy`.
pub fn compute_gradients(gx: &mut CellField, gy: &mut CellField, q: &CellField, mesh: &Mesh2D) {
    let n_vars = q.n_vars();
    gx.fill(0.0);
    gy.fill(0.0);

    for edge in &mesh.edges {
        let (i, j) = edge.cells;
        if i == j {
            continue;
        }
        let (nx, ny) = edge.normal;
        let qi = q.at(i);
        let qj = q.at(j);

        let (gx_i, gx_j) = gx.pair_mut(i, j);
        let (gy_i, gy_j) = gy.pair_mut(i, j);
        for k in 0..n_vars {
            let face = (qi[k] + qj[k]) * 0.5 * edge.length;
            gx_i[k] += face * nx;
            gx_j[k] -= face * nx;
            gy_i[k] += face * ny;
            gy_j[k] -= face * ny;
        }
    }

    for cell in 0..mesh.n_real_cells {
        let inv_area = 1.0 / mesh.cell_area[cell];
        for k in 0..n_vars {
            gx.set(cell, k, gx.value(cell, k) * inv_area);
            gy.set(cell, k, gy.value(cell, k) * inv_area);
        }
    }

    // Ghosts carry no gradient of their own; halo entries are refreshed
    // from the owning rank afterwards.
    for cell in 0..mesh.n_cells {
        if cell >= mesh.n_real_cells || mesh.cell_is_ghost[cell] {
            gx.at_mut(cell).fill(0.0);
            gy.at_mut(cell).fill(0.0);
        }
    }
}

/// Face-normal gradient of a scalar across one edge, for diffusive fluxes.
///
/// Projects the two-point difference onto the edge normal:
/// `grad = (q_j - q_i) n L / A`.
#[inline]
pub fn gradient_for_diffusion(
    q_i: f64,
    q_j: f64,
    normal: (f64, f64),
    area: f64,
    length: f64,
) -> (f64, f64) {
    let scale = (q_j - q_i) * length / area;
    (scale * normal.0, scale * normal.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fill a field with a linear function of the cell centroid.
    fn linear_field(mesh: &Mesh2D, n_vars: usize, a: f64, b: f64) -> CellField {
        let mut q = CellField::new(n_vars, mesh.n_cells);
        for cell in 0..mesh.n_cells {
            for k in 0..n_vars {
                let value = a * mesh.cell_center_x[cell] + b * mesh.cell_center_y[cell];
                q.set(cell, k, value + k as f64);
            }
        }
        q
    }

    #[test]
    fn test_linear_field_exact_gradients() {
        let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 5, 4, 0);
        let (a, b) = (3.0, -2.0);
        let q = linear_field(&mesh, 2, a, b);

        let mut gx = CellField::new(2, mesh.n_cells);
        let mut gy = CellField::new(2, mesh.n_cells);
        compute_gradients(&mut gx, &mut gy, &q, &mesh);

        for cell in mesh.owned_cells() {
            for k in 0..2 {
                assert!(
                    (gx.value(cell, k) - a).abs() < 1e-12,
                    "cell {cell} gx = {}",
                    gx.value(cell, k)
                );
                assert!(
                    (gy.value(cell, k) - b).abs() < 1e-12,
                    "cell {cell} gy = {}",
                    gy.value(cell, k)
                );
            }
        }
    }

    #[test]
    fn test_uniform_field_zero_gradients() {
        let mesh = Mesh2D::uniform_rectangle(0.0, 2.0, 0.0, 1.0, 4, 3, 0);
        let q = CellField::constant(3, mesh.n_cells, 7.5);

        let mut gx = CellField::new(3, mesh.n_cells);
        let mut gy = CellField::new(3, mesh.n_cells);
        compute_gradients(&mut gx, &mut gy, &q, &mesh);

        assert!(gx.max_abs() < 1e-13);
        assert!(gy.max_abs() < 1e-13);
    }

    #[test]
    fn test_ghost_gradients_zeroed() {
        let mesh = Mesh2D::x_strip(0.0, 1.0, 0.0, 1.0, 6, 2, [0; 4], 0, 2);
        let q = linear_field(&mesh, 1, 1.0, 1.0);

        let mut gx = CellField::new(1, mesh.n_cells);
        let mut gy = CellField::new(1, mesh.n_cells);
        compute_gradients(&mut gx, &mut gy, &q, &mesh);

        for cell in 0..mesh.n_cells {
            if cell >= mesh.n_real_cells || mesh.cell_is_ghost[cell] {
                assert_eq!(gx.value(cell, 0), 0.0);
                assert_eq!(gy.value(cell, 0), 0.0);
            }
        }
    }

    #[test]
    fn test_edge_contribution_antisymmetry() {
        // Swapping the endpoints of an edge flips the sign of both
        // accumulated contributions, leaving their sum zero.
        let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 2, 1, 0);
        let mut q = CellField::new(1, mesh.n_cells);
        for cell in 0..mesh.n_cells {
            q.set(cell, 0, mesh.cell_center_x[cell]);
        }

        // The single interior edge contributes +f*n to one cell and -f*n to
        // the other before area normalization.
        let edge = mesh
            .edges
            .iter()
            .find(|e| mesh.is_owned(e.cells.0) && mesh.is_owned(e.cells.1))
            .expect("interior edge");
        let (i, j) = edge.cells;
        let face = (q.value(i, 0) + q.value(j, 0)) * 0.5 * edge.length;
        let contribution_i = face * edge.normal.0;
        let contribution_j = -face * edge.normal.0;
        assert!((contribution_i + contribution_j).abs() < 1e-15);
    }

    #[test]
    fn test_gradient_for_diffusion() {
        let (gx, gy) = gradient_for_diffusion(1.0, 3.0, (1.0, 0.0), 0.5, 0.25);
        assert!((gx - 1.0).abs() < 1e-15);
        assert_eq!(gy, 0.0);
    }
}
