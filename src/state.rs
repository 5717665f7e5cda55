//! Per-cell solution storage.
//!
//! All solver fields are flat, variable-interleaved vectors: the `V` values
//! of cell `i` live at `[V*i .. V*i + V]`. This cell-major layout keeps both
//! endpoints of an edge contiguous in memory during the flux sweep, which is
//! the hot loop of the engine.

use crate::mesh::Mesh2D;

/// A per-cell, per-variable field in cell-major, variable-minor order.
///
/// # Example
///
/// ```
/// use fv_rs::state::CellField;
///
/// let mut f = CellField::new(3, 10);
/// f.at_mut(4)[1] = 2.5;
/// assert_eq!(f.value(4, 1), 2.5);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CellField {
    n_vars: usize,
    data: Vec<f64>,
}

impl CellField {
    /// Create a zero-initialized field for `n_cells` cells of `n_vars` variables.
    pub fn new(n_vars: usize, n_cells: usize) -> Self {
        Self::constant(n_vars, n_cells, 0.0)
    }

    /// Create a field with every entry set to `value`.
    pub fn constant(n_vars: usize, n_cells: usize, value: f64) -> Self {
        assert!(n_vars > 0, "need at least one conserved variable");
        Self {
            n_vars,
            data: vec![value; n_vars * n_cells],
        }
    }

    /// Number of variables per cell.
    #[inline]
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// Number of cells.
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.data.len() / self.n_vars
    }

    /// The values of one cell.
    #[inline]
    pub fn at(&self, cell: usize) -> &[f64] {
        let base = self.n_vars * cell;
        &self.data[base..base + self.n_vars]
    }

    /// Mutable values of one cell.
    #[inline]
    pub fn at_mut(&mut self, cell: usize) -> &mut [f64] {
        let base = self.n_vars * cell;
        &mut self.data[base..base + self.n_vars]
    }

    /// Mutable values of two distinct cells at once.
    ///
    /// Used by the edge sweep, which scatters one flux into both endpoints.
    #[inline]
    pub fn pair_mut(&mut self, i: usize, j: usize) -> (&mut [f64], &mut [f64]) {
        assert_ne!(i, j, "pair_mut requires distinct cells");
        let v = self.n_vars;
        if i < j {
            let (lo, hi) = self.data.split_at_mut(v * j);
            (&mut lo[v * i..v * i + v], &mut hi[..v])
        } else {
            let (lo, hi) = self.data.split_at_mut(v * i);
            (&mut hi[..v], &mut lo[v * j..v * j + v])
        }
    }

    /// Single entry access.
    #[inline]
    pub fn value(&self, cell: usize, k: usize) -> f64 {
        self.data[self.n_vars * cell + k]
    }

    /// Single entry assignment.
    #[inline]
    pub fn set(&mut self, cell: usize, k: usize, value: f64) {
        self.data[self.n_vars * cell + k] = value;
    }

    /// Set every entry to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Copy every entry from another field of identical shape.
    pub fn copy_from(&mut self, other: &CellField) {
        assert_eq!(self.n_vars, other.n_vars);
        assert_eq!(self.data.len(), other.data.len());
        self.data.copy_from_slice(&other.data);
    }

    /// Flat view of the storage.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Flat mutable view of the storage.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    /// Smallest entry.
    pub fn min(&self) -> f64 {
        self.data.iter().fold(f64::INFINITY, |m, &v| m.min(v))
    }

    /// True if every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

// =============================================================================
// Solver state
// =============================================================================

/// Scratch storage for residual smoothing.
#[derive(Clone, Debug)]
pub struct SmoothWorkspace {
    /// Neighbour sums, one entry per cell and variable.
    pub sums: CellField,
    /// Edge count of each cell, as a float for the weighted average.
    pub degree: Vec<f64>,
}

impl SmoothWorkspace {
    /// Build the workspace for a mesh, precomputing cell degrees.
    pub fn new(n_vars: usize, mesh: &Mesh2D) -> Self {
        let mut degree = vec![0.0; mesh.n_cells];
        for edge in &mesh.edges {
            let (i, j) = edge.cells;
            if i != j {
                degree[i] += 1.0;
                degree[j] += 1.0;
            }
        }
        Self {
            sums: CellField::new(n_vars, mesh.n_cells),
            degree,
        }
    }
}

/// All per-run solver fields, allocated once at driver entry.
///
/// `q` persists across the run; every other field is transient per step.
/// The limiter field starts at one (fully unlimited) so that flux kernels
/// see sane values even when the limiter phase is disabled.
#[derive(Clone, Debug)]
pub struct SolverState {
    /// Conserved variables.
    pub q: CellField,
    /// Stage vector of the low-storage scheme.
    pub q_stage: CellField,
    /// Time derivative.
    pub qt: CellField,
    /// Gradient x-components.
    pub gx: CellField,
    /// Gradient y-components.
    pub gy: CellField,
    /// Slope limiter values in [0, 1].
    pub limiter: CellField,
    /// One-ring minimum of `q`.
    pub qmin: CellField,
    /// One-ring maximum of `q`.
    pub qmax: CellField,
    /// Per-cell time step.
    pub dt: CellField,
    /// Residual smoothing scratch.
    pub smooth: SmoothWorkspace,
}

impl SolverState {
    /// Allocate all fields, sized from the mesh.
    pub fn new(n_vars: usize, mesh: &Mesh2D) -> Self {
        let n = mesh.n_cells;
        Self {
            q: CellField::new(n_vars, n),
            q_stage: CellField::new(n_vars, n),
            qt: CellField::new(n_vars, n),
            gx: CellField::new(n_vars, n),
            gy: CellField::new(n_vars, n),
            limiter: CellField::constant(n_vars, n, 1.0),
            qmin: CellField::new(n_vars, n),
            qmax: CellField::new(n_vars, n),
            dt: CellField::new(n_vars, n),
            smooth: SmoothWorkspace::new(n_vars, mesh),
        }
    }

    /// Number of variables per cell.
    pub fn n_vars(&self) -> usize {
        self.q.n_vars()
    }
}
