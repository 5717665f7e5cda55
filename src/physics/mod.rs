//! Problem-definition contract.
//!
//! The engine is generic over a [`Physics`] implementation that supplies
//! everything problem-specific: the number of conserved variables, the
//! numerical flux, the time-step rule, the initial solution, and the
//! boundary kernels. Boundary kernels are addressed by a small integer tag;
//! the mesh loader resolves boundary names to tags once, at load time, so
//! the per-step boundary sweep never touches strings.

pub mod euler;

use crate::mesh::Mesh2D;
use crate::state::CellField;

pub use euler::{EulerConfig, EulerDtRule, EulerInit, EulerPhysics};

// =============================================================================
// Solver phase switches
// =============================================================================

/// Per-problem switches for the engine's optional phases.
///
/// A disabled phase is skipped entirely and its field keeps the neutral
/// value downstream consumers expect (zero gradients, unit limiters).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverFlags {
    /// Compute Green-Gauss gradients each stage.
    pub calc_gradients: bool,
    /// Compute slope limiters each stage.
    pub calc_limiters: bool,
    /// Reconstruct edge states linearly inside the flux kernel.
    pub linear_interpolate: bool,
    /// Flux kernels consume face-normal gradients (viscous terms).
    pub diffusive_gradients: bool,
    /// Reduce the time step to a global minimum across all cells and ranks.
    pub global_dt: bool,
    /// Smooth the time derivative with neighbour averaging before updating.
    pub smooth_residuals: bool,
}

impl SolverFlags {
    /// First-order configuration: no reconstruction phases.
    pub fn first_order() -> Self {
        Self::default()
    }

    /// Second-order configuration: gradients, limiters and reconstruction.
    pub fn second_order() -> Self {
        Self {
            calc_gradients: true,
            calc_limiters: true,
            linear_interpolate: true,
            ..Self::default()
        }
    }

    /// Enable or disable the global time-step reduction.
    pub fn with_global_dt(mut self, on: bool) -> Self {
        self.global_dt = on;
        self
    }

    /// Enable or disable residual smoothing.
    pub fn with_smooth_residuals(mut self, on: bool) -> Self {
        self.smooth_residuals = on;
        self
    }
}

// =============================================================================
// Flux kernel inputs
// =============================================================================

/// Edge geometry handed to the flux kernel.
#[derive(Clone, Copy, Debug)]
pub struct EdgeGeometry {
    /// Unit normal from cell `i` to cell `j`.
    pub normal: (f64, f64),
    /// Vector from the centroid of cell `i` to the edge midpoint.
    pub di: (f64, f64),
    /// Vector from the centroid of cell `j` to the edge midpoint.
    pub dj: (f64, f64),
    /// Area of cell `i`.
    pub area_i: f64,
    /// Edge length.
    pub length: f64,
}

/// Reconstruction data of the two cells adjacent to an edge.
#[derive(Clone, Copy, Debug)]
pub struct Reconstruction<'a> {
    /// Gradient x-components of cell `i`.
    pub gx_i: &'a [f64],
    /// Gradient y-components of cell `i`.
    pub gy_i: &'a [f64],
    /// Gradient x-components of cell `j`.
    pub gx_j: &'a [f64],
    /// Gradient y-components of cell `j`.
    pub gy_j: &'a [f64],
    /// Limiter values of cell `i`.
    pub lim_i: &'a [f64],
    /// Limiter values of cell `j`.
    pub lim_j: &'a [f64],
}

// =============================================================================
// Problem binding
// =============================================================================

/// The user problem binding consumed by the engine.
///
/// Kernel methods receive raw `V`-sized slices so that implementations stay
/// allocation-free in the edge loop.
pub trait Physics {
    /// Number of conserved variables `V`.
    fn n_vars(&self) -> usize;

    /// Variable names, used by output writers. Must have length `V`.
    fn var_names(&self) -> &[&'static str];

    /// Engine phase switches for this problem.
    fn flags(&self) -> SolverFlags;

    /// Write the initial solution into `q` for every cell, ghosts included.
    fn initial_solution(&self, q: &mut CellField, mesh: &Mesh2D);

    /// Numerical flux across one edge, written into `f` (`V` values).
    fn flux(
        &self,
        f: &mut [f64],
        q_i: &[f64],
        q_j: &[f64],
        recon: &Reconstruction<'_>,
        geom: &EdgeGeometry,
    );

    /// Per-cell time-step rule, written into `dt` for every cell.
    fn calc_dt(&self, dt: &mut CellField, q: &CellField, mesh: &Mesh2D);

    /// Limiter shape function applied to the slope ratio.
    fn limiter_func(&self, y: f64) -> f64 {
        michalak_limiter(y, 2.0)
    }

    /// Names of the boundary kernels this problem defines. The position of a
    /// name is its tag.
    fn boundary_names(&self) -> &[&'static str];

    /// Write `V` ghost values from the adjacent interior state and the
    /// outward edge normal.
    fn boundary_kernel(&self, kernel: usize, ghost: &mut [f64], interior: &[f64], normal: (f64, f64));

    /// Resolve a mesh boundary name to its kernel tag.
    fn resolve_boundary(&self, name: &str) -> Option<usize> {
        self.boundary_names().iter().position(|n| *n == name)
    }

    /// Names of derived scalar outputs (post-processing only).
    fn extra_scalar_names(&self) -> &[&'static str] {
        &[]
    }

    /// Evaluate derived scalar output `output` for one cell state.
    fn extra_scalar(&self, _output: usize, _q: &[f64]) -> f64 {
        0.0
    }

    /// Names of derived vector outputs (post-processing only).
    fn extra_vector_names(&self) -> &[&'static str] {
        &[]
    }

    /// Evaluate derived vector output `output` for one cell state.
    fn extra_vector(&self, _output: usize, _q: &[f64]) -> (f64, f64) {
        (0.0, 0.0)
    }
}

/// Michalak piecewise-cubic limiter shape function.
///
/// Returns 1 above the threshold `y_t`; below it, a cubic that matches value
/// and slope at both ends, keeping the limiter differentiable.
pub fn michalak_limiter(y: f64, y_t: f64) -> f64 {
    if y >= y_t {
        1.0
    } else {
        let a = 1.0 / (y_t * y_t) - 2.0 / (y_t * y_t * y_t);
        let b = -1.5 * a * y_t - 0.5 / y_t;
        a * y * y * y + b * y * y + y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_michalak_limits() {
        // Saturates at one above the threshold.
        assert_eq!(michalak_limiter(2.0, 2.0), 1.0);
        assert_eq!(michalak_limiter(10.0, 2.0), 1.0);
        // Vanishes at zero slope ratio.
        assert!(michalak_limiter(0.0, 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_michalak_continuous_at_threshold() {
        let y_t = 2.0;
        let below = michalak_limiter(y_t - 1e-9, y_t);
        assert!((below - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_michalak_monotone_on_unit_interval() {
        let y_t = 2.0;
        let mut prev = michalak_limiter(0.0, y_t);
        for i in 1..=100 {
            let y = i as f64 * 0.02;
            let value = michalak_limiter(y, y_t);
            assert!(value >= prev - 1e-12, "limiter must not decrease at y={y}");
            prev = value;
        }
    }

    #[test]
    fn test_flags_builders() {
        let flags = SolverFlags::second_order().with_global_dt(true);
        assert!(flags.calc_gradients && flags.calc_limiters && flags.linear_interpolate);
        assert!(flags.global_dt);
        assert!(!flags.smooth_residuals);

        let flags = SolverFlags::first_order();
        assert!(!flags.calc_gradients && !flags.calc_limiters);
    }
}
