//! Compressible Euler equations binding.
//!
//! Conserved variables: density, x-momentum, y-momentum, total energy
//! (`rho`, `rhou`, `rhov`, `rhoe`). The numerical flux is a central average
//! plus Roe dissipation with wave speeds widened against the left/right
//! states to suppress expansion shocks.
//!
//! Ships the two classic validation setups: the Sod shock tube and the
//! Mach 3 forward step.

use crate::mesh::Mesh2D;
use crate::state::CellField;

use super::{EdgeGeometry, Physics, Reconstruction, SolverFlags, michalak_limiter};

/// Number of conserved variables.
pub const EULER_VARS: usize = 4;

/// Boundary kernel tag: slip wall (momentum reflected about the normal).
pub const BC_WALL: usize = 0;
/// Boundary kernel tag: zero-flux wall (interior state copied).
pub const BC_WALL_COPY: usize = 1;
/// Boundary kernel tag: characteristic inlet.
pub const BC_INLET: usize = 2;
/// Boundary kernel tag: characteristic outlet.
pub const BC_OUTLET: usize = 3;

const BOUNDARY_NAMES: [&str; 4] = ["wall", "wall_copy", "inlet", "outlet"];
const VAR_NAMES: [&str; 4] = ["rho", "rhou", "rhov", "rhoe"];
const EXTRA_SCALARS: [&str; 2] = ["p", "mach"];
const EXTRA_VECTORS: [&str; 1] = ["U"];

/// Physical constants of one Euler problem instance.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EulerConfig {
    /// Ratio of specific heats.
    pub gamma: f64,
    /// CFL number for the eigenvalue-based time-step rule.
    pub cfl: f64,
}

impl Default for EulerConfig {
    fn default() -> Self {
        Self {
            gamma: 1.4,
            cfl: 0.5,
        }
    }
}

/// Initial-condition choices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EulerInit {
    /// Free-stream state everywhere.
    Uniform,
    /// Riemann problem split along a vertical line.
    RiemannX {
        /// Split abscissa.
        x_split: f64,
        /// Conserved state left of the split.
        left: [f64; EULER_VARS],
        /// Conserved state right of the split.
        right: [f64; EULER_VARS],
    },
}

/// Time-step rule choices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EulerDtRule {
    /// CFL rule from per-edge maximum eigenvalues.
    Cfl,
    /// Fixed time step.
    Constant(f64),
}

/// Euler problem binding.
#[derive(Clone, Debug)]
pub struct EulerPhysics {
    /// Physical constants.
    pub config: EulerConfig,
    /// Engine phase switches.
    pub flags: SolverFlags,
    /// Initial condition.
    pub init: EulerInit,
    /// Time-step rule.
    pub dt_rule: EulerDtRule,
    /// Free-stream conserved state, prescribed at inlets.
    pub free_stream: [f64; EULER_VARS],
    /// Static pressure prescribed at subsonic outlets.
    pub outlet_pressure: f64,
    /// Threshold of the Michalak limiter shape function.
    pub limiter_threshold: f64,
}

impl EulerPhysics {
    /// Build a conserved state from primitive variables.
    pub fn conserved(gamma: f64, rho: f64, u: f64, v: f64, p: f64) -> [f64; EULER_VARS] {
        [
            rho,
            rho * u,
            rho * v,
            p / (gamma - 1.0) + 0.5 * rho * (u * u + v * v),
        ]
    }

    /// Uniform free-stream problem with slip walls available.
    pub fn uniform_flow(config: EulerConfig, rho: f64, u: f64, v: f64, p: f64) -> Self {
        let free_stream = Self::conserved(config.gamma, rho, u, v, p);
        Self {
            config,
            flags: SolverFlags::first_order().with_global_dt(true),
            init: EulerInit::Uniform,
            dt_rule: EulerDtRule::Cfl,
            free_stream,
            outlet_pressure: p,
            limiter_threshold: 2.0,
        }
    }

    /// The Sod shock tube: unit square split at x = 0.5, fixed time step.
    pub fn sod_shock_tube() -> Self {
        let config = EulerConfig::default();
        let left = Self::conserved(config.gamma, 1.0, 0.0, 0.0, 1.0);
        let right = Self::conserved(config.gamma, 0.125, 0.0, 0.0, 0.1);
        Self {
            config,
            flags: SolverFlags::first_order().with_global_dt(true),
            init: EulerInit::RiemannX {
                x_split: 0.5,
                left,
                right,
            },
            dt_rule: EulerDtRule::Constant(2e-5),
            free_stream: left,
            outlet_pressure: 1.0,
            limiter_threshold: 2.0,
        }
    }

    /// The Mach 3 forward step: supersonic inlet at CFL 1.5.
    pub fn mach3_forward_step() -> Self {
        let config = EulerConfig {
            gamma: 1.4,
            cfl: 1.5,
        };
        let mach = 3.0;
        let free_stream = Self::conserved(config.gamma, 1.4, mach, 0.0, 1.0);
        Self {
            config,
            flags: SolverFlags::first_order().with_global_dt(true),
            init: EulerInit::Uniform,
            dt_rule: EulerDtRule::Cfl,
            free_stream,
            outlet_pressure: 1.0,
            limiter_threshold: 2.0,
        }
    }

    /// Replace the engine phase switches.
    pub fn with_flags(mut self, flags: SolverFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replace the time-step rule.
    pub fn with_dt_rule(mut self, rule: EulerDtRule) -> Self {
        self.dt_rule = rule;
        self
    }

    /// Static pressure.
    #[inline]
    pub fn pressure(&self, q: &[f64]) -> f64 {
        (self.config.gamma - 1.0) * (q[3] - 0.5 / q[0] * (q[1] * q[1] + q[2] * q[2]))
    }

    /// Speed of sound.
    #[inline]
    pub fn sound_speed(&self, q: &[f64]) -> f64 {
        (self.config.gamma * self.pressure(q) / q[0]).sqrt()
    }

    /// Analytic flux `F(q) · n`, used by tests to check consistency.
    pub fn physical_flux(&self, f: &mut [f64], q: &[f64], normal: (f64, f64)) {
        let p = self.pressure(q);
        let vn = (q[1] * normal.0 + q[2] * normal.1) / q[0];
        f[0] = q[0] * vn;
        f[1] = q[1] * vn + p * normal.0;
        f[2] = q[2] * vn + p * normal.1;
        f[3] = (q[3] + p) * vn;
    }

    /// Linearly reconstruct a cell state at the edge midpoint.
    fn reconstruct(
        &self,
        q: &[f64],
        gx: &[f64],
        gy: &[f64],
        lim: &[f64],
        d: (f64, f64),
    ) -> [f64; EULER_VARS] {
        let mut out = [0.0; EULER_VARS];
        for k in 0..EULER_VARS {
            out[k] = q[k] + lim[k] * (gx[k] * d.0 + gy[k] * d.1);
        }
        // Fall back to the cell average if reconstruction leaves the
        // admissible set.
        if out[0] <= 0.0 || self.pressure(&out) <= 0.0 {
            out.copy_from_slice(q);
        }
        out
    }

    fn roe_flux(&self, f: &mut [f64], qi: &[f64], qj: &[f64], n: (f64, f64)) {
        let gamma = self.config.gamma;

        let pi = self.pressure(qi);
        let pj = self.pressure(qj);
        let vi = (qi[1] * n.0 + qi[2] * n.1) / qi[0];
        let vj = (qj[1] * n.0 + qj[2] * n.1) / qj[0];

        // Central flux.
        f[0] = (qi[0] * vi + qj[0] * vj) * 0.5;
        f[1] = (qi[1] * vi + pi * n.0 + qj[1] * vj + pj * n.0) * 0.5;
        f[2] = (qi[2] * vi + pi * n.1 + qj[2] * vj + pj * n.1) * 0.5;
        f[3] = ((qi[3] + pi) * vi + (qj[3] + pj) * vj) * 0.5;

        // Roe averages.
        let ul = qi[1] / qi[0];
        let vl = qi[2] / qi[0];
        let ur = qj[1] / qj[0];
        let vr = qj[2] / qj[0];

        let srho_l = qi[0].sqrt();
        let srho_r = qj[0].sqrt();
        let rho = srho_l * srho_r;
        let u = (ul * srho_l + ur * srho_r) / (srho_l + srho_r);
        let v = (vl * srho_l + vr * srho_r) / (srho_l + srho_r);
        let h = ((qi[3] + pi) / qi[0] * srho_l + (qj[3] + pj) / qj[0] * srho_r)
            / (srho_l + srho_r);
        let q2 = u * u + v * v;
        let c = ((gamma - 1.0) * (h - 0.5 * q2)).sqrt();
        let vn = u * n.0 + v * n.1;
        let vn_l = ul * n.0 + vl * n.1;
        let vn_r = ur * n.0 + vr * n.1;

        // Wave speeds widened against the one-sided values; cures the
        // expansion shock of the plain Roe scheme.
        let lambda_cm = (vn - c).min(vn_l - c).abs();
        let lambda_c = vn.abs();
        let lambda_cp = (vn + c).max(vn_r + c).abs();

        let dp = pj - pi;
        let dvn = vn_r - vn_l;
        let k1 = lambda_cm * (dp - rho * c * dvn) / (2.0 * c * c);
        let k234_0 = lambda_c * ((qj[0] - qi[0]) - dp / (c * c));
        let k234_1 = lambda_c * rho;
        let k5 = lambda_cp * (dp + rho * c * dvn) / (2.0 * c * c);

        f[0] -= 0.5 * (k1 + k234_0 + k5);
        f[1] -= 0.5
            * (k1 * (u - c * n.0)
                + k234_0 * u
                + k234_1 * (ur - ul - dvn * n.0)
                + k5 * (u + c * n.0));
        f[2] -= 0.5
            * (k1 * (v - c * n.1)
                + k234_0 * v
                + k234_1 * (vr - vl - dvn * n.1)
                + k5 * (v + c * n.1));
        f[3] -= 0.5
            * (k1 * (h - c * vn)
                + k234_0 * q2 * 0.5
                + k234_1 * (u * (ur - ul) + v * (vr - vl) - vn * dvn)
                + k5 * (h + c * vn));
    }

    /// Characteristic inlet/outlet kernel.
    ///
    /// Branches on the local Mach number and the sign of the normal
    /// velocity: supersonic flow copies one full state; subsonic flow mixes
    /// the prescribed state with interior characteristics.
    fn characteristic_bc(&self, ghost: &mut [f64], interior: &[f64], n: (f64, f64)) {
        let gamma = self.config.gamma;
        let bv = self.free_stream;

        let u = interior[1] / interior[0];
        let v = interior[2] / interior[0];
        let u_norm = (u * u + v * v).sqrt();
        let u_dot_n = u * n.0 + v * n.1;
        let p = self.pressure(interior);
        let c = (gamma * p / interior[0]).sqrt();

        if u_norm / c > 1.0 {
            // Supersonic: all characteristics run one way.
            let source = if u_dot_n < 0.0 { &bv[..] } else { interior };
            ghost.copy_from_slice(source);
        } else if u_dot_n < 0.0 {
            // Subsonic inlet: prescribed state, interior pressure.
            ghost[0] = bv[0];
            ghost[1] = bv[1];
            ghost[2] = bv[2];
            ghost[3] =
                p / (gamma - 1.0) + 0.5 / ghost[0] * (ghost[1] * ghost[1] + ghost[2] * ghost[2]);
        } else {
            // Subsonic outlet: prescribed pressure, interior state corrected
            // along the outgoing acoustic characteristic.
            let pb = self.outlet_pressure;
            let rho0 = interior[0];
            let c0 = c;
            let rho_b = interior[0] + (pb - p) / (c0 * c0);
            let u_b = u + n.0 * (p - pb) / (rho0 * c0);
            let v_b = v + n.1 * (p - pb) / (rho0 * c0);
            ghost[0] = rho_b;
            ghost[1] = rho_b * u_b;
            ghost[2] = rho_b * v_b;
            ghost[3] = pb / (gamma - 1.0) + 0.5 * rho_b * (u_b * u_b + v_b * v_b);
        }
    }
}

impl Physics for EulerPhysics {
    fn n_vars(&self) -> usize {
        EULER_VARS
    }

    fn var_names(&self) -> &[&'static str] {
        &VAR_NAMES
    }

    fn flags(&self) -> SolverFlags {
        self.flags
    }

    fn initial_solution(&self, q: &mut CellField, mesh: &Mesh2D) {
        for cell in 0..mesh.n_cells {
            let state = match self.init {
                EulerInit::Uniform => self.free_stream,
                EulerInit::RiemannX {
                    x_split,
                    left,
                    right,
                } => {
                    if mesh.cell_center_x[cell] < x_split {
                        left
                    } else {
                        right
                    }
                }
            };
            q.at_mut(cell).copy_from_slice(&state);
        }
    }

    fn flux(
        &self,
        f: &mut [f64],
        q_i: &[f64],
        q_j: &[f64],
        recon: &Reconstruction<'_>,
        geom: &EdgeGeometry,
    ) {
        if self.flags.linear_interpolate {
            let qi = self.reconstruct(q_i, recon.gx_i, recon.gy_i, recon.lim_i, geom.di);
            let qj = self.reconstruct(q_j, recon.gx_j, recon.gy_j, recon.lim_j, geom.dj);
            self.roe_flux(f, &qi, &qj, geom.normal);
        } else {
            self.roe_flux(f, q_i, q_j, geom.normal);
        }
    }

    fn calc_dt(&self, dt: &mut CellField, q: &CellField, mesh: &Mesh2D) {
        match self.dt_rule {
            EulerDtRule::Constant(value) => dt.fill(value),
            EulerDtRule::Cfl => {
                // Accumulate the per-cell sum of max |eigenvalue| * edge
                // length, then dt = CFL * A / sum.
                dt.fill(0.0);
                let n_vars = dt.n_vars();
                for edge in &mesh.edges {
                    let (i, j) = edge.cells;
                    if i == j {
                        continue;
                    }
                    let qi = q.at(i);
                    let qj = q.at(j);
                    let eig_i = self.sound_speed(qi)
                        + ((qi[1] * edge.normal.0 + qi[2] * edge.normal.1) / qi[0]).abs();
                    let eig_j = self.sound_speed(qj)
                        + ((qj[1] * edge.normal.0 + qj[2] * edge.normal.1) / qj[0]).abs();
                    let scale = eig_i.max(eig_j) * edge.length;
                    let (di, dj) = dt.pair_mut(i, j);
                    for k in 0..n_vars {
                        di[k] += scale;
                        dj[k] += scale;
                    }
                }
                for cell in 0..mesh.n_cells {
                    let area = mesh.cell_area[cell];
                    for k in 0..n_vars {
                        let sum = dt.value(cell, k);
                        dt.set(cell, k, self.config.cfl * area / sum);
                    }
                }
            }
        }
    }

    fn limiter_func(&self, y: f64) -> f64 {
        michalak_limiter(y, self.limiter_threshold)
    }

    fn boundary_names(&self) -> &[&'static str] {
        &BOUNDARY_NAMES
    }

    fn boundary_kernel(
        &self,
        kernel: usize,
        ghost: &mut [f64],
        interior: &[f64],
        normal: (f64, f64),
    ) {
        match kernel {
            BC_WALL => {
                // Reflect momentum about the normal; the speed is unchanged.
                let m_dot_n = normal.0 * interior[1] + normal.1 * interior[2];
                ghost[0] = interior[0];
                ghost[1] = interior[1] - 2.0 * normal.0 * m_dot_n;
                ghost[2] = interior[2] - 2.0 * normal.1 * m_dot_n;
                ghost[3] = interior[3];
            }
            BC_WALL_COPY => ghost.copy_from_slice(interior),
            BC_INLET | BC_OUTLET => self.characteristic_bc(ghost, interior, normal),
            other => panic!("unknown boundary kernel tag {other}"),
        }
    }

    fn extra_scalar_names(&self) -> &[&'static str] {
        &EXTRA_SCALARS
    }

    fn extra_scalar(&self, output: usize, q: &[f64]) -> f64 {
        match output {
            0 => self.pressure(q),
            1 => {
                let speed = (q[1] * q[1] + q[2] * q[2]).sqrt() / q[0];
                speed / self.sound_speed(q)
            }
            _ => 0.0,
        }
    }

    fn extra_vector_names(&self) -> &[&'static str] {
        &EXTRA_VECTORS
    }

    fn extra_vector(&self, _output: usize, q: &[f64]) -> (f64, f64) {
        (q[1] / q[0], q[2] / q[0])
    }
}
