//! The explicit time-integration driver.
//!
//! Owns the per-run solver state and runs the outer step loop: boundary
//! application, time-step computation with optional global reduction, the
//! multi-stage update with halo exchange, residual reduction and reporting.
//! One OS thread per rank; the only blocking points are the transport calls.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::mesh::{Mesh2D, MeshError};
use crate::parallel::{reduce_min, reduce_sum, HaloExchanger, Transport, TransportError};
use crate::physics::Physics;
use crate::solver::{
    apply_boundaries, compute_gradients, compute_limiters, compute_time_derivatives,
    residual_partial, smooth_time_derivatives,
};
use crate::state::{CellField, SolverState};

use super::rk::StageScheme;

/// Driver failure.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The mesh failed validation.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// A transport call failed; the run cannot continue.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The problem binding reports a variable count that does not match its
    /// variable names.
    #[error("problem defines {vars} variables but {names} variable names")]
    VarNamesMismatch { vars: usize, names: usize },

    /// A mesh boundary binding references a kernel the problem does not
    /// define.
    #[error("mesh references boundary kernel tag {kernel}, problem defines {known}")]
    UnknownBoundaryKernel { kernel: usize, known: usize },

    /// Residuals became non-finite; the solution has diverged.
    #[error("non-finite residual at step {step}")]
    NonFinite { step: usize },
}

/// Driver options.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Upper bound on steps.
    pub max_steps: usize,
    /// Upper bound on simulated time.
    pub max_time: f64,
    /// Steps between residual reports.
    pub print_interval: usize,
    /// Convergence threshold on `max(R[k] / R0[k])`.
    pub tolerance: f64,
    /// Stage coefficients of the multi-stage update.
    pub stages: StageScheme,
    /// Re-apply boundary conditions to the stage vector before every stage,
    /// not just once per step.
    pub refresh_bounds_each_stage: bool,
    /// Wall-clock bound checked at the top of the step loop.
    pub max_wall_time: Option<Duration>,
    /// Print the CSV residual table on rank 0.
    pub print_residuals: bool,
    /// Invoke the step callback whenever simulated time crosses a multiple
    /// of this interval.
    pub time_series_interval: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            max_time: f64::INFINITY,
            print_interval: 100,
            tolerance: 1e-16,
            stages: StageScheme::default(),
            refresh_bounds_each_stage: false,
            max_wall_time: None,
            print_residuals: true,
            time_series_interval: None,
        }
    }
}

impl SolverConfig {
    /// Set the step bound.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the simulated-time bound.
    pub fn with_max_time(mut self, max_time: f64) -> Self {
        self.max_time = max_time;
        self
    }

    /// Set the residual print interval.
    pub fn with_print_interval(mut self, interval: usize) -> Self {
        self.print_interval = interval.max(1);
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Replace the stage scheme.
    pub fn with_stages(mut self, stages: StageScheme) -> Self {
        self.stages = stages;
        self
    }

    /// Refresh ghost values before every stage.
    pub fn with_stage_bounds_refresh(mut self, on: bool) -> Self {
        self.refresh_bounds_each_stage = on;
        self
    }

    /// Bound the wall-clock time of the run.
    pub fn with_max_wall_time(mut self, limit: Duration) -> Self {
        self.max_wall_time = Some(limit);
        self
    }

    /// Silence the rank-0 residual table.
    pub fn quiet(mut self) -> Self {
        self.print_residuals = false;
        self
    }

    /// Emit the step callback at this simulated-time interval.
    pub fn with_time_series_interval(mut self, interval: f64) -> Self {
        self.time_series_interval = Some(interval);
        self
    }
}

/// Summary of a completed run.
#[derive(Clone, Debug)]
pub struct SolverResult {
    /// Steps taken.
    pub steps: usize,
    /// Final simulated time.
    pub time: f64,
    /// Initial residual norms `R0`.
    pub initial_residuals: Vec<f64>,
    /// Final relative residual norms `R / R0`.
    pub final_residuals: Vec<f64>,
    /// True if the tolerance criterion ended the run.
    pub converged: bool,
    /// Wall-clock seconds spent in the step loop.
    pub wall_time: f64,
}

/// Step identification passed to run callbacks.
#[derive(Clone, Copy, Debug)]
pub struct StepInfo {
    /// Completed step count.
    pub step: usize,
    /// Simulated time.
    pub time: f64,
}

/// The explicit finite-volume solver driver.
pub struct FvSolver<P: Physics, T: Transport> {
    physics: P,
    transport: T,
    config: SolverConfig,
}

impl<P: Physics, T: Transport> FvSolver<P, T> {
    /// Create a driver with default options.
    pub fn new(physics: P, transport: T) -> Self {
        Self {
            physics,
            transport,
            config: SolverConfig::default(),
        }
    }

    /// Replace the driver options.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// The problem binding.
    pub fn physics(&self) -> &P {
        &self.physics
    }

    /// The driver options.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// This rank's index.
    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    /// Fail fast on configuration errors before entering the step loop.
    fn validate(&mut self, mesh: &Mesh2D, exchanger: &HaloExchanger) -> Result<(), SolverError> {
        let vars = self.physics.n_vars();
        let names = self.physics.var_names().len();
        if vars != names {
            return Err(SolverError::VarNamesMismatch { vars, names });
        }
        let known = self.physics.boundary_names().len();
        for binding in &mesh.boundary {
            if binding.kernel >= known {
                return Err(SolverError::UnknownBoundaryKernel {
                    kernel: binding.kernel,
                    known,
                });
            }
        }
        mesh.validate()?;
        exchanger.validate(&mut self.transport)?;
        Ok(())
    }

    /// Run to completion, discarding intermediate output.
    pub fn run(&mut self, mesh: &Mesh2D) -> Result<(SolverState, SolverResult), SolverError> {
        self.run_with_callback(mesh, |_, _| {})
    }

    /// Run to completion, invoking `callback` at the configured time-series
    /// interval and once after the final step.
    pub fn run_with_callback<F>(
        &mut self,
        mesh: &Mesh2D,
        mut callback: F,
    ) -> Result<(SolverState, SolverResult), SolverError>
    where
        F: FnMut(StepInfo, &SolverState),
    {
        let n_vars = self.physics.n_vars();
        let flags = self.physics.flags();

        let mut exchanger = HaloExchanger::new(mesh, n_vars);
        self.validate(mesh, &exchanger)?;

        let mut state = SolverState::new(n_vars, mesh);
        self.physics.initial_solution(&mut state.q, mesh);

        info!(
            "starting run: rank {}/{}, {} owned cells, {} stage(s), max {} steps",
            self.transport.rank(),
            self.transport.size(),
            mesh.n_owned_cells(),
            self.config.stages.n_stages(),
            self.config.max_steps
        );

        if self.config.print_residuals && self.transport.rank() == 0 {
            let names = self
                .physics
                .var_names()
                .iter()
                .map(|name| format!("R({name})"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("step, time, {names}");
        }

        let start = Instant::now();
        let print_interval = self.config.print_interval.max(1);
        let mut step = 0usize;
        let mut time = 0.0f64;
        let mut r0 = vec![1.0; n_vars];
        let mut r_rel = vec![1.0; n_vars];
        let mut next_emit = self.config.time_series_interval;
        let mut converged = false;

        loop {
            let r_max = if step > 0 {
                r_rel.iter().fold(0.0f64, |m, &r| m.max(r))
            } else {
                1.0
            };
            if r_max < self.config.tolerance {
                converged = true;
                break;
            }
            if step >= self.config.max_steps || time >= self.config.max_time {
                break;
            }
            if let Some(limit) = self.config.max_wall_time {
                if start.elapsed() >= limit {
                    info!("wall-time limit reached after {step} steps");
                    break;
                }
            }

            // Ghost states, then the per-cell time step.
            apply_boundaries(&mut state.q, mesh, &self.physics);
            self.physics.calc_dt(&mut state.dt, &state.q, mesh);
            exchanger.exchange(&mut state.dt, &mut self.transport)?;
            if flags.global_dt {
                let local_min = state.dt.min();
                let global_min = reduce_min(local_min, &mut self.transport)?;
                state.dt.fill(global_min);
            }

            // Multi-stage update of the stage vector.
            state.q_stage.copy_from(&state.q);
            for s in 0..self.config.stages.n_stages() {
                let alpha = self.config.stages.alpha[s];
                if self.config.refresh_bounds_each_stage {
                    apply_boundaries(&mut state.q_stage, mesh, &self.physics);
                }

                if flags.calc_gradients {
                    compute_gradients(&mut state.gx, &mut state.gy, &state.q_stage, mesh);
                    exchanger.exchange(&mut state.gx, &mut self.transport)?;
                    exchanger.exchange(&mut state.gy, &mut self.transport)?;
                }
                if flags.calc_limiters {
                    compute_limiters(
                        &mut state.limiter,
                        &mut state.qmin,
                        &mut state.qmax,
                        &state.q_stage,
                        &state.gx,
                        &state.gy,
                        mesh,
                        &self.physics,
                    );
                    exchanger.exchange(&mut state.limiter, &mut self.transport)?;
                }
                compute_time_derivatives(
                    &mut state.qt,
                    &state.q_stage,
                    &state.gx,
                    &state.gy,
                    &state.limiter,
                    mesh,
                    &self.physics,
                );
                if flags.smooth_residuals {
                    smooth_time_derivatives(&mut state.qt, &mut state.smooth, mesh);
                }

                update_stage(&mut state.q_stage, &state.q, &state.qt, &state.dt, alpha);
                exchanger.exchange(&mut state.q_stage, &mut self.transport)?;
            }
            state.q.copy_from(&state.q_stage);

            // Residual bookkeeping on the final stage's qt.
            if step == 0 {
                let partial = residual_partial(&state.qt, mesh);
                r0 = reduce_sum(&partial, &mut self.transport)?;
                for value in r0.iter_mut() {
                    *value = value.sqrt();
                }
                r_rel.fill(1.0);
                debug!("initial residuals: {r0:?}");
            } else if step % print_interval == 0 || self.config.tolerance > 1.01e-16 {
                let partial = residual_partial(&state.qt, mesh);
                let r_abs = reduce_sum(&partial, &mut self.transport)?;
                for (rel, (&abs, &base)) in r_rel.iter_mut().zip(r_abs.iter().zip(&r0)) {
                    *rel = abs.sqrt() / base.max(f64::MIN_POSITIVE);
                }
                if r_rel.iter().any(|r| !r.is_finite()) {
                    return Err(SolverError::NonFinite { step });
                }
                if step % print_interval == 0 {
                    debug!("step {step}: residuals {r_rel:?}");
                    if self.config.print_residuals && self.transport.rank() == 0 {
                        let values = r_rel
                            .iter()
                            .map(|r| format!("{r:.6e}"))
                            .collect::<Vec<_>>()
                            .join(", ");
                        println!("{step}, {time:.6e}, {values}");
                    }
                }
            }

            step += 1;
            if flags.global_dt {
                time += state.dt.value(0, 0);
            }

            if let Some(emit_at) = next_emit {
                if time >= emit_at {
                    callback(StepInfo { step, time }, &state);
                    next_emit = Some(emit_at + self.config.time_series_interval.unwrap());
                }
            }
        }

        let wall_time = start.elapsed().as_secs_f64();
        info!(
            "run finished: {step} steps, t = {time:.6e}, converged = {converged}, \
             wall = {wall_time:.3}s"
        );
        callback(StepInfo { step, time }, &state);

        Ok((
            state,
            SolverResult {
                steps: step,
                time,
                initial_residuals: r0,
                final_residuals: r_rel,
                converged,
                wall_time,
            },
        ))
    }
}

/// One low-storage stage: `q_stage = q + qt * dt * alpha`, elementwise.
///
/// Ghost entries ride along with `qt = 0`, so they keep the start-of-step
/// values until the boundary applicator or halo exchange rewrites them.
fn update_stage(q_stage: &mut CellField, q: &CellField, qt: &CellField, dt: &CellField, alpha: f64) {
    let out = q_stage.as_mut_slice();
    for (idx, value) in out.iter_mut().enumerate() {
        *value = q.as_slice()[idx] + qt.as_slice()[idx] * dt.as_slice()[idx] * alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh2D;
    use crate::parallel::SerialTransport;
    use crate::physics::euler::{BC_WALL, EULER_VARS};
    use crate::physics::{EulerConfig, EulerPhysics};

    fn quiet_config(max_steps: usize) -> SolverConfig {
        SolverConfig::default().with_max_steps(max_steps).quiet()
    }

    #[test]
    fn test_uniform_flow_stays_uniform() {
        let physics = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.0, 0.0, 1.0);
        let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 4, 4, BC_WALL);
        let mut solver =
            FvSolver::new(physics, SerialTransport).with_config(quiet_config(10));
        let (state, result) = solver.run(&mesh).expect("run");

        assert_eq!(result.steps, 10);
        for cell in mesh.owned_cells() {
            for k in 0..EULER_VARS {
                let expected = solver.physics().free_stream[k];
                assert!(
                    (state.q.value(cell, k) - expected).abs() < 1e-12,
                    "cell {cell} var {k} drifted to {}",
                    state.q.value(cell, k)
                );
            }
        }
    }

    #[test]
    fn test_stage_refresh_matches_on_steady_state() {
        // On a steady uniform state the ghost refresh policy cannot change
        // anything; both settings must produce identical solutions.
        let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 3, 3, BC_WALL);
        let run = |refresh: bool| {
            let physics =
                EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.2, 0.1, 1.0);
            let config = quiet_config(5).with_stage_bounds_refresh(refresh);
            let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
            solver.run(&mesh).expect("run").0
        };
        let plain = run(false);
        let refreshed = run(true);
        for cell in mesh.owned_cells() {
            for k in 0..EULER_VARS {
                assert!(
                    (plain.q.value(cell, k) - refreshed.q.value(cell, k)).abs() < 1e-11,
                    "cell {cell} var {k}"
                );
            }
        }
    }

    #[test]
    fn test_unknown_kernel_rejected_before_stepping() {
        let physics = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.0, 0.0, 1.0);
        // Kernel tag 99 does not exist.
        let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 2, 2, 99);
        let mut solver = FvSolver::new(physics, SerialTransport).with_config(quiet_config(5));
        assert!(matches!(
            solver.run(&mesh),
            Err(SolverError::UnknownBoundaryKernel { kernel: 99, .. })
        ));
    }

    #[test]
    fn test_callback_fires_at_interval_and_end() {
        let physics = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.0, 0.0, 1.0);
        let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 3, 3, BC_WALL);
        let config = quiet_config(20).with_time_series_interval(1e-3);
        let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);

        let mut calls = Vec::new();
        let (_, result) = solver
            .run_with_callback(&mesh, |info, _| calls.push(info.time))
            .expect("run");
        // Interval emissions plus the final call.
        assert!(calls.len() >= 2, "expected emissions, got {calls:?}");
        assert!((calls.last().unwrap() - result.time).abs() < 1e-15);
    }

    #[test]
    fn test_wall_time_bound_stops_run() {
        let physics = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.3, 0.0, 1.0);
        let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 4, 4, BC_WALL);
        let config = quiet_config(usize::MAX)
            .with_tolerance(0.0)
            .with_max_wall_time(Duration::from_millis(50));
        let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
        let (_, result) = solver.run(&mesh).expect("run");
        assert!(!result.converged);
        assert!(result.steps > 0);
    }
}
