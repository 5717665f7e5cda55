//! Conservation and steady-state integration tests.
//!
//! These exercise the full driver pipeline: boundary application, time-step
//! computation, the multi-stage update and residual bookkeeping.

use fv_rs::mesh::Mesh2D;
use fv_rs::parallel::SerialTransport;
use fv_rs::physics::euler::{BC_INLET, BC_OUTLET, BC_WALL, EULER_VARS};
use fv_rs::physics::{EulerConfig, EulerPhysics};
use fv_rs::solver::conserved_total;
use fv_rs::state::CellField;
use fv_rs::time::{FvSolver, SolverConfig};
use fv_rs::Physics;

/// A resting pressure/density bump inside a closed box.
fn bumped_state(mesh: &Mesh2D) -> CellField {
    let mut q = CellField::new(EULER_VARS, mesh.n_cells);
    for cell in 0..mesh.n_cells {
        let x = mesh.cell_center_x[cell] - 0.5;
        let y = mesh.cell_center_y[cell] - 0.5;
        let bump = 0.2 * (-20.0 * (x * x + y * y)).exp();
        let state = EulerPhysics::conserved(1.4, 1.0 + bump, 0.0, 0.0, 1.0 + bump);
        q.at_mut(cell).copy_from_slice(&state);
    }
    q
}

/// Physics whose initial condition is the resting bump.
#[derive(Clone)]
struct BumpedEuler(EulerPhysics);

impl Physics for BumpedEuler {
    fn n_vars(&self) -> usize {
        self.0.n_vars()
    }
    fn var_names(&self) -> &[&'static str] {
        self.0.var_names()
    }
    fn flags(&self) -> fv_rs::SolverFlags {
        self.0.flags()
    }
    fn initial_solution(&self, q: &mut CellField, mesh: &Mesh2D) {
        q.copy_from(&bumped_state(mesh));
    }
    fn flux(
        &self,
        f: &mut [f64],
        q_i: &[f64],
        q_j: &[f64],
        recon: &fv_rs::physics::Reconstruction<'_>,
        geom: &fv_rs::physics::EdgeGeometry,
    ) {
        self.0.flux(f, q_i, q_j, recon, geom);
    }
    fn calc_dt(&self, dt: &mut CellField, q: &CellField, mesh: &Mesh2D) {
        self.0.calc_dt(dt, q, mesh);
    }
    fn boundary_names(&self) -> &[&'static str] {
        self.0.boundary_names()
    }
    fn boundary_kernel(&self, kernel: usize, ghost: &mut [f64], interior: &[f64], n: (f64, f64)) {
        self.0.boundary_kernel(kernel, ghost, interior, n);
    }
}

#[test]
fn mass_and_energy_conserved_in_closed_box() {
    // Slip walls exchange no mass and do no work, so density and total
    // energy integrals stay put while the bump sloshes around.
    let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8, BC_WALL);
    let physics = BumpedEuler(EulerPhysics::uniform_flow(
        EulerConfig::default(),
        1.0,
        0.0,
        0.0,
        1.0,
    ));

    let initial_mass = conserved_total(&bumped_state(&mesh), &mesh, 0);
    let initial_energy = conserved_total(&bumped_state(&mesh), &mesh, 3);

    let config = SolverConfig::default().with_max_steps(1000).quiet();
    let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
    let (state, result) = solver.run(&mesh).expect("run");
    assert_eq!(result.steps, 1000);
    assert!(state.q.is_finite());

    let final_mass = conserved_total(&state.q, &mesh, 0);
    let final_energy = conserved_total(&state.q, &mesh, 3);
    assert!(
        ((final_mass - initial_mass) / initial_mass).abs() < 1e-10,
        "mass drifted from {initial_mass} to {final_mass}"
    );
    assert!(
        ((final_energy - initial_energy) / initial_energy).abs() < 1e-10,
        "energy drifted from {initial_energy} to {final_energy}"
    );
}

#[test]
fn uniform_flow_through_channel_stays_constant() {
    // A constant subsonic state compatible with the characteristic
    // inlet/outlet kernels and slip walls is an exact steady state.
    let physics = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.3, 0.0, 1.0);
    let free_stream = physics.free_stream;
    let mesh = Mesh2D::uniform_rectangle_with_sides(
        0.0,
        2.0,
        0.0,
        1.0,
        8,
        4,
        [BC_WALL, BC_OUTLET, BC_WALL, BC_INLET],
    );

    let config = SolverConfig::default().with_max_steps(100).quiet();
    let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
    let (state, _) = solver.run(&mesh).expect("run");

    for cell in mesh.owned_cells() {
        for k in 0..EULER_VARS {
            assert!(
                (state.q.value(cell, k) - free_stream[k]).abs() < 1e-11,
                "cell {cell} var {k}: {} vs {}",
                state.q.value(cell, k),
                free_stream[k]
            );
        }
    }
}

#[test]
fn mach3_channel_flow_stays_uniform() {
    // The forward-step free stream pushed through a straight channel:
    // supersonic characteristic inlet/outlet plus slip walls reproduce the
    // free stream exactly, so the state must not drift.
    let physics = EulerPhysics::mach3_forward_step();
    let free_stream = physics.free_stream;
    let mesh = Mesh2D::uniform_rectangle_with_sides(
        0.0,
        3.0,
        0.0,
        1.0,
        12,
        4,
        [BC_WALL, BC_OUTLET, BC_WALL, BC_INLET],
    );

    let config = SolverConfig::default().with_max_steps(200).quiet();
    let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
    let (state, result) = solver.run(&mesh).expect("run");

    assert!(result.time > 0.0, "global dt must advance simulated time");
    for cell in mesh.owned_cells() {
        for k in 0..EULER_VARS {
            assert!(
                (state.q.value(cell, k) - free_stream[k]).abs() < 1e-10,
                "cell {cell} var {k}: {} vs {}",
                state.q.value(cell, k),
                free_stream[k]
            );
        }
    }
}

#[test]
fn ghost_cells_never_advance() {
    let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 6, 6, BC_WALL);
    let physics = BumpedEuler(EulerPhysics::uniform_flow(
        EulerConfig::default(),
        1.0,
        0.0,
        0.0,
        1.0,
    ));
    let config = SolverConfig::default().with_max_steps(25).quiet();
    let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
    let (state, _) = solver.run(&mesh).expect("run");

    // The final stage's time derivative must vanish on every ghost.
    for cell in 0..mesh.n_cells {
        if !mesh.is_owned(cell) {
            for k in 0..EULER_VARS {
                assert_eq!(state.qt.value(cell, k), 0.0, "ghost {cell} var {k}");
            }
        }
    }
}

#[test]
fn residual_smoothing_stays_stable_and_near_conservative() {
    // Smoothing trades strict conservation for damping: the averaging
    // stencil leaks a little mass at wall-adjacent cells. The drift must
    // stay small over a short run and the solution finite.
    let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 6, 6, BC_WALL);
    let base = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.0, 0.0, 1.0);
    let flags = base.flags.with_smooth_residuals(true);
    let physics = BumpedEuler(base.with_flags(flags));

    let initial_mass = conserved_total(&bumped_state(&mesh), &mesh, 0);
    let config = SolverConfig::default().with_max_steps(50).quiet();
    let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
    let (state, _) = solver.run(&mesh).expect("run");

    assert!(state.q.is_finite());
    let final_mass = conserved_total(&state.q, &mesh, 0);
    assert!(
        ((final_mass - initial_mass) / initial_mass).abs() < 1e-3,
        "smoothed run lost mass: {initial_mass} -> {final_mass}"
    );
}

#[test]
fn second_order_run_stays_finite_and_bounded() {
    // Gradients + limiters + reconstruction on the bump problem: the
    // limiter must keep the solution inside the initial bounds envelope.
    let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8, BC_WALL);
    let base = EulerPhysics::uniform_flow(EulerConfig::default(), 1.0, 0.0, 0.0, 1.0);
    let flags = fv_rs::SolverFlags::second_order().with_global_dt(true);
    let physics = BumpedEuler(base.with_flags(flags));

    let config = SolverConfig::default().with_max_steps(200).quiet();
    let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
    let (state, _) = solver.run(&mesh).expect("run");

    assert!(state.q.is_finite());
    for cell in mesh.owned_cells() {
        let rho = state.q.value(cell, 0);
        assert!(rho > 0.5 && rho < 1.5, "density {rho} out of envelope");
        // Limiters from the last stage stay in range.
        for k in 0..EULER_VARS {
            let lim = state.limiter.value(cell, k);
            assert!((0.0..=1.0).contains(&lim), "limiter {lim} out of range");
        }
    }
}
