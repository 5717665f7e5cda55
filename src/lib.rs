//! # fv-rs
//!
//! A distributed finite-volume solver for hyperbolic conservation laws on
//! unstructured two-dimensional meshes.
//!
//! The crate provides the explicit time-integration engine and everything
//! it consumes:
//! - Mesh data model with halo-exchange descriptors ([`mesh`])
//! - Green-Gauss gradients and Venkatakrishnan-style limiters ([`solver`])
//! - Edge-loop flux assembly against a pluggable problem binding
//!   ([`physics`])
//! - Low-storage multi-stage time integration with residual-based
//!   termination ([`time`])
//! - Rank-to-rank transports, halo exchange and reductions ([`parallel`])
//! - VTU output for ParaView ([`io`])
//!
//! Parallelism is process-level domain decomposition over message passing:
//! one OS thread per rank, ghost cells kept consistent through the halo
//! exchanger. The in-process [`parallel::LocalCluster`] runs multi-rank
//! configurations inside one process for testing; the `mpi` feature adds an
//! rsmpi-backed transport for real deployments.
//!
//! # Example
//!
//! ```
//! use fv_rs::mesh::Mesh2D;
//! use fv_rs::parallel::SerialTransport;
//! use fv_rs::physics::euler::BC_WALL_COPY;
//! use fv_rs::physics::EulerPhysics;
//! use fv_rs::time::{FvSolver, SolverConfig};
//!
//! let physics = EulerPhysics::sod_shock_tube();
//! let mesh = Mesh2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 20, 1, BC_WALL_COPY);
//! let config = SolverConfig::default().with_max_steps(10).quiet();
//! let mut solver = FvSolver::new(physics, SerialTransport).with_config(config);
//! let (state, result) = solver.run(&mesh).unwrap();
//! assert_eq!(result.steps, 10);
//! assert!(state.q.is_finite());
//! ```

pub mod io;
pub mod mesh;
pub mod parallel;
pub mod physics;
pub mod solver;
pub mod state;
pub mod time;

pub use mesh::{Mesh2D, MeshError};
pub use parallel::{HaloExchanger, LocalCluster, SerialTransport, Transport, TransportError};
pub use physics::{EulerPhysics, Physics, SolverFlags};
pub use state::{CellField, SolverState};
pub use time::{FvSolver, SolverConfig, SolverError, SolverResult, StageScheme};
