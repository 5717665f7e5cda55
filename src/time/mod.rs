//! Time integration: stage schemes and the outer driver loop.

mod driver;
mod rk;

pub use driver::{FvSolver, SolverConfig, SolverError, SolverResult, StepInfo};
pub use rk::StageScheme;
