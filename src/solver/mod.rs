//! Spatial discretization kernels: gradients, limiters, flux assembly and
//! residual norms.

mod gradients;
mod limiters;
mod residuals;
mod rhs;

pub use gradients::{compute_gradients, gradient_for_diffusion};
pub use limiters::compute_limiters;
pub use residuals::{conserved_total, residual_partial};
pub use rhs::{apply_boundaries, compute_time_derivatives, smooth_time_derivatives};
