//! Output writers.

pub mod vtk;

pub use vtk::{series_path, write_vtu, VtkError};
