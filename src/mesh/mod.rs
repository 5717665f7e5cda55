//! Mesh data model and mesh-file reading.

pub mod gmsh;
mod mesh2d;

pub use gmsh::{read_mesh, read_partitioned_mesh, GmshError};
pub use mesh2d::{BoundaryBinding, ChannelSpec, Edge, Mesh2D, MeshError};
