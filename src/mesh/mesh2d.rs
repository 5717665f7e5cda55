//! Unstructured 2D mesh container for cell-centered finite volumes.
//!
//! The mesh stores:
//! - Cell geometry (area, centroid) and ownership flags
//! - Edge geometry and the two adjacent cell indices
//! - Boundary-edge bindings (edge index + boundary-kernel tag)
//! - Halo-exchange channel descriptors, one per neighbour rank
//! - Vertex connectivity for the VTU writer (real cells only)
//!
//! Cell index ranges:
//! - `0..n_real_cells`: cells with geometry. Owned cells have
//!   `cell_is_ghost == false`; halo cells mirrored from a neighbour rank are
//!   flagged ghost.
//! - `n_real_cells..n_cells`: boundary ghost cells, written only by the
//!   boundary applicator. Their centroid is the owner centroid mirrored
//!   across the boundary edge.
//!
//! Edge normals are unit vectors pointing from `cells.0` to `cells.1`;
//! boundary edges pair an owned cell with its ghost so the normal points out
//! of the domain.

use thiserror::Error;

/// Error type for mesh construction and validation.
#[derive(Debug, Error)]
pub enum MeshError {
    /// An edge references a cell outside the mesh.
    #[error("edge {edge} references cell {cell} out of range ({n_cells} cells)")]
    EdgeCellOutOfRange {
        edge: usize,
        cell: usize,
        n_cells: usize,
    },

    /// An edge normal is not a unit vector.
    #[error("edge {edge} normal ({nx}, {ny}) is not a unit vector")]
    NonUnitNormal { edge: usize, nx: f64, ny: f64 },

    /// An edge has non-positive or non-finite length.
    #[error("edge {edge} has invalid length {length}")]
    InvalidEdgeLength { edge: usize, length: f64 },

    /// An owned cell has non-positive area.
    #[error("cell {cell} has non-positive area {area}")]
    NonPositiveArea { cell: usize, area: f64 },

    /// A boundary binding references an invalid edge.
    #[error("boundary binding {binding} references edge {edge} out of range")]
    InvalidBoundaryEdge { binding: usize, edge: usize },

    /// A boundary edge does not pair an owned cell with a ghost.
    #[error("boundary edge {edge} must pair an owned cell with a ghost cell")]
    BoundaryEdgeNotGhost { edge: usize },

    /// A channel references a cell outside the mesh.
    #[error("channel to rank {peer} references cell {cell} out of range")]
    ChannelCellOutOfRange { peer: usize, cell: usize },

    /// A channel receive list contains a non-ghost cell.
    #[error("channel to rank {peer} receives into non-ghost cell {cell}")]
    ChannelRecvNotGhost { peer: usize, cell: usize },
}

/// An edge between two cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    /// Adjacent cell indices `(i, j)`.
    pub cells: (usize, usize),
    /// Edge length.
    pub length: f64,
    /// Unit normal pointing from `cells.0` to `cells.1`.
    pub normal: (f64, f64),
    /// Edge midpoint.
    pub center: (f64, f64),
}

/// Binding of a boundary edge to a boundary-kernel tag.
///
/// The tag is a small integer resolved from the mesh's boundary name at load
/// time; it indexes the problem binding's kernel table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryBinding {
    /// Edge index into [`Mesh2D::edges`].
    pub edge: usize,
    /// Boundary-kernel tag.
    pub kernel: usize,
}

/// Halo-exchange descriptor for one neighbour rank.
///
/// The pair (send list on rank R to rank S, receive list on rank S from
/// rank R) must describe the same cells in the same order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Neighbour rank.
    pub peer: usize,
    /// Owned cells whose values are sent to the peer.
    pub send_cells: Vec<usize>,
    /// Ghost cells overwritten with the peer's values.
    pub recv_cells: Vec<usize>,
}

/// Unstructured 2D finite-volume mesh, static for one run.
#[derive(Clone, Debug)]
pub struct Mesh2D {
    /// Total cell count, boundary ghosts included.
    pub n_cells: usize,
    /// Cells with geometry (owned + halo).
    pub n_real_cells: usize,
    /// Cell areas.
    pub cell_area: Vec<f64>,
    /// Cell centroid x-coordinates.
    pub cell_center_x: Vec<f64>,
    /// Cell centroid y-coordinates.
    pub cell_center_y: Vec<f64>,
    /// Ghost flag; true for halo cells and boundary ghosts.
    pub cell_is_ghost: Vec<bool>,
    /// Edge list.
    pub edges: Vec<Edge>,
    /// Boundary-edge bindings.
    pub boundary: Vec<BoundaryBinding>,
    /// Halo-exchange channels, one per neighbour rank.
    pub channels: Vec<ChannelSpec>,
    /// Vertex coordinates, for output only.
    pub vertices: Vec<(f64, f64)>,
    /// CSR offsets into `cell_node_indices`, one entry per real cell plus one.
    pub cell_node_offsets: Vec<usize>,
    /// CSR vertex indices of each real cell, counter-clockwise.
    pub cell_node_indices: Vec<usize>,
}

impl Mesh2D {
    /// True for cells updated by the stage loop on this rank.
    #[inline]
    pub fn is_owned(&self, cell: usize) -> bool {
        cell < self.n_real_cells && !self.cell_is_ghost[cell]
    }

    /// Iterator over owned, non-ghost cells.
    pub fn owned_cells(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_real_cells).filter(move |&c| !self.cell_is_ghost[c])
    }

    /// Number of owned cells.
    pub fn n_owned_cells(&self) -> usize {
        self.owned_cells().count()
    }

    /// Validate geometry, topology and channel descriptors.
    ///
    /// Called once at driver entry; configuration errors fail fast here
    /// rather than surfacing as garbage mid-run.
    pub fn validate(&self) -> Result<(), MeshError> {
        for (e, edge) in self.edges.iter().enumerate() {
            let (i, j) = edge.cells;
            for cell in [i, j] {
                if cell >= self.n_cells {
                    return Err(MeshError::EdgeCellOutOfRange {
                        edge: e,
                        cell,
                        n_cells: self.n_cells,
                    });
                }
            }
            if !(edge.length.is_finite() && edge.length > 0.0) {
                return Err(MeshError::InvalidEdgeLength {
                    edge: e,
                    length: edge.length,
                });
            }
            let norm = (edge.normal.0 * edge.normal.0 + edge.normal.1 * edge.normal.1).sqrt();
            if (norm - 1.0).abs() > 1e-12 {
                return Err(MeshError::NonUnitNormal {
                    edge: e,
                    nx: edge.normal.0,
                    ny: edge.normal.1,
                });
            }
        }

        for cell in self.owned_cells() {
            let area = self.cell_area[cell];
            if !(area.is_finite() && area > 0.0) {
                return Err(MeshError::NonPositiveArea { cell, area });
            }
        }

        for (b, binding) in self.boundary.iter().enumerate() {
            if binding.edge >= self.edges.len() {
                return Err(MeshError::InvalidBoundaryEdge {
                    binding: b,
                    edge: binding.edge,
                });
            }
            let (i, j) = self.edges[binding.edge].cells;
            if !self.is_owned(i) || self.is_owned(j) {
                return Err(MeshError::BoundaryEdgeNotGhost { edge: binding.edge });
            }
        }

        for channel in &self.channels {
            for &cell in channel.send_cells.iter().chain(&channel.recv_cells) {
                if cell >= self.n_cells {
                    return Err(MeshError::ChannelCellOutOfRange {
                        peer: channel.peer,
                        cell,
                    });
                }
            }
            for &cell in &channel.recv_cells {
                if !self.cell_is_ghost[cell] {
                    return Err(MeshError::ChannelRecvNotGhost {
                        peer: channel.peer,
                        cell,
                    });
                }
            }
        }

        Ok(())
    }

    /// Create a uniform rectangular mesh of [x0, x1] × [y0, y1] with the same
    /// boundary kernel on all four sides.
    pub fn uniform_rectangle(
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
        nx: usize,
        ny: usize,
        kernel: usize,
    ) -> Self {
        Self::uniform_rectangle_with_sides(x0, x1, y0, y1, nx, ny, [kernel; 4])
    }

    /// Create a uniform rectangular mesh with per-side boundary kernels
    /// `[south, east, north, west]`.
    pub fn uniform_rectangle_with_sides(
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
        nx: usize,
        ny: usize,
        kernels: [usize; 4],
    ) -> Self {
        Self::x_strip(x0, x1, y0, y1, nx, ny, kernels, 0, 1)
    }

    /// Create one rank's piece of a uniform rectangle partitioned into
    /// vertical strips of columns.
    ///
    /// Each rank owns a balanced contiguous block of columns plus one halo
    /// column per neighbour rank, with symmetric halo channels. This mirrors
    /// the contract of the partitioned mesh-file reader and is the reference
    /// partition used by the domain-decomposition tests.
    ///
    /// Kernels are `[south, east, north, west]`; the west kernel applies only
    /// on rank 0 and the east kernel only on the last rank.
    pub fn x_strip(
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
        nx: usize,
        ny: usize,
        kernels: [usize; 4],
        rank: usize,
        n_ranks: usize,
    ) -> Self {
        assert!(nx > 0 && ny > 0, "need at least one cell in each direction");
        assert!(x1 > x0 && y1 > y0, "invalid domain bounds");
        assert!(n_ranks >= 1 && rank < n_ranks, "invalid rank");
        assert!(
            nx >= n_ranks,
            "cannot split {} columns across {} ranks",
            nx,
            n_ranks
        );

        let dx = (x1 - x0) / nx as f64;
        let dy = (y1 - y0) / ny as f64;

        // Balanced column split: base columns each, remainder to low ranks.
        let base = nx / n_ranks;
        let rem = nx % n_ranks;
        let cols = base + usize::from(rank < rem);
        let c0: usize = (0..rank).map(|r| base + usize::from(r < rem)).sum();
        let c1 = c0 + cols;

        let halo_left = rank > 0;
        let halo_right = rank + 1 < n_ranks;

        let n_owned = cols * ny;
        let n_halo = usize::from(halo_left) * ny + usize::from(halo_right) * ny;
        let n_real = n_owned + n_halo;

        // Local index of global column `gi`, row `j`.
        let halo_left_base = n_owned;
        let halo_right_base = n_owned + usize::from(halo_left) * ny;
        let local_id = |gi: isize, j: usize| -> Option<usize> {
            if gi >= c0 as isize && (gi as usize) < c1 {
                Some(j * cols + (gi as usize - c0))
            } else if halo_left && gi == c0 as isize - 1 {
                Some(halo_left_base + j)
            } else if halo_right && gi == c1 as isize {
                Some(halo_right_base + j)
            } else {
                None
            }
        };

        let center_of = |gi: isize, j: usize| -> (f64, f64) {
            (
                x0 + (gi as f64 + 0.5) * dx,
                y0 + (j as f64 + 0.5) * dy,
            )
        };

        let mut cell_area = vec![dx * dy; n_real];
        let mut cell_center_x = vec![0.0; n_real];
        let mut cell_center_y = vec![0.0; n_real];
        let mut cell_is_ghost = vec![false; n_real];

        for j in 0..ny {
            for gi in c0..c1 {
                let id = local_id(gi as isize, j).unwrap();
                let (cx, cy) = center_of(gi as isize, j);
                cell_center_x[id] = cx;
                cell_center_y[id] = cy;
            }
        }
        if halo_left {
            for j in 0..ny {
                let id = halo_left_base + j;
                let (cx, cy) = center_of(c0 as isize - 1, j);
                cell_center_x[id] = cx;
                cell_center_y[id] = cy;
                cell_is_ghost[id] = true;
            }
        }
        if halo_right {
            for j in 0..ny {
                let id = halo_right_base + j;
                let (cx, cy) = center_of(c1 as isize, j);
                cell_center_x[id] = cx;
                cell_center_y[id] = cy;
                cell_is_ghost[id] = true;
            }
        }

        // Interior edges. Vertical edges are oriented low-to-high column so
        // a shared edge carries identical geometry on both of its ranks.
        let mut edges = Vec::new();
        let gi_lo = if halo_left { c0 as isize - 1 } else { c0 as isize };
        let gi_hi = if halo_right { c1 as isize } else { c1 as isize - 1 };
        for j in 0..ny {
            let mut gi = gi_lo;
            while gi < gi_hi {
                let left = local_id(gi, j).unwrap();
                let right = local_id(gi + 1, j).unwrap();
                edges.push(Edge {
                    cells: (left, right),
                    length: dy,
                    normal: (1.0, 0.0),
                    center: (x0 + (gi + 1) as f64 * dx, y0 + (j as f64 + 0.5) * dy),
                });
                gi += 1;
            }
        }
        for j in 0..ny.saturating_sub(1) {
            for gi in c0..c1 {
                let below = local_id(gi as isize, j).unwrap();
                let above = local_id(gi as isize, j + 1).unwrap();
                edges.push(Edge {
                    cells: (below, above),
                    length: dx,
                    normal: (0.0, 1.0),
                    center: (x0 + (gi as f64 + 0.5) * dx, y0 + (j + 1) as f64 * dy),
                });
            }
        }

        // Boundary edges, each with a mirrored ghost cell appended after the
        // real cells. Order: south, north, then west/east where present.
        let mut boundary = Vec::new();
        let mut push_boundary = |edges: &mut Vec<Edge>,
                                 cell_area: &mut Vec<f64>,
                                 cell_center_x: &mut Vec<f64>,
                                 cell_center_y: &mut Vec<f64>,
                                 cell_is_ghost: &mut Vec<bool>,
                                 owner: usize,
                                 normal: (f64, f64),
                                 length: f64,
                                 center: (f64, f64),
                                 kernel: usize| {
            let ghost = cell_area.len();
            cell_area.push(cell_area[owner]);
            cell_center_x.push(2.0 * center.0 - cell_center_x[owner]);
            cell_center_y.push(2.0 * center.1 - cell_center_y[owner]);
            cell_is_ghost.push(true);
            boundary.push(BoundaryBinding {
                edge: edges.len(),
                kernel,
            });
            edges.push(Edge {
                cells: (owner, ghost),
                length,
                normal,
                center,
            });
        };

        for gi in c0..c1 {
            let owner = local_id(gi as isize, 0).unwrap();
            push_boundary(
                &mut edges,
                &mut cell_area,
                &mut cell_center_x,
                &mut cell_center_y,
                &mut cell_is_ghost,
                owner,
                (0.0, -1.0),
                dx,
                (x0 + (gi as f64 + 0.5) * dx, y0),
                kernels[0],
            );
        }
        for gi in c0..c1 {
            let owner = local_id(gi as isize, ny - 1).unwrap();
            push_boundary(
                &mut edges,
                &mut cell_area,
                &mut cell_center_x,
                &mut cell_center_y,
                &mut cell_is_ghost,
                owner,
                (0.0, 1.0),
                dx,
                (x0 + (gi as f64 + 0.5) * dx, y1),
                kernels[2],
            );
        }
        if c0 == 0 {
            for j in 0..ny {
                let owner = local_id(0, j).unwrap();
                push_boundary(
                    &mut edges,
                    &mut cell_area,
                    &mut cell_center_x,
                    &mut cell_center_y,
                    &mut cell_is_ghost,
                    owner,
                    (-1.0, 0.0),
                    dy,
                    (x0, y0 + (j as f64 + 0.5) * dy),
                    kernels[3],
                );
            }
        }
        if c1 == nx {
            for j in 0..ny {
                let owner = local_id(nx as isize - 1, j).unwrap();
                push_boundary(
                    &mut edges,
                    &mut cell_area,
                    &mut cell_center_x,
                    &mut cell_center_y,
                    &mut cell_is_ghost,
                    owner,
                    (1.0, 0.0),
                    dy,
                    (x1, y0 + (j as f64 + 0.5) * dy),
                    kernels[1],
                );
            }
        }

        // Halo channels, low peer first. Send and receive lists are ordered
        // by row so paired ranks traverse the same cells in the same order.
        let mut channels = Vec::new();
        if halo_left {
            channels.push(ChannelSpec {
                peer: rank - 1,
                send_cells: (0..ny).map(|j| local_id(c0 as isize, j).unwrap()).collect(),
                recv_cells: (0..ny).map(|j| halo_left_base + j).collect(),
            });
        }
        if halo_right {
            channels.push(ChannelSpec {
                peer: rank + 1,
                send_cells: (0..ny)
                    .map(|j| local_id(c1 as isize - 1, j).unwrap())
                    .collect(),
                recv_cells: (0..ny).map(|j| halo_right_base + j).collect(),
            });
        }

        // Vertex grid over the local column span, for output.
        let vc0 = if halo_left { c0 - 1 } else { c0 };
        let vc1 = if halo_right { c1 + 1 } else { c1 };
        let vcols = vc1 - vc0 + 1;
        let mut vertices = Vec::with_capacity(vcols * (ny + 1));
        for j in 0..=ny {
            for gi in vc0..=vc1 {
                vertices.push((x0 + gi as f64 * dx, y0 + j as f64 * dy));
            }
        }
        let vid = |gi: usize, j: usize| j * vcols + (gi - vc0);
        let mut cell_node_offsets = vec![0usize; n_real + 1];
        let mut cell_node_indices = vec![0usize; 4 * n_real];
        let mut fill_nodes = |id: usize, gi: usize, j: usize| {
            cell_node_indices[4 * id] = vid(gi, j);
            cell_node_indices[4 * id + 1] = vid(gi + 1, j);
            cell_node_indices[4 * id + 2] = vid(gi + 1, j + 1);
            cell_node_indices[4 * id + 3] = vid(gi, j + 1);
        };
        for j in 0..ny {
            for gi in c0..c1 {
                fill_nodes(local_id(gi as isize, j).unwrap(), gi, j);
            }
            if halo_left {
                fill_nodes(halo_left_base + j, c0 - 1, j);
            }
            if halo_right {
                fill_nodes(halo_right_base + j, c1, j);
            }
        }
        for (c, offset) in cell_node_offsets.iter_mut().enumerate() {
            *offset = 4 * c;
        }

        let n_cells = cell_area.len();
        Mesh2D {
            n_cells,
            n_real_cells: n_real,
            cell_area,
            cell_center_x,
            cell_center_y,
            cell_is_ghost,
            edges,
            boundary,
            channels,
            vertices,
            cell_node_offsets,
            cell_node_indices,
        }
    }
}
