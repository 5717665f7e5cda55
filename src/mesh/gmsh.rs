//! Gmsh mesh file reader.
//!
//! Reads Gmsh MSH format version 2.2 (ASCII), one file per rank, named
//! `<base>_<rank+1>.msh`. Supported element types:
//! - 2 = Triangle (3-node cell)
//! - 3 = Quadrilateral (4-node cell)
//! - 1 = Line (2-node boundary side, tagged with a physical name)
//!
//! Every boundary side of the cell set must be covered by a tagged line.
//! Ordinary physical names bind the side to a boundary kernel, resolved to a
//! small integer tag through the caller-supplied resolver. Names of the form
//! `comm:<rank>` mark inter-rank sides instead: each such side produces a
//! mirrored halo ghost cell and an entry in the channel of the named peer.
//!
//! Channel ordering contract: paired ranks must list their shared `comm`
//! lines in the same order. Partitioning tools that write both files from
//! one global traversal satisfy this by construction; the channel sizes are
//! re-validated against the peer at solver startup.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::mesh2d::{BoundaryBinding, ChannelSpec, Edge, Mesh2D, MeshError};

/// Error type for Gmsh mesh reading.
#[derive(Debug, Error)]
pub enum GmshError {
    /// File could not be opened or read.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid file content.
    #[error("parse error: {0}")]
    Parse(String),

    /// Unsupported mesh format version.
    #[error("unsupported Gmsh version: {0}")]
    UnsupportedVersion(String),

    /// Unsupported element type.
    #[error("unsupported element type: {0}")]
    UnsupportedElement(i32),

    /// Missing required section.
    #[error("missing section: {0}")]
    MissingSection(&'static str),

    /// A boundary line carries a physical name the problem does not define.
    #[error("unknown boundary name: {0:?}")]
    UnknownBoundary(String),

    /// A cell side on the domain boundary has no tagged line.
    #[error("cell {cell} has an untagged boundary side")]
    UntaggedBoundarySide { cell: usize },

    /// The assembled mesh failed validation.
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Read one rank's mesh file `<base>_<rank+1>.msh`.
///
/// `resolve` maps an ordinary boundary physical name to the problem's
/// boundary-kernel tag.
pub fn read_partitioned_mesh(
    base: &Path,
    rank: usize,
    resolve: impl Fn(&str) -> Option<usize>,
) -> Result<Mesh2D, GmshError> {
    let mut path = base.as_os_str().to_owned();
    path.push(format!("_{}.msh", rank + 1));
    read_mesh(Path::new(&path), resolve)
}

/// Read a Gmsh 2.2 ASCII mesh file.
pub fn read_mesh(
    path: &Path,
    resolve: impl Fn(&str) -> Option<usize>,
) -> Result<Mesh2D, GmshError> {
    let file = File::open(path).map_err(|source| GmshError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut lines = reader.lines().map(|line| {
        line.map_err(|source| GmshError::Io {
            path: path.to_path_buf(),
            source,
        })
    });

    let mut physical_names: HashMap<i32, String> = HashMap::new();
    let mut nodes: Vec<(f64, f64)> = Vec::new();
    let mut node_ids: HashMap<usize, usize> = HashMap::new();
    let mut cells: Vec<Vec<usize>> = Vec::new();
    let mut tagged_lines: Vec<([usize; 2], i32)> = Vec::new();

    while let Some(line) = lines.next() {
        let line = line?;
        match line.trim() {
            "$MeshFormat" => parse_mesh_format(&mut lines)?,
            "$PhysicalNames" => physical_names = parse_physical_names(&mut lines)?,
            "$Nodes" => {
                let parsed = parse_nodes(&mut lines)?;
                nodes = parsed.0;
                node_ids = parsed.1;
            }
            "$Elements" => {
                let parsed = parse_elements(&mut lines, &node_ids)?;
                cells = parsed.0;
                tagged_lines = parsed.1;
            }
            _ => {}
        }
    }

    if nodes.is_empty() {
        return Err(GmshError::MissingSection("Nodes"));
    }
    if cells.is_empty() {
        return Err(GmshError::MissingSection("Elements"));
    }

    build_mesh(nodes, cells, tagged_lines, physical_names, resolve)
}

fn parse_mesh_format(
    lines: &mut impl Iterator<Item = Result<String, GmshError>>,
) -> Result<(), GmshError> {
    let header = lines
        .next()
        .ok_or(GmshError::MissingSection("MeshFormat"))??;
    let version = header
        .split_whitespace()
        .next()
        .ok_or_else(|| GmshError::Parse("empty MeshFormat line".into()))?;
    if !version.starts_with("2.") {
        return Err(GmshError::UnsupportedVersion(version.to_string()));
    }
    skip_to_section_end(lines, "$EndMeshFormat")
}

fn parse_physical_names(
    lines: &mut impl Iterator<Item = Result<String, GmshError>>,
) -> Result<HashMap<i32, String>, GmshError> {
    let count: usize = next_count(lines, "PhysicalNames")?;
    let mut names = HashMap::with_capacity(count);
    for _ in 0..count {
        let line = lines
            .next()
            .ok_or_else(|| GmshError::Parse("truncated PhysicalNames".into()))??;
        let mut parts = line.trim().splitn(3, ' ');
        let _dim: i32 = parse_field(parts.next(), "physical dimension")?;
        let id: i32 = parse_field(parts.next(), "physical id")?;
        let name = parts
            .next()
            .ok_or_else(|| GmshError::Parse("missing physical name".into()))?
            .trim()
            .trim_matches('"')
            .to_string();
        names.insert(id, name);
    }
    skip_to_section_end(lines, "$EndPhysicalNames")?;
    Ok(names)
}

type ParsedNodes = (Vec<(f64, f64)>, HashMap<usize, usize>);

fn parse_nodes(
    lines: &mut impl Iterator<Item = Result<String, GmshError>>,
) -> Result<ParsedNodes, GmshError> {
    let count: usize = next_count(lines, "Nodes")?;
    let mut coords = Vec::with_capacity(count);
    let mut ids = HashMap::with_capacity(count);
    for _ in 0..count {
        let line = lines
            .next()
            .ok_or_else(|| GmshError::Parse("truncated Nodes".into()))??;
        let mut parts = line.split_whitespace();
        let id: usize = parse_field(parts.next(), "node id")?;
        let x: f64 = parse_field(parts.next(), "node x")?;
        let y: f64 = parse_field(parts.next(), "node y")?;
        ids.insert(id, coords.len());
        coords.push((x, y));
    }
    skip_to_section_end(lines, "$EndNodes")?;
    Ok((coords, ids))
}

type ParsedElements = (Vec<Vec<usize>>, Vec<([usize; 2], i32)>);

fn parse_elements(
    lines: &mut impl Iterator<Item = Result<String, GmshError>>,
    node_ids: &HashMap<usize, usize>,
) -> Result<ParsedElements, GmshError> {
    let count: usize = next_count(lines, "Elements")?;
    let mut cells = Vec::new();
    let mut tagged_lines = Vec::new();
    for _ in 0..count {
        let line = lines
            .next()
            .ok_or_else(|| GmshError::Parse("truncated Elements".into()))??;
        let mut parts = line.split_whitespace();
        let _id: usize = parse_field(parts.next(), "element id")?;
        let elem_type: i32 = parse_field(parts.next(), "element type")?;
        let n_tags: usize = parse_field(parts.next(), "element tag count")?;
        let mut physical = 0;
        for t in 0..n_tags {
            let tag: i32 = parse_field(parts.next(), "element tag")?;
            if t == 0 {
                physical = tag;
            }
        }
        let node = |part: Option<&str>| -> Result<usize, GmshError> {
            let id: usize = parse_field(part, "element node")?;
            node_ids
                .get(&id)
                .copied()
                .ok_or_else(|| GmshError::Parse(format!("element references unknown node {id}")))
        };
        match elem_type {
            1 => {
                let a = node(parts.next())?;
                let b = node(parts.next())?;
                tagged_lines.push(([a, b], physical));
            }
            2 => {
                cells.push(vec![node(parts.next())?, node(parts.next())?, node(parts.next())?]);
            }
            3 => {
                cells.push(vec![
                    node(parts.next())?,
                    node(parts.next())?,
                    node(parts.next())?,
                    node(parts.next())?,
                ]);
            }
            15 => {} // isolated point, carries no cell or boundary data
            other => return Err(GmshError::UnsupportedElement(other)),
        }
    }
    skip_to_section_end(lines, "$EndElements")?;
    Ok((cells, tagged_lines))
}

fn next_count(
    lines: &mut impl Iterator<Item = Result<String, GmshError>>,
    section: &'static str,
) -> Result<usize, GmshError> {
    let line = lines.next().ok_or(GmshError::MissingSection(section))??;
    line.trim()
        .parse()
        .map_err(|_| GmshError::Parse(format!("invalid {section} count: {line:?}")))
}

fn parse_field<T: std::str::FromStr>(
    part: Option<&str>,
    what: &str,
) -> Result<T, GmshError> {
    part.ok_or_else(|| GmshError::Parse(format!("missing {what}")))?
        .parse()
        .map_err(|_| GmshError::Parse(format!("invalid {what}: {part:?}")))
}

fn skip_to_section_end(
    lines: &mut impl Iterator<Item = Result<String, GmshError>>,
    end: &'static str,
) -> Result<(), GmshError> {
    for line in lines {
        if line?.trim() == end {
            return Ok(());
        }
    }
    Err(GmshError::Parse(format!("missing {end}")))
}

/// Signed area and centroid of a simple polygon.
fn polygon_geometry(nodes: &[usize], coords: &[(f64, f64)]) -> (f64, (f64, f64)) {
    let n = nodes.len();
    let mut signed = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for k in 0..n {
        let (x0, y0) = coords[nodes[k]];
        let (x1, y1) = coords[nodes[(k + 1) % n]];
        let cross = x0 * y1 - x1 * y0;
        signed += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    signed *= 0.5;
    let inv = 1.0 / (6.0 * signed);
    (signed, (cx * inv, cy * inv))
}

fn build_mesh(
    coords: Vec<(f64, f64)>,
    mut cells: Vec<Vec<usize>>,
    tagged_lines: Vec<([usize; 2], i32)>,
    physical_names: HashMap<i32, String>,
    resolve: impl Fn(&str) -> Option<usize>,
) -> Result<Mesh2D, GmshError> {
    let n_interior = cells.len();

    let mut cell_area = Vec::with_capacity(n_interior);
    let mut cell_center_x = Vec::with_capacity(n_interior);
    let mut cell_center_y = Vec::with_capacity(n_interior);
    for cell in cells.iter_mut() {
        let (signed, centroid) = polygon_geometry(cell, &coords);
        if signed < 0.0 {
            cell.reverse();
        }
        cell_area.push(signed.abs());
        cell_center_x.push(centroid.0);
        cell_center_y.push(centroid.1);
    }

    // Pair cell sides into interior edges; leftovers are boundary sides.
    let mut edges: Vec<Edge> = Vec::new();
    let mut open_sides: HashMap<(usize, usize), (usize, [usize; 2])> = HashMap::new();
    for (c, cell) in cells.iter().enumerate() {
        let n = cell.len();
        for k in 0..n {
            let a = cell[k];
            let b = cell[(k + 1) % n];
            let key = (a.min(b), a.max(b));
            if let Some((first_cell, first_side)) = open_sides.remove(&key) {
                edges.push(side_edge(first_cell, c, first_side, &coords));
            } else {
                open_sides.insert(key, (c, [a, b]));
            }
        }
    }

    // Match the remaining sides against tagged boundary lines.
    let mut line_tags: HashMap<(usize, usize), i32> = HashMap::with_capacity(tagged_lines.len());
    for ([a, b], physical) in &tagged_lines {
        line_tags.insert((*a.min(b), *a.max(b)), *physical);
    }

    struct PendingGhost {
        owner: usize,
        side: [usize; 2],
        physical: i32,
    }
    let mut named_sides: Vec<PendingGhost> = Vec::new();
    let mut comm_sides: Vec<(usize, PendingGhost)> = Vec::new();
    // Traverse in the file's line order so channel ordering is reproducible.
    for ([a, b], physical) in &tagged_lines {
        let key = (*a.min(b), *a.max(b));
        if let Some((owner, side)) = open_sides.remove(&key) {
            let name = physical_names
                .get(physical)
                .ok_or_else(|| GmshError::UnknownBoundary(format!("physical {physical}")))?;
            let pending = PendingGhost {
                owner,
                side,
                physical: *physical,
            };
            match name.strip_prefix("comm:") {
                Some(peer) => {
                    let peer: usize = peer
                        .parse()
                        .map_err(|_| GmshError::UnknownBoundary(name.clone()))?;
                    comm_sides.push((peer, pending));
                }
                None => named_sides.push(pending),
            }
        }
    }
    if let Some((&_key, &(cell, _))) = open_sides.iter().next() {
        return Err(GmshError::UntaggedBoundarySide { cell });
    }

    // Halo ghost cells first (they carry geometry), then boundary ghosts.
    let mut cell_is_ghost = vec![false; n_interior];
    let mut channels: Vec<ChannelSpec> = Vec::new();
    let mut mirror_ghost = |owner: usize,
                            side: &[usize; 2],
                            cell_area: &mut Vec<f64>,
                            cell_center_x: &mut Vec<f64>,
                            cell_center_y: &mut Vec<f64>,
                            cell_is_ghost: &mut Vec<bool>|
     -> usize {
        let (ax, ay) = coords[side[0]];
        let (bx, by) = coords[side[1]];
        let (mx, my) = (0.5 * (ax + bx), 0.5 * (ay + by));
        let ghost = cell_area.len();
        cell_area.push(cell_area[owner]);
        cell_center_x.push(2.0 * mx - cell_center_x[owner]);
        cell_center_y.push(2.0 * my - cell_center_y[owner]);
        cell_is_ghost.push(true);
        ghost
    };

    let mut comm_edges: Vec<Edge> = Vec::new();
    for (peer, pending) in &comm_sides {
        let ghost = mirror_ghost(
            pending.owner,
            &pending.side,
            &mut cell_area,
            &mut cell_center_x,
            &mut cell_center_y,
            &mut cell_is_ghost,
        );
        comm_edges.push(ghost_edge(pending.owner, ghost, &pending.side, &coords));
        match channels.iter_mut().find(|c| c.peer == *peer) {
            Some(channel) => {
                channel.send_cells.push(pending.owner);
                channel.recv_cells.push(ghost);
            }
            None => channels.push(ChannelSpec {
                peer: *peer,
                send_cells: vec![pending.owner],
                recv_cells: vec![ghost],
            }),
        }
    }
    channels.sort_by_key(|c| c.peer);
    let n_real = cell_area.len();
    edges.extend(comm_edges);

    let mut boundary = Vec::with_capacity(named_sides.len());
    for pending in &named_sides {
        let name = &physical_names[&pending.physical];
        let kernel = resolve(name).ok_or_else(|| GmshError::UnknownBoundary(name.clone()))?;
        let ghost = mirror_ghost(
            pending.owner,
            &pending.side,
            &mut cell_area,
            &mut cell_center_x,
            &mut cell_center_y,
            &mut cell_is_ghost,
        );
        boundary.push(BoundaryBinding {
            edge: edges.len(),
            kernel,
        });
        edges.push(ghost_edge(pending.owner, ghost, &pending.side, &coords));
    }

    // Vertex connectivity for output; halo ghosts carry no polygon.
    let mut cell_node_offsets = Vec::with_capacity(n_real + 1);
    let mut cell_node_indices = Vec::new();
    cell_node_offsets.push(0);
    for c in 0..n_real {
        if c < n_interior {
            cell_node_indices.extend_from_slice(&cells[c]);
        }
        cell_node_offsets.push(cell_node_indices.len());
    }

    let mesh = Mesh2D {
        n_cells: cell_area.len(),
        n_real_cells: n_real,
        cell_area,
        cell_center_x,
        cell_center_y,
        cell_is_ghost,
        edges,
        boundary,
        channels,
        vertices: coords,
        cell_node_offsets,
        cell_node_indices,
    };
    mesh.validate()?;
    Ok(mesh)
}

/// Interior edge between two cells sharing `side`, with the normal outward
/// from the first cell (whose traversal owns the side direction).
fn side_edge(first: usize, second: usize, side: [usize; 2], coords: &[(f64, f64)]) -> Edge {
    let (length, normal, center) = side_geometry(&side, coords);
    Edge {
        cells: (first, second),
        length,
        normal,
        center,
    }
}

/// Boundary or halo edge from an owned cell to its ghost.
fn ghost_edge(owner: usize, ghost: usize, side: &[usize; 2], coords: &[(f64, f64)]) -> Edge {
    let (length, normal, center) = side_geometry(side, coords);
    Edge {
        cells: (owner, ghost),
        length,
        normal,
        center,
    }
}

/// Length, outward normal and midpoint of a counter-clockwise cell side.
fn side_geometry(side: &[usize; 2], coords: &[(f64, f64)]) -> (f64, (f64, f64), (f64, f64)) {
    let (ax, ay) = coords[side[0]];
    let (bx, by) = coords[side[1]];
    let (tx, ty) = (bx - ax, by - ay);
    let length = (tx * tx + ty * ty).sqrt();
    // CCW traversal puts the cell interior on the left; rotating the
    // tangent clockwise gives the outward normal.
    let normal = (ty / length, -tx / length);
    let center = (0.5 * (ax + bx), 0.5 * (ay + by));
    (length, normal, center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Two unit quads side by side, all outer sides tagged "wall".
    const TWO_QUADS: &str = "\
$MeshFormat
2.2 0 8
$EndMeshFormat
$PhysicalNames
1
1 1 \"wall\"
$EndPhysicalNames
$Nodes
6
1 0 0 0
2 1 0 0
3 2 0 0
4 0 1 0
5 1 1 0
6 2 1 0
$EndNodes
$Elements
9
1 3 2 10 1 1 2 5 4
2 3 2 10 1 2 3 6 5
3 1 2 1 1 1 2
4 1 2 1 1 2 3
5 1 2 1 1 3 6
6 1 2 1 1 6 5
7 1 2 1 1 5 4
8 1 2 1 1 4 1
9 15 2 0 1 1
$EndElements
";

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(name);
        let mut file = File::create(&path).expect("create temp mesh");
        file.write_all(content.as_bytes()).expect("write temp mesh");
        path
    }

    fn resolve_wall(name: &str) -> Option<usize> {
        (name == "wall").then_some(0)
    }

    #[test]
    fn test_read_two_quads() {
        let path = write_temp("fv_rs_gmsh_two_quads.msh", TWO_QUADS);
        let mesh = read_mesh(&path, resolve_wall).expect("parse two quads");

        assert_eq!(mesh.n_real_cells, 2);
        assert_eq!(mesh.n_owned_cells(), 2);
        assert_eq!(mesh.boundary.len(), 6);
        assert_eq!(mesh.n_cells, 2 + 6);
        // One shared interior edge.
        assert_eq!(mesh.edges.len(), 1 + 6);
        assert!(mesh.channels.is_empty());

        assert!((mesh.cell_area[0] - 1.0).abs() < 1e-14);
        assert!((mesh.cell_center_x[0] - 0.5).abs() < 1e-14);
        assert!((mesh.cell_center_x[1] - 1.5).abs() < 1e-14);

        // The shared edge points from cell 0 to cell 1 along +x.
        let shared = mesh.edges[0];
        assert_eq!(shared.cells, (0, 1));
        assert!((shared.normal.0 - 1.0).abs() < 1e-14);
        assert!(shared.normal.1.abs() < 1e-14);
        assert!((shared.length - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_comm_lines_build_channels() {
        let content = TWO_QUADS
            .replace("1 1 \"wall\"", "1 1 \"wall\"\n1 2 \"comm:1\"")
            .replace("$PhysicalNames\n1\n", "$PhysicalNames\n2\n")
            .replace("5 1 2 1 1 3 6", "5 1 2 2 1 3 6");
        let path = write_temp("fv_rs_gmsh_comm.msh", &content);
        let mesh = read_mesh(&path, resolve_wall).expect("parse comm mesh");

        assert_eq!(mesh.channels.len(), 1);
        assert_eq!(mesh.channels[0].peer, 1);
        assert_eq!(mesh.channels[0].send_cells, vec![1]);
        // The halo ghost has geometry and sits below n_real_cells.
        let halo = mesh.channels[0].recv_cells[0];
        assert!(halo < mesh.n_real_cells);
        assert!(mesh.cell_is_ghost[halo]);
        assert!((mesh.cell_center_x[halo] - 2.5).abs() < 1e-14);
        assert_eq!(mesh.boundary.len(), 5);
        mesh.validate().expect("comm mesh must validate");
    }

    #[test]
    fn test_unknown_boundary_name_rejected() {
        let content = TWO_QUADS.replace("\"wall\"", "\"slipstream\"");
        let path = write_temp("fv_rs_gmsh_unknown.msh", &content);
        match read_mesh(&path, resolve_wall) {
            Err(GmshError::UnknownBoundary(name)) => assert_eq!(name, "slipstream"),
            other => panic!("expected UnknownBoundary, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_nodes_rejected() {
        let content = "$MeshFormat\n2.2 0 8\n$EndMeshFormat\n";
        let path = write_temp("fv_rs_gmsh_empty.msh", content);
        assert!(matches!(
            read_mesh(&path, resolve_wall),
            Err(GmshError::MissingSection("Nodes"))
        ));
    }

    #[test]
    fn test_partitioned_naming() {
        let path = write_temp("fv_rs_gmsh_part_1.msh", TWO_QUADS);
        let base = path.with_file_name("fv_rs_gmsh_part");
        let mesh = read_partitioned_mesh(&base, 0, resolve_wall).expect("read rank file");
        assert_eq!(mesh.n_owned_cells(), 2);
    }
}
