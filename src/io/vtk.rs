//! VTU (XML UnstructuredGrid) output.
//!
//! Writes one cell per owned mesh cell with the conserved variables and the
//! problem's derived outputs as cell data. Ghost cells are not written.
//! Time-series emission follows the mesh-file naming convention:
//! `<base>_<rank+1>_<index>.vtu`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::mesh::Mesh2D;
use crate::physics::Physics;
use crate::state::CellField;

/// Error type for VTU output.
#[derive(Debug, Error)]
pub enum VtkError {
    /// I/O failure during writing.
    #[error("VTU I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The mesh carries no writable cell polygons.
    #[error("invalid mesh for output: {0}")]
    InvalidMesh(String),
}

/// VTK XML writer helper.
struct VtkWriter<W: Write> {
    writer: BufWriter<W>,
    indent: usize,
}

impl<W: Write> VtkWriter<W> {
    fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            indent: 0,
        }
    }

    fn write_indent(&mut self) -> std::io::Result<()> {
        for _ in 0..self.indent {
            write!(self.writer, "  ")?;
        }
        Ok(())
    }

    fn write_header(&mut self) -> std::io::Result<()> {
        writeln!(self.writer, "<?xml version=\"1.0\"?>")?;
        writeln!(
            self.writer,
            "<VTKFile type=\"UnstructuredGrid\" version=\"0.1\" byte_order=\"LittleEndian\">"
        )?;
        self.indent += 1;
        Ok(())
    }

    fn write_footer(&mut self) -> std::io::Result<()> {
        self.indent -= 1;
        writeln!(self.writer, "</VTKFile>")?;
        self.writer.flush()
    }

    fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> std::io::Result<()> {
        self.write_indent()?;
        write!(self.writer, "<{name}")?;
        for (key, value) in attrs {
            write!(self.writer, " {key}=\"{value}\"")?;
        }
        writeln!(self.writer, ">")?;
        self.indent += 1;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> std::io::Result<()> {
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.writer, "</{name}>")
    }

    fn write_data_array_f64(
        &mut self,
        name: &str,
        data: &[f64],
        components: usize,
    ) -> std::io::Result<()> {
        self.write_indent()?;
        if components > 1 {
            writeln!(
                self.writer,
                "<DataArray type=\"Float64\" Name=\"{name}\" \
                 NumberOfComponents=\"{components}\" format=\"ascii\">"
            )?;
        } else {
            writeln!(
                self.writer,
                "<DataArray type=\"Float64\" Name=\"{name}\" format=\"ascii\">"
            )?;
        }
        self.indent += 1;
        self.write_indent()?;
        for (i, value) in data.iter().enumerate() {
            write!(self.writer, "{value:.10e}")?;
            if i + 1 < data.len() {
                write!(self.writer, " ")?;
                // Line break every 6 values for readability.
                if (i + 1) % 6 == 0 {
                    writeln!(self.writer)?;
                    self.write_indent()?;
                }
            }
        }
        writeln!(self.writer)?;
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")
    }

    fn write_data_array_usize(&mut self, name: &str, data: &[usize]) -> std::io::Result<()> {
        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"Int64\" Name=\"{name}\" format=\"ascii\">"
        )?;
        self.indent += 1;
        self.write_indent()?;
        for (i, value) in data.iter().enumerate() {
            write!(self.writer, "{value}")?;
            if i + 1 < data.len() {
                write!(self.writer, " ")?;
            }
        }
        writeln!(self.writer)?;
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")
    }

    fn write_data_array_u8(&mut self, name: &str, data: &[u8]) -> std::io::Result<()> {
        self.write_indent()?;
        writeln!(
            self.writer,
            "<DataArray type=\"UInt8\" Name=\"{name}\" format=\"ascii\">"
        )?;
        self.indent += 1;
        self.write_indent()?;
        for (i, value) in data.iter().enumerate() {
            write!(self.writer, "{value}")?;
            if i + 1 < data.len() {
                write!(self.writer, " ")?;
            }
        }
        writeln!(self.writer)?;
        self.indent -= 1;
        self.write_indent()?;
        writeln!(self.writer, "</DataArray>")
    }
}

/// File path of one time-series emission: `<base>_<rank+1>_<index>.vtu`.
pub fn series_path(base: &Path, rank: usize, index: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("_{}_{}.vtu", rank + 1, index));
    PathBuf::from(name)
}

/// Write the owned cells of `mesh` with `q` and the problem's derived
/// outputs as cell data.
pub fn write_vtu<P: Physics>(
    path: &Path,
    mesh: &Mesh2D,
    q: &CellField,
    physics: &P,
    time: f64,
) -> Result<(), VtkError> {
    // Owned cells with polygon connectivity.
    let cells: Vec<usize> = mesh
        .owned_cells()
        .filter(|&c| mesh.cell_node_offsets[c + 1] - mesh.cell_node_offsets[c] >= 3)
        .collect();
    if cells.is_empty() {
        return Err(VtkError::InvalidMesh(
            "no owned cells with vertex connectivity".to_string(),
        ));
    }

    let mut connectivity = Vec::new();
    let mut offsets = Vec::with_capacity(cells.len());
    let mut types = Vec::with_capacity(cells.len());
    for &cell in &cells {
        let nodes =
            &mesh.cell_node_indices[mesh.cell_node_offsets[cell]..mesh.cell_node_offsets[cell + 1]];
        connectivity.extend_from_slice(nodes);
        offsets.push(connectivity.len());
        types.push(match nodes.len() {
            3 => 5u8, // VTK_TRIANGLE
            4 => 9u8, // VTK_QUAD
            _ => 7u8, // VTK_POLYGON
        });
    }

    let file = File::create(path)?;
    let mut w = VtkWriter::new(file);
    w.write_header()?;
    w.start_element("UnstructuredGrid", &[])?;

    // Simulated time, for ParaView's time controls.
    w.start_element("FieldData", &[])?;
    w.write_data_array_f64("TimeValue", &[time], 1)?;
    w.end_element("FieldData")?;

    let n_points = mesh.vertices.len().to_string();
    let n_cells = cells.len().to_string();
    w.start_element(
        "Piece",
        &[
            ("NumberOfPoints", n_points.as_str()),
            ("NumberOfCells", n_cells.as_str()),
        ],
    )?;

    w.start_element("Points", &[])?;
    let mut points = Vec::with_capacity(3 * mesh.vertices.len());
    for &(x, y) in &mesh.vertices {
        points.extend_from_slice(&[x, y, 0.0]);
    }
    w.write_data_array_f64("Points", &points, 3)?;
    w.end_element("Points")?;

    w.start_element("Cells", &[])?;
    w.write_data_array_usize("connectivity", &connectivity)?;
    w.write_data_array_usize("offsets", &offsets)?;
    w.write_data_array_u8("types", &types)?;
    w.end_element("Cells")?;

    w.start_element("CellData", &[])?;
    for (k, name) in physics.var_names().iter().enumerate() {
        let values: Vec<f64> = cells.iter().map(|&c| q.value(c, k)).collect();
        w.write_data_array_f64(name, &values, 1)?;
    }
    for (output, name) in physics.extra_scalar_names().iter().enumerate() {
        let values: Vec<f64> = cells
            .iter()
            .map(|&c| physics.extra_scalar(output, q.at(c)))
            .collect();
        w.write_data_array_f64(name, &values, 1)?;
    }
    for (output, name) in physics.extra_vector_names().iter().enumerate() {
        let mut values = Vec::with_capacity(3 * cells.len());
        for &cell in &cells {
            let (vx, vy) = physics.extra_vector(output, q.at(cell));
            values.extend_from_slice(&[vx, vy, 0.0]);
        }
        w.write_data_array_f64(name, &values, 3)?;
    }
    w.end_element("CellData")?;

    w.end_element("Piece")?;
    w.end_element("UnstructuredGrid")?;
    w.write_footer()?;
    Ok(())
}
