//! Integer record layout of a cell on the wire.
//!
//! ```text
//! [type_tag, global_id, local_id, material_id, partition_id,
//!  vertex_count, face_count, vertex_ids...,
//!  (face_vertex_count, face_vertex_ids...) per face]
//! ```
//!
//! Only topology travels. Face neighbours are not part of the record, and
//! centroids and normals are recomputed by the receiver from the replicated
//! vertex table. The layout is process-internal and never persisted.

use crate::geometry::VertexTable;
use crate::mesh_error::MeshGhostError;
use crate::topology::cell::{Cell, CellFace, MAX_GLOBAL_ID};
use crate::topology::cell_type::CellType;

/// Words before the vertex list.
pub const HEADER_WORDS: usize = 7;

/// Sent in place of the local id of a cell that has none.
const NO_LOCAL_ID: i64 = -1;

/// Append the record of `cell` to `out`.
pub fn serialize_cell(cell: &Cell, out: &mut Vec<i64>) {
    out.reserve(
        HEADER_WORDS
            + cell.vertex_ids.len()
            + cell.faces.iter().map(|f| 1 + f.vertex_ids.len()).sum::<usize>(),
    );
    out.push(cell.cell_type.wire_tag());
    // registered ids never exceed MAX_GLOBAL_ID
    out.push(cell.global_id as i64);
    out.push(cell.local_id.map_or(NO_LOCAL_ID, |l| l as i64));
    out.push(i64::from(cell.material_id));
    out.push(cell.partition_id as i64);
    out.push(cell.vertex_ids.len() as i64);
    out.push(cell.faces.len() as i64);
    out.extend(cell.vertex_ids.iter().map(|&v| v as i64));
    for face in &cell.faces {
        out.push(face.vertex_ids.len() as i64);
        out.extend(face.vertex_ids.iter().map(|&v| v as i64));
    }
}

struct Reader<'a> {
    words: &'a [i64],
    pos: usize,
}

impl Reader<'_> {
    fn is_done(&self) -> bool {
        self.pos >= self.words.len()
    }

    fn truncated(&self) -> MeshGhostError {
        MeshGhostError::TruncatedRecord {
            offset: self.pos,
            len: self.words.len(),
        }
    }

    fn next(&mut self) -> Result<i64, MeshGhostError> {
        let w = *self.words.get(self.pos).ok_or_else(|| self.truncated())?;
        self.pos += 1;
        Ok(w)
    }

    fn non_negative(&mut self, field: &'static str) -> Result<u64, MeshGhostError> {
        let value = self.next()?;
        u64::try_from(value).map_err(|_| MeshGhostError::InvalidField { field, value })
    }

    /// A length prefix; it must fit in what is left of the buffer.
    fn count(&mut self, field: &'static str) -> Result<usize, MeshGhostError> {
        let n = self.non_negative(field)? as usize;
        if n > self.words.len() - self.pos {
            return Err(self.truncated());
        }
        Ok(n)
    }

    fn ids(&mut self, n: usize, field: &'static str) -> Result<Vec<u64>, MeshGhostError> {
        (0..n).map(|_| self.non_negative(field)).collect()
    }
}

/// Decode every record in `words` and recompute its geometry.
///
/// The transmitted local id is dropped: a foreign cell has no local id on
/// the receiving rank. Fails on the first malformed record and returns no
/// cell at all in that case.
pub fn deserialize_cells(words: &[i64], vertices: &VertexTable) -> Result<Vec<Cell>, MeshGhostError> {
    let mut reader = Reader { words, pos: 0 };
    let mut cells = Vec::new();
    while !reader.is_done() {
        let offset = reader.pos;
        let cell_type = CellType::from_wire_tag(reader.next()?, offset)?;
        let global_id = reader.non_negative("global_id")?;
        let _sender_local_id = reader.next()?;
        let material = reader.next()?;
        let material_id = i32::try_from(material).map_err(|_| MeshGhostError::InvalidField {
            field: "material_id",
            value: material,
        })?;
        let partition_id = reader.non_negative("partition_id")? as usize;
        let vertex_count = reader.count("vertex_count")?;
        let face_count = reader.count("face_count")?;
        let vertex_ids = reader.ids(vertex_count, "vertex_id")?;

        let mut cell = Cell::new(cell_type, global_id, partition_id)
            .with_material(material_id)
            .with_vertices(vertex_ids);
        cell.faces.reserve(face_count);
        for _ in 0..face_count {
            let n = reader.count("face_vertex_count")?;
            cell.faces.push(CellFace::new(reader.ids(n, "face_vertex_id")?));
        }
        cell.compute_geometry(vertices)?;
        cells.push(cell);
    }
    Ok(cells)
}
