//! Mesh cells and their faces.
//!
//! A [`Cell`] is created once, either by mesh construction (native cells) or
//! by ghost deserialization (foreign cells). After that only its derived
//! geometry (centroids and face normals) is ever written, by
//! [`Cell::compute_geometry`].

use crate::geometry::{Vector3, VertexTable};
use crate::mesh_error::MeshGhostError;
use crate::topology::cell_type::CellType;

/// The cell on the other side of an interior face.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FaceNeighbor {
    pub global_id: u64,
    /// Owning partition (rank) of the neighbour.
    pub partition_id: usize,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CellFace {
    pub vertex_ids: Vec<u64>,
    /// `None` on boundary faces, and on every face of a foreign cell (face
    /// neighbours are not part of the ghost record).
    pub neighbor: Option<FaceNeighbor>,
    pub centroid: Vector3,
    pub normal: Vector3,
}

impl CellFace {
    pub fn new(vertex_ids: Vec<u64>) -> Self {
        Self {
            vertex_ids,
            ..Default::default()
        }
    }

    pub fn with_neighbor(mut self, global_id: u64, partition_id: usize) -> Self {
        self.neighbor = Some(FaceNeighbor {
            global_id,
            partition_id,
        });
        self
    }

    pub fn has_neighbor(&self) -> bool {
        self.neighbor.is_some()
    }

    /// True when the face has a neighbour owned by a rank other than `rank`.
    pub fn is_neighbor_remote(&self, rank: usize) -> bool {
        self.neighbor.is_some_and(|n| n.partition_id != rank)
    }
}

/// Largest global id a registry accepts. Ids travel as signed 64-bit words,
/// so the top bit is not available.
pub const MAX_GLOBAL_ID: u64 = i64::MAX as u64;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cell {
    /// At most [`MAX_GLOBAL_ID`].
    pub global_id: u64,
    /// Dense index on the owning rank; `None` everywhere else.
    pub local_id: Option<usize>,
    pub partition_id: usize,
    pub material_id: i32,
    pub cell_type: CellType,
    pub vertex_ids: Vec<u64>,
    pub faces: Vec<CellFace>,
    pub centroid: Vector3,
}

impl Cell {
    pub fn new(cell_type: CellType, global_id: u64, partition_id: usize) -> Self {
        Self {
            global_id,
            local_id: None,
            partition_id,
            material_id: 0,
            cell_type,
            vertex_ids: Vec::new(),
            faces: Vec::new(),
            centroid: Vector3::ZERO,
        }
    }

    pub fn with_vertices(mut self, vertex_ids: Vec<u64>) -> Self {
        self.vertex_ids = vertex_ids;
        self
    }

    pub fn with_material(mut self, material_id: i32) -> Self {
        self.material_id = material_id;
        self
    }

    pub fn with_face(mut self, face: CellFace) -> Self {
        self.faces.push(face);
        self
    }

    /// Ranks other than `rank` owning a face neighbour of this cell, in face
    /// order and possibly repeated.
    pub fn remote_neighbor_partitions(&self, rank: usize) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .filter(move |f| f.is_neighbor_remote(rank))
            .filter_map(|f| f.neighbor.map(|n| n.partition_id))
    }

    /// Recompute the centroid of the cell and the centroid and outward normal
    /// of every face from the vertex table.
    ///
    /// Slab faces point along ∓z, polygon faces use `(v1 − v0) × ẑ`, and
    /// polyhedron faces `(v1 − v0) × (c_f − v1)` with `c_f` the face centroid.
    pub fn compute_geometry(&mut self, vertices: &VertexTable) -> Result<(), MeshGhostError> {
        self.centroid = vertices.centroid_of(&self.vertex_ids)?;
        let cell_type = self.cell_type;
        for (f, face) in self.faces.iter_mut().enumerate() {
            face.centroid = vertices.centroid_of(&face.vertex_ids)?;
            face.normal = match cell_type {
                CellType::Slab if f == 0 => Vector3::new(0.0, 0.0, -1.0),
                CellType::Slab => Vector3::K_HAT,
                _ if face.vertex_ids.len() < 2 => Vector3::ZERO,
                CellType::Polygon => {
                    let v0 = vertices.get(face.vertex_ids[0])?;
                    let v1 = vertices.get(face.vertex_ids[1])?;
                    (v1 - v0).cross(Vector3::K_HAT).normalized()
                }
                CellType::Polyhedron => {
                    let v0 = vertices.get(face.vertex_ids[0])?;
                    let v1 = vertices.get(face.vertex_ids[1])?;
                    (v1 - v0).cross(face.centroid - v1).normalized()
                }
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> VertexTable {
        [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ]
        .into_iter()
        .collect()
    }

    fn square_cell() -> Cell {
        Cell::new(CellType::Polygon, 0, 0)
            .with_vertices(vec![0, 1, 2, 3])
            .with_face(CellFace::new(vec![0, 1]))
            .with_face(CellFace::new(vec![1, 2]).with_neighbor(9, 1))
            .with_face(CellFace::new(vec![2, 3]))
            .with_face(CellFace::new(vec![3, 0]))
    }

    #[test]
    fn polygon_normals_point_outward() {
        let mut cell = square_cell();
        cell.compute_geometry(&unit_square()).unwrap();
        assert_eq!(cell.centroid, Vector3::new(0.5, 0.5, 0.0));
        // bottom edge (0,0)->(1,0) has outward normal -y
        assert_eq!(cell.faces[0].normal, Vector3::new(0.0, -1.0, 0.0));
        assert_eq!(cell.faces[1].normal, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(cell.faces[1].centroid, Vector3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn slab_normals_are_axial() {
        let table: VertexTable = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0)]
            .into_iter()
            .collect();
        let mut cell = Cell::new(CellType::Slab, 3, 0)
            .with_vertices(vec![0, 1])
            .with_face(CellFace::new(vec![0]))
            .with_face(CellFace::new(vec![1]));
        cell.compute_geometry(&table).unwrap();
        assert_eq!(cell.faces[0].normal, Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(cell.faces[1].normal, Vector3::K_HAT);
        assert_eq!(cell.centroid, Vector3::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn remote_partitions_skip_local_and_boundary_faces() {
        let cell = square_cell().with_face(CellFace::new(vec![0, 2]).with_neighbor(4, 0));
        let parts: Vec<usize> = cell.remote_neighbor_partitions(0).collect();
        assert_eq!(parts, vec![1]);
    }

    #[test]
    fn geometry_needs_known_vertices() {
        let mut cell = square_cell();
        let err = cell.compute_geometry(&VertexTable::new()).unwrap_err();
        assert!(matches!(err, MeshGhostError::VertexOutOfRange { .. }));
    }
}
