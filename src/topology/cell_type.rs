//! Cell shape metadata and its wire tag.

use crate::mesh_error::MeshGhostError;

/// Cell shapes understood by the ghost exchange.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, Default, serde::Serialize, serde::Deserialize,
)]
pub enum CellType {
    /// 1D segment between two vertices.
    Slab,
    /// 2D polygon with any number of vertices.
    #[default]
    Polygon,
    /// 3D polyhedron with polygonal faces.
    Polyhedron,
}

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Slab => 1,
            CellType::Polygon => 2,
            CellType::Polyhedron => 3,
        }
    }

    /// Tag written as the first word of a serialized cell.
    pub const fn wire_tag(self) -> i64 {
        match self {
            CellType::Slab => 3,
            CellType::Polygon => 4,
            CellType::Polyhedron => 5,
        }
    }

    /// Inverse of [`CellType::wire_tag`]. `offset` locates the tag in the
    /// received buffer for the error report.
    pub fn from_wire_tag(tag: i64, offset: usize) -> Result<Self, MeshGhostError> {
        match tag {
            3 => Ok(CellType::Slab),
            4 => Ok(CellType::Polygon),
            5 => Ok(CellType::Polyhedron),
            _ => Err(MeshGhostError::UnknownCellType { tag, offset }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for ct in [CellType::Slab, CellType::Polygon, CellType::Polyhedron] {
            assert_eq!(CellType::from_wire_tag(ct.wire_tag(), 0).unwrap(), ct);
        }
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert_eq!(
            CellType::from_wire_tag(-1, 12),
            Err(MeshGhostError::UnknownCellType { tag: -1, offset: 12 })
        );
    }
}
