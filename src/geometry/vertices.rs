//! Replicated vertex-coordinate table.
//!
//! Every rank holds the full table, so derived cell geometry can be
//! recomputed from topology alone and is never sent over the wire.

use super::vector::Vector3;
use crate::mesh_error::MeshGhostError;

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct VertexTable {
    coords: Vec<Vector3>,
}

impl VertexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vertex and returns its id.
    pub fn push(&mut self, v: Vector3) -> u64 {
        self.coords.push(v);
        (self.coords.len() - 1) as u64
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn get(&self, id: u64) -> Result<Vector3, MeshGhostError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.coords.get(i).copied())
            .ok_or(MeshGhostError::VertexOutOfRange {
                vertex: id,
                len: self.coords.len(),
            })
    }

    /// Arithmetic mean of the listed vertices (zero for an empty list).
    pub fn centroid_of(&self, ids: &[u64]) -> Result<Vector3, MeshGhostError> {
        if ids.is_empty() {
            return Ok(Vector3::ZERO);
        }
        let mut sum = Vector3::ZERO;
        for &id in ids {
            sum = sum + self.get(id)?;
        }
        Ok(sum / ids.len() as f64)
    }
}

impl FromIterator<Vector3> for VertexTable {
    fn from_iter<I: IntoIterator<Item = Vector3>>(iter: I) -> Self {
        Self {
            coords: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_unit_square() {
        let table: VertexTable = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            table.centroid_of(&[0, 1, 2, 3]).unwrap(),
            Vector3::new(0.5, 0.5, 0.0)
        );
    }

    #[test]
    fn missing_vertex_is_reported() {
        let table = VertexTable::new();
        assert_eq!(
            table.get(3),
            Err(MeshGhostError::VertexOutOfRange { vertex: 3, len: 0 })
        );
    }
}
