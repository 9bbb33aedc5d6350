//! Structure of the unknowns carried by every node.
//!
//! An [`UnknownManager`] lists the unknowns of a discretization (a scalar
//! flux, a 3-vector velocity, ...) and fixes how their components are laid
//! out in the DOF vector. The map of component `c` of an unknown is its
//! offset inside the per-node structure: `map_begin + c`.

use crate::mesh_error::MeshGhostError;

/// Shape of one unknown.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnknownKind {
    Scalar,
    Vector2,
    Vector3,
    /// Vector with the given number of components.
    VectorN(usize),
    /// Tensor stored as the given number of components.
    Tensor(usize),
}

impl UnknownKind {
    pub const fn num_components(self) -> usize {
        match self {
            UnknownKind::Scalar => 1,
            UnknownKind::Vector2 => 2,
            UnknownKind::Vector3 => 3,
            UnknownKind::VectorN(n) | UnknownKind::Tensor(n) => n,
        }
    }
}

/// How the components of all nodes are ordered in the DOF vector.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DofStorage {
    /// All components of one node are contiguous.
    #[default]
    Nodal,
    /// Each component forms one contiguous block over all nodes of a rank.
    Block,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Unknown {
    kind: UnknownKind,
    map_begin: usize,
    text_name: String,
    component_text_names: Vec<String>,
}

impl Unknown {
    fn new(kind: UnknownKind, map_begin: usize) -> Self {
        let n = kind.num_components();
        Self {
            kind,
            map_begin,
            text_name: String::new(),
            component_text_names: (0..n).map(|c| format!(" {c:03}")).collect(),
        }
    }

    pub fn kind(&self) -> UnknownKind {
        self.kind
    }

    pub fn num_components(&self) -> usize {
        self.kind.num_components()
    }

    pub fn map_begin(&self) -> usize {
        self.map_begin
    }

    /// Map of the last component.
    pub fn map_end(&self) -> usize {
        self.map_begin + self.num_components() - 1
    }

    pub fn text_name(&self) -> &str {
        &self.text_name
    }

    pub fn component_text_name(&self, component: usize) -> Option<&str> {
        self.component_text_names.get(component).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnknownManager {
    unknowns: Vec<Unknown>,
    storage: DofStorage,
}

impl UnknownManager {
    pub fn new(storage: DofStorage) -> Self {
        Self {
            unknowns: Vec::new(),
            storage,
        }
    }

    /// One scalar unknown, nodal storage.
    pub fn unitary() -> Self {
        Self::from_kinds([UnknownKind::Scalar], DofStorage::Nodal)
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = UnknownKind>, storage: DofStorage) -> Self {
        let mut uk_man = Self::new(storage);
        for kind in kinds {
            uk_man.add_unknown(kind);
        }
        uk_man
    }

    /// Append an unknown after the existing ones and return its id.
    ///
    /// # Panics
    /// If `kind` has no component (`VectorN(0)` or `Tensor(0)`).
    pub fn add_unknown(&mut self, kind: UnknownKind) -> usize {
        assert!(
            kind.num_components() > 0,
            "unknown of kind {kind:?} has no component"
        );
        let map_begin = self.total_unknown_structure_size();
        self.unknowns.push(Unknown::new(kind, map_begin));
        self.unknowns.len() - 1
    }

    pub fn num_unknowns(&self) -> usize {
        self.unknowns.len()
    }

    pub fn unknown(&self, unknown_id: usize) -> Result<&Unknown, MeshGhostError> {
        self.unknowns
            .get(unknown_id)
            .ok_or(MeshGhostError::UnknownOutOfRange(unknown_id))
    }

    pub fn unknowns(&self) -> &[Unknown] {
        &self.unknowns
    }

    pub fn storage(&self) -> DofStorage {
        self.storage
    }

    pub fn set_storage(&mut self, storage: DofStorage) {
        self.storage = storage;
    }

    /// Offset of `component` of `unknown_id` within one node's structure.
    pub fn map_unknown(&self, unknown_id: usize, component: usize) -> Result<usize, MeshGhostError> {
        let uk = self.unknown(unknown_id)?;
        if component >= uk.num_components() {
            return Err(MeshGhostError::ComponentOutOfRange {
                unknown: unknown_id,
                component,
                num_components: uk.num_components(),
            });
        }
        Ok(uk.map_begin + component)
    }

    /// Number of components per node over all unknowns.
    pub fn total_unknown_structure_size(&self) -> usize {
        self.unknowns.last().map_or(0, |uk| uk.map_end() + 1)
    }

    pub fn set_unknown_text_name(
        &mut self,
        unknown_id: usize,
        name: impl Into<String>,
    ) -> Result<(), MeshGhostError> {
        self.unknowns
            .get_mut(unknown_id)
            .ok_or(MeshGhostError::UnknownOutOfRange(unknown_id))?
            .text_name = name.into();
        Ok(())
    }

    pub fn set_unknown_component_text_name(
        &mut self,
        unknown_id: usize,
        component: usize,
        name: impl Into<String>,
    ) -> Result<(), MeshGhostError> {
        let uk = self
            .unknowns
            .get_mut(unknown_id)
            .ok_or(MeshGhostError::UnknownOutOfRange(unknown_id))?;
        let num_components = uk.num_components();
        let slot = uk.component_text_names.get_mut(component).ok_or(
            MeshGhostError::ComponentOutOfRange {
                unknown: unknown_id,
                component,
                num_components,
            },
        )?;
        *slot = name.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_are_consecutive() {
        let mut uk = UnknownManager::new(DofStorage::Nodal);
        let phi = uk.add_unknown(UnknownKind::Scalar);
        let vel = uk.add_unknown(UnknownKind::Vector3);
        let g = uk.add_unknown(UnknownKind::VectorN(4));
        assert_eq!(uk.map_unknown(phi, 0), Ok(0));
        assert_eq!(uk.map_unknown(vel, 0), Ok(1));
        assert_eq!(uk.map_unknown(vel, 2), Ok(3));
        assert_eq!(uk.map_unknown(g, 3), Ok(7));
        assert_eq!(uk.total_unknown_structure_size(), 8);
    }

    #[test]
    fn out_of_range_lookups_fail() {
        let uk = UnknownManager::from_kinds([UnknownKind::Vector2], DofStorage::Block);
        assert_eq!(
            uk.map_unknown(0, 2),
            Err(MeshGhostError::ComponentOutOfRange {
                unknown: 0,
                component: 2,
                num_components: 2
            })
        );
        assert_eq!(uk.map_unknown(1, 0), Err(MeshGhostError::UnknownOutOfRange(1)));
    }

    #[test]
    fn unitary_is_one_scalar() {
        let uk = UnknownManager::unitary();
        assert_eq!(uk.num_unknowns(), 1);
        assert_eq!(uk.total_unknown_structure_size(), 1);
        assert_eq!(uk.storage(), DofStorage::Nodal);
    }

    #[test]
    fn text_names() {
        let mut uk = UnknownManager::from_kinds([UnknownKind::Tensor(2)], DofStorage::Nodal);
        assert_eq!(uk.unknown(0).unwrap().component_text_name(1), Some(" 001"));
        uk.set_unknown_text_name(0, "stress").unwrap();
        uk.set_unknown_component_text_name(0, 1, "xy").unwrap();
        let u = uk.unknown(0).unwrap();
        assert_eq!(u.text_name(), "stress");
        assert_eq!(u.component_text_name(1), Some("xy"));
        assert!(uk.set_unknown_component_text_name(0, 5, "zz").is_err());
    }

    #[test]
    #[should_panic(expected = "has no component")]
    fn empty_vector_is_rejected() {
        UnknownManager::default().add_unknown(UnknownKind::VectorN(0));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let uk = UnknownManager::from_kinds(
            [UnknownKind::Scalar, UnknownKind::Vector2],
            DofStorage::Block,
        );
        let json = serde_json::to_string(&uk).unwrap();
        let back: UnknownManager = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uk);
    }
}
