//! Partition-aware cell registry.
//!
//! All cells known on a rank live in one arena and are referred to by a
//! stable [`CellHandle`]. Two disjoint views sit on top of the arena:
//!
//! - **native** cells, owned by this rank, densely indexed `0..N` by local id;
//! - **foreign** (ghost) cells, owned elsewhere and registered only by the
//!   ghost exchange, keyed by global id.
//!
//! A global id appears in at most one of the two views. The global-id index
//! is an ordered map, so [`CellRegistry::resolve`] is `O(log n)`.
//!
//! Registration happens only during the bulk construction phases. After
//! [`CellRegistry::finalize`] the registry is read-only and can be shared
//! across threads without locking; registering afterwards panics.

use std::collections::BTreeMap;

use crate::debug_invariants::DebugInvariants;
use crate::geometry::VertexTable;
use crate::mesh_error::MeshGhostError;
use crate::topology::cell::{Cell, MAX_GLOBAL_ID};

/// Index of a cell in the rank-local arena.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct CellHandle(u32);

static_assertions::assert_eq_size!(CellHandle, u32);

impl CellHandle {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a global id lives on this rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellLocation {
    Native { local_id: usize, handle: CellHandle },
    Foreign { handle: CellHandle },
}

impl CellLocation {
    pub fn handle(self) -> CellHandle {
        match self {
            CellLocation::Native { handle, .. } | CellLocation::Foreign { handle } => handle,
        }
    }

    pub fn is_native(self) -> bool {
        matches!(self, CellLocation::Native { .. })
    }
}

#[derive(Clone, Debug)]
pub struct CellRegistry {
    rank: usize,
    arena: Vec<Cell>,
    native: Vec<CellHandle>,
    foreign: BTreeMap<u64, CellHandle>,
    index: BTreeMap<u64, CellLocation>,
    // owner of every cell referenced by a native face, known before the
    // ghost data arrives
    known_owners: BTreeMap<u64, usize>,
    finalized: bool,
}

impl CellRegistry {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            arena: Vec::new(),
            native: Vec::new(),
            foreign: BTreeMap::new(),
            index: BTreeMap::new(),
            known_owners: BTreeMap::new(),
            finalized: false,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    fn push(&mut self, cell: Cell) -> CellHandle {
        assert!(
            cell.global_id <= MAX_GLOBAL_ID,
            "cell id {} exceeds the largest transferable id {MAX_GLOBAL_ID}",
            cell.global_id
        );
        assert!(
            !self.finalized,
            "cell {} registered after the registry was finalized",
            cell.global_id
        );
        assert!(
            !self.index.contains_key(&cell.global_id),
            "cell {} registered twice",
            cell.global_id
        );
        let handle = CellHandle(
            u32::try_from(self.arena.len()).expect("cell arena exceeds u32::MAX entries"),
        );
        self.arena.push(cell);
        handle
    }

    /// Register a cell owned by this rank and return its local id.
    ///
    /// # Panics
    /// If the cell is owned by another rank, its global id is already
    /// registered or above [`MAX_GLOBAL_ID`], or the registry is finalized.
    pub fn register_native(&mut self, mut cell: Cell) -> usize {
        assert_eq!(
            cell.partition_id, self.rank,
            "native cell {} is owned by rank {}",
            cell.global_id, cell.partition_id
        );
        let local_id = self.native.len();
        cell.local_id = Some(local_id);
        for face in &cell.faces {
            if let Some(n) = face.neighbor {
                self.known_owners.insert(n.global_id, n.partition_id);
            }
        }
        let global_id = cell.global_id;
        let handle = self.push(cell);
        self.native.push(handle);
        self.index
            .insert(global_id, CellLocation::Native { local_id, handle });
        local_id
    }

    /// Register a cell owned by another rank.
    ///
    /// # Panics
    /// If the cell is owned by this rank, its global id is already
    /// registered or above [`MAX_GLOBAL_ID`], or the registry is finalized.
    pub fn register_foreign(&mut self, mut cell: Cell) -> CellHandle {
        assert_ne!(
            cell.partition_id, self.rank,
            "foreign cell {} is owned by this rank",
            cell.global_id
        );
        cell.local_id = None;
        let global_id = cell.global_id;
        self.known_owners.insert(global_id, cell.partition_id);
        let handle = self.push(cell);
        self.foreign.insert(global_id, handle);
        self.index
            .insert(global_id, CellLocation::Foreign { handle });
        handle
    }

    /// Mark the end of the construction phases.
    pub fn finalize(&mut self) {
        crate::debug_invariants!(self.validate_invariants(), "CellRegistry::finalize");
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn contains(&self, global_id: u64) -> bool {
        self.index.contains_key(&global_id)
    }

    /// Translate a global id into its location on this rank.
    pub fn resolve(&self, global_id: u64) -> Result<CellLocation, MeshGhostError> {
        self.index
            .get(&global_id)
            .copied()
            .ok_or(MeshGhostError::CellNotFound(global_id))
    }

    /// True iff the cell is owned by this rank. Cells that are only known as
    /// face neighbours are answered from the neighbour's recorded owner.
    pub fn is_local(&self, global_id: u64) -> bool {
        self.owner_of(global_id) == Some(self.rank)
    }

    /// Owning rank of a registered cell or of a known face neighbour.
    pub fn owner_of(&self, global_id: u64) -> Option<usize> {
        match self.index.get(&global_id) {
            Some(loc) => Some(self.arena[loc.handle().index()].partition_id),
            None => self.known_owners.get(&global_id).copied(),
        }
    }

    pub fn get(&self, handle: CellHandle) -> &Cell {
        &self.arena[handle.index()]
    }

    pub fn cell(&self, global_id: u64) -> Result<&Cell, MeshGhostError> {
        self.resolve(global_id).map(|loc| self.get(loc.handle()))
    }

    pub fn native_cell(&self, local_id: usize) -> Option<&Cell> {
        self.native.get(local_id).map(|&h| self.get(h))
    }

    pub fn foreign_cell(&self, global_id: u64) -> Option<&Cell> {
        self.foreign.get(&global_id).map(|&h| self.get(h))
    }

    /// Native cells in local-id order.
    pub fn native_cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.native.iter().map(move |&h| self.get(h))
    }

    /// Foreign cells in ascending global-id order.
    pub fn foreign_cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.foreign.values().map(move |&h| self.get(h))
    }

    pub fn num_native(&self) -> usize {
        self.native.len()
    }

    pub fn num_foreign(&self) -> usize {
        self.foreign.len()
    }

    /// Fill in centroids and normals of every native cell.
    pub fn compute_native_geometry(&mut self, vertices: &VertexTable) -> Result<(), MeshGhostError> {
        for &h in &self.native {
            self.arena[h.index()].compute_geometry(vertices)?;
        }
        Ok(())
    }
}

impl DebugInvariants for CellRegistry {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "CellRegistry");
    }

    fn validate_invariants(&self) -> Result<(), MeshGhostError> {
        if self.native.len() + self.foreign.len() != self.arena.len()
            || self.index.len() != self.arena.len()
        {
            return Err(MeshGhostError::InvariantViolation(format!(
                "{} native + {} foreign cells, {} arena entries, {} indexed ids",
                self.native.len(),
                self.foreign.len(),
                self.arena.len(),
                self.index.len()
            )));
        }
        for (local_id, &h) in self.native.iter().enumerate() {
            let cell = self.get(h);
            if cell.local_id != Some(local_id) || cell.partition_id != self.rank {
                return Err(MeshGhostError::InvariantViolation(format!(
                    "native slot {local_id} holds cell {} with local id {:?} owned by {}",
                    cell.global_id, cell.local_id, cell.partition_id
                )));
            }
            if self.index.get(&cell.global_id) != Some(&CellLocation::Native { local_id, handle: h }) {
                return Err(MeshGhostError::InvariantViolation(format!(
                    "index entry for native cell {} is stale",
                    cell.global_id
                )));
            }
        }
        for (&gid, &h) in &self.foreign {
            let cell = self.get(h);
            if cell.global_id != gid || cell.partition_id == self.rank {
                return Err(MeshGhostError::InvariantViolation(format!(
                    "foreign entry {gid} holds cell {} owned by {}",
                    cell.global_id, cell.partition_id
                )));
            }
            if self.index.get(&gid) != Some(&CellLocation::Foreign { handle: h }) {
                return Err(MeshGhostError::InvariantViolation(format!(
                    "index entry for foreign cell {gid} is stale"
                )));
            }
        }
        Ok(())
    }
}
