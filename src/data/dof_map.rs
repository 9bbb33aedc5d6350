//! Global DOF addresses of `(cell, node, unknown, component)` tuples.
//!
//! Every rank numbers the nodes of its native cells in local-id order; the
//! first node of a cell sits at the cell's *block offset*. The rank's DOFs
//! then occupy one [`AddressTable`] range of `local_nodes × N` addresses,
//! with `N` the per-node unknown structure size. Inside that range the
//! [`DofStorage`] decides the layout:
//!
//! - `Nodal`: `offset = (block + node) × N + map`
//! - `Block`: `offset = map × owner_nodes + block + node`
//!
//! Foreign cells are addressed with their owner's block offset and range,
//! which the owner ships to every rank that subscribes to the cell.
//!
//! For ghosted local vectors there is also a dense *local* index: native DOFs
//! keep their offset inside the rank's range, ghost DOFs follow them in
//! ascending global-address order.

use hashbrown::HashMap;
use std::collections::BTreeMap;

use crate::algs::communicator::{Communicator, DofCommTags};
use crate::algs::ghost_exchange::{discover_subscriptions, exchange_records};
use crate::data::address_table::AddressTable;
use crate::data::unknown_manager::{DofStorage, UnknownManager};
use crate::mesh_error::MeshGhostError;
use crate::topology::cell::Cell;
use crate::topology::registry::CellRegistry;

/// Where the nodes of a cell are.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NodeScheme {
    /// One node per cell (finite volumes).
    #[default]
    CellCentered,
    /// One node per cell vertex, not shared between cells (discontinuous
    /// piecewise-linear).
    PerVertex,
}

impl NodeScheme {
    pub fn nodes_of(self, cell: &Cell) -> usize {
        match self {
            NodeScheme::CellCentered => 1,
            NodeScheme::PerVertex => cell.vertex_ids.len(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CellBlock {
    owner: usize,
    block: u64,
    nodes: usize,
}

/// Words per cell in the block-offset exchange: `[global_id, block, nodes]`.
const BLOCK_RECORD_WORDS: usize = 3;

#[derive(Clone, Debug)]
pub struct DofMap {
    scheme: NodeScheme,
    unknowns: UnknownManager,
    table: AddressTable,
    num_local_nodes: u64,
    native: HashMap<u64, CellBlock>,
    foreign: HashMap<u64, CellBlock>,
    // sorted global addresses of every ghost DOF
    ghost_addresses: Vec<u64>,
}

impl DofMap {
    /// Number the DOFs of every native cell and learn the block offsets of
    /// the ghost cells. Collective over `comm`.
    pub fn build<C: Communicator>(
        registry: &CellRegistry,
        scheme: NodeScheme,
        unknowns: UnknownManager,
        comm: &C,
        tags: DofCommTags,
    ) -> Result<Self, MeshGhostError> {
        let me = comm.rank();
        let n = unknowns.total_unknown_structure_size() as u64;

        // 1) local block offsets
        let mut native = HashMap::with_capacity(registry.num_native());
        let mut blocks = Vec::with_capacity(registry.num_native());
        let mut next = 0u64;
        for cell in registry.native_cells() {
            let nodes = scheme.nodes_of(cell);
            let b = CellBlock {
                owner: me,
                block: next,
                nodes,
            };
            native.insert(cell.global_id, b);
            blocks.push(b);
            next += nodes as u64;
        }
        let num_local_nodes = next;

        // 2) address range
        let table = AddressTable::build(comm, num_local_nodes * n, tags.address)?;

        // 3) ship the block offsets of shared cells
        let mut outgoing = BTreeMap::new();
        for (rank, local_ids) in discover_subscriptions(registry) {
            let mut words = Vec::with_capacity(local_ids.len() * BLOCK_RECORD_WORDS);
            for local_id in local_ids {
                if let Some(cell) = registry.native_cell(local_id) {
                    let b = blocks[local_id];
                    // registered ids never exceed MAX_GLOBAL_ID
                    words.extend([cell.global_id as i64, b.block as i64, b.nodes as i64]);
                }
            }
            outgoing.insert(rank, words);
        }
        let incoming = exchange_records(comm, &outgoing, tags.blocks)?;

        let mut foreign = HashMap::new();
        for (src, words) in incoming {
            if words.len() % BLOCK_RECORD_WORDS != 0 {
                log::error!("[rank {me}] block offsets from rank {src} are ragged");
                return Err(MeshGhostError::TruncatedRecord {
                    offset: words.len() - words.len() % BLOCK_RECORD_WORDS,
                    len: words.len(),
                });
            }
            for rec in words.chunks_exact(BLOCK_RECORD_WORDS) {
                let field = |field: &'static str, value: i64| {
                    u64::try_from(value).map_err(|_| MeshGhostError::InvalidField { field, value })
                };
                let global_id = field("global_id", rec[0])?;
                let b = CellBlock {
                    owner: src,
                    block: field("block", rec[1])?,
                    nodes: field("nodes", rec[2])? as usize,
                };
                foreign.insert(global_id, b);
            }
        }
        let mut map = Self {
            scheme,
            unknowns,
            table,
            num_local_nodes,
            native,
            foreign,
            ghost_addresses: Vec::new(),
        };
        map.ghost_addresses = map.collect_ghost_addresses()?;
        log::debug!(
            "[rank {me}] dof map: {num_local_nodes} nodes, {} ghost cells, {} ghost dofs",
            map.foreign.len(),
            map.ghost_addresses.len()
        );
        Ok(map)
    }

    fn collect_ghost_addresses(&self) -> Result<Vec<u64>, MeshGhostError> {
        let mut out = Vec::new();
        for (&gid, b) in &self.foreign {
            for node in 0..b.nodes {
                for (uk_id, uk) in self.unknowns.unknowns().iter().enumerate() {
                    for c in 0..uk.num_components() {
                        out.push(self.map_dof(gid, node, uk_id, c)?);
                    }
                }
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    pub fn scheme(&self) -> NodeScheme {
        self.scheme
    }

    pub fn unknown_manager(&self) -> &UnknownManager {
        &self.unknowns
    }

    pub fn address_table(&self) -> &AddressTable {
        &self.table
    }

    pub fn num_local_nodes(&self) -> u64 {
        self.num_local_nodes
    }

    pub fn num_local_dofs(&self) -> u64 {
        self.table.local_range().count
    }

    pub fn num_global_dofs(&self) -> u64 {
        self.table.total()
    }

    pub fn num_ghost_dofs(&self) -> u64 {
        self.ghost_addresses.len() as u64
    }

    /// Length of a ghosted local vector.
    pub fn num_local_and_ghost_dofs(&self) -> u64 {
        self.num_local_dofs() + self.num_ghost_dofs()
    }

    fn cell_block(&self, global_id: u64) -> Result<CellBlock, MeshGhostError> {
        self.native
            .get(&global_id)
            .or_else(|| self.foreign.get(&global_id))
            .copied()
            .ok_or(MeshGhostError::CellNotFound(global_id))
    }

    /// Global address of `component` of `unknown_id` at `node` of a native
    /// or ghost cell.
    pub fn map_dof(
        &self,
        global_id: u64,
        node: usize,
        unknown_id: usize,
        component: usize,
    ) -> Result<u64, MeshGhostError> {
        let (owner, offset) = self.owner_offset(global_id, node, unknown_id, component)?;
        Ok(self.table.global_address(owner, offset))
    }

    /// Index of the DOF in a ghosted local vector: `[0, num_local_dofs)` for
    /// native cells, then the ghost DOFs in ascending global-address order.
    pub fn map_dof_local(
        &self,
        global_id: u64,
        node: usize,
        unknown_id: usize,
        component: usize,
    ) -> Result<u64, MeshGhostError> {
        let (owner, offset) = self.owner_offset(global_id, node, unknown_id, component)?;
        if owner == self.table.rank() {
            return Ok(offset);
        }
        let address = self.table.global_address(owner, offset);
        let k = self
            .ghost_addresses
            .binary_search(&address)
            .map_err(|_| {
                MeshGhostError::InvariantViolation(format!(
                    "ghost dof {address} of cell {global_id} is not in the ghost list"
                ))
            })?;
        Ok(self.num_local_dofs() + k as u64)
    }

    /// Owning rank and offset inside the owner's address range.
    fn owner_offset(
        &self,
        global_id: u64,
        node: usize,
        unknown_id: usize,
        component: usize,
    ) -> Result<(usize, u64), MeshGhostError> {
        let b = self.cell_block(global_id)?;
        if node >= b.nodes {
            return Err(MeshGhostError::NodeOutOfRange {
                cell: global_id,
                node,
                num_nodes: b.nodes,
            });
        }
        let map = self.unknowns.map_unknown(unknown_id, component)? as u64;
        let n = self.unknowns.total_unknown_structure_size() as u64;
        let node_index = b.block + node as u64;
        let offset = match self.unknowns.storage() {
            DofStorage::Nodal => node_index * n + map,
            DofStorage::Block => {
                let owner_nodes = self.table.range(b.owner)?.count / n;
                map * owner_nodes + node_index
            }
        };
        Ok((b.owner, offset))
    }

    /// Every DOF address of every ghost cell, sorted.
    pub fn ghost_dof_addresses(&self) -> &[u64] {
        &self.ghost_addresses
    }
}
