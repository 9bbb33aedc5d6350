//! Ghost-cell exchange between neighbouring ranks.
//!
//! After [`exchange_ghost_cells`] the foreign view of every rank's
//! [`CellRegistry`] holds exactly the cells that share a face with one of its
//! native cells but are owned elsewhere. The protocol runs once per mesh:
//!
//! 1. [`discover_subscriptions`]: which native cells each remote rank needs;
//! 2. [`serialize_cell`]: flatten those cells into integer records;
//! 3. + 4. [`exchange_records`]: size negotiation and the payload all-to-all;
//! 5. [`deserialize_cells`]: rebuild the cells and register them as foreign.
//!
//! Every received buffer is decoded and checked before the first cell is
//! registered, so a protocol error leaves the registry untouched. Such
//! errors are fatal (see [`MeshGhostError::is_fatal`]).

pub mod cell_record;
pub mod discovery;
pub mod exchange;

pub use cell_record::{deserialize_cells, serialize_cell};
pub use discovery::discover_subscriptions;
pub use exchange::exchange_records;

use std::collections::{BTreeMap, BTreeSet};

use crate::algs::communicator::{Communicator, GhostCommTags};
use crate::debug_invariants::DebugInvariants;
use crate::geometry::VertexTable;
use crate::mesh_error::MeshGhostError;
use crate::topology::registry::CellRegistry;

/// Populate the foreign cells of `registry`. Collective over `comm`.
///
/// Returns the number of foreign cells registered.
///
/// # Panics
/// If the registry belongs to another rank than `comm`, or is finalized.
pub fn exchange_ghost_cells<C: Communicator>(
    registry: &mut CellRegistry,
    vertices: &VertexTable,
    comm: &C,
    tags: GhostCommTags,
) -> Result<usize, MeshGhostError> {
    let me = comm.rank();
    assert_eq!(
        registry.rank(),
        me,
        "registry of rank {} used on rank {me}",
        registry.rank()
    );
    assert!(
        !registry.is_finalized(),
        "ghost exchange on a finalized registry"
    );

    let subscriptions = discover_subscriptions(registry);
    let mut outgoing = BTreeMap::new();
    for (&rank, local_ids) in &subscriptions {
        let mut words = Vec::new();
        for &local_id in local_ids {
            if let Some(cell) = registry.native_cell(local_id) {
                serialize_cell(cell, &mut words);
            }
        }
        log::debug!(
            "[rank {me}] sending {} cells ({} words) to rank {rank}",
            local_ids.len(),
            words.len()
        );
        outgoing.insert(rank, words);
    }

    let incoming = exchange_records(comm, &outgoing, tags).inspect_err(|e| {
        log::error!("[rank {me}] ghost exchange failed: {e}");
    })?;

    let mut decoded = Vec::new();
    let mut seen = BTreeSet::new();
    for (src, words) in incoming {
        let cells = deserialize_cells(&words, vertices).inspect_err(|e| {
            log::error!("[rank {me}] bad ghost buffer from rank {src}: {e}");
        })?;
        log::debug!("[rank {me}] received {} cells from rank {src}", cells.len());
        for cell in cells {
            if cell.partition_id != src {
                log::error!(
                    "[rank {me}] rank {src} sent cell {} owned by rank {}",
                    cell.global_id,
                    cell.partition_id
                );
                return Err(MeshGhostError::InvalidField {
                    field: "partition_id",
                    value: cell.partition_id as i64,
                });
            }
            if registry.contains(cell.global_id) || !seen.insert(cell.global_id) {
                log::error!("[rank {me}] ghost cell {} delivered twice", cell.global_id);
                return Err(MeshGhostError::DuplicateGhostCell(cell.global_id));
            }
            decoded.push(cell);
        }
    }

    let count = decoded.len();
    for cell in decoded {
        registry.register_foreign(cell);
    }
    crate::debug_invariants!(registry.validate_invariants(), "exchange_ghost_cells");
    Ok(count)
}
