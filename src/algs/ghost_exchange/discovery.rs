//! Stage 1 of the ghost exchange: who needs which of my cells.

use itertools::Itertools;
use std::collections::BTreeMap;

use crate::topology::registry::CellRegistry;

/// For every remote rank, the ascending, duplicate-free local ids of native
/// cells with at least one face whose neighbour that rank owns.
///
/// Ranks that need nothing from us do not appear in the map.
pub fn discover_subscriptions(registry: &CellRegistry) -> BTreeMap<usize, Vec<usize>> {
    let me = registry.rank();
    let mut subscriptions: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (local_id, cell) in registry.native_cells().enumerate() {
        // native cells come in local-id order, so each list stays sorted
        for rank in cell.remote_neighbor_partitions(me).unique() {
            subscriptions.entry(rank).or_default().push(local_id);
        }
    }
    subscriptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cell::{Cell, CellFace};
    use crate::topology::cell_type::CellType;

    #[test]
    fn subscriptions_are_sorted_and_unique() {
        let mut reg = CellRegistry::new(0);
        // local 0: two faces towards rank 1
        reg.register_native(
            Cell::new(CellType::Polygon, 10, 0)
                .with_face(CellFace::new(vec![0, 1]).with_neighbor(20, 1))
                .with_face(CellFace::new(vec![1, 2]).with_neighbor(21, 1)),
        );
        // local 1: interior only
        reg.register_native(
            Cell::new(CellType::Polygon, 11, 0)
                .with_face(CellFace::new(vec![2, 3]).with_neighbor(10, 0)),
        );
        // local 2: ranks 2 and 1
        reg.register_native(
            Cell::new(CellType::Polygon, 12, 0)
                .with_face(CellFace::new(vec![3, 4]).with_neighbor(30, 2))
                .with_face(CellFace::new(vec![4, 5]).with_neighbor(22, 1))
                .with_face(CellFace::new(vec![5, 6])),
        );
        let subs = discover_subscriptions(&reg);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[&1], vec![0, 2]);
        assert_eq!(subs[&2], vec![2]);
    }

    #[test]
    fn no_remote_faces_no_subscriptions() {
        let mut reg = CellRegistry::new(3);
        reg.register_native(Cell::new(CellType::Slab, 1, 3));
        assert!(discover_subscriptions(&reg).is_empty());
    }
}
