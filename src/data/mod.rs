//! Data module: DOF addressing over the partitioned mesh.

/// Global address ranges per rank.
pub mod address_table;
/// `(cell, node, unknown, component)` to global address.
pub mod dof_map;
/// Per-node unknown structure.
pub mod unknown_manager;

pub use address_table::{AddressRange, AddressTable};
pub use dof_map::{DofMap, NodeScheme};
pub use unknown_manager::{DofStorage, Unknown, UnknownKind, UnknownManager};
