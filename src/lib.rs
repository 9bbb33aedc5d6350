#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-ghost
//!
//! mesh-ghost keeps a partitioned unstructured mesh consistent across
//! cooperating ranks. Every rank knows which cells it owns, which cells it
//! borrows from its neighbours, and where every degree of freedom lives in
//! one global, contiguous address space.
//!
//! ## Features
//! - [`CellRegistry`](topology::CellRegistry): native cells with dense local
//!   ids, foreign (ghost) cells keyed by global id, `O(log n)` resolution
//! - Ghost-cell exchange: topology-only serialization of boundary cells,
//!   size negotiation and one variable-size all-to-all
//! - Global block addressing: ring hand-off of starting addresses followed
//!   by publication of every rank's range
//! - [`DofMap`](data::DofMap): `(cell, node, unknown, component)` to global
//!   address, nodal or block storage
//! - [`DirectedGraph`](algs::DirectedGraph): DFS, Tarjan SCC, Kahn
//!   topological sort, feedback-arc-set based cycle removal
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-ghost = "0.3"
//! # features = ["mpi-support"]
//! ```
//!
//! A typical setup, run on every rank:
//!
//! ```text
//! let mut registry = CellRegistry::new(comm.rank());
//! for cell in my_cells { registry.register_native(cell); }
//! exchange_ghost_cells(&mut registry, &vertices, &comm, GhostCommTags::default())?;
//! registry.finalize();
//! let dofs = DofMap::build(&registry, NodeScheme::PerVertex, unknowns, &comm, DofCommTags::default())?;
//! ```
//!
//! ## Errors
//!
//! Lookups fail with recoverable [`MeshGhostError`]s. Protocol anomalies
//! (corrupt ghost records, mismatched buffer sizes, inconsistent address
//! ranges) are reported by [`MeshGhostError::is_fatal`]; the distributed
//! state is then inconsistent and every rank must stop.

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod geometry;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use mesh_error::MeshGhostError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{
        AddressCommTags, CommTag, Communicator, DofCommTags, GhostCommTags, NoComm, RayonComm,
        Wait,
    };
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::directed_graph::DirectedGraph;
    pub use crate::algs::ghost_exchange::exchange_ghost_cells;
    pub use crate::data::address_table::{AddressRange, AddressTable};
    pub use crate::data::dof_map::{DofMap, NodeScheme};
    pub use crate::data::unknown_manager::{DofStorage, UnknownKind, UnknownManager};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::{Vector3, VertexTable};
    pub use crate::mesh_error::MeshGhostError;
    pub use crate::topology::cell::{Cell, CellFace};
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::registry::{CellLocation, CellRegistry};
}
