//! Mesh topology: cells, their shapes, and the per-rank registry that tells
//! native cells from foreign (ghost) ones.
//!
//! Most users build [`Cell`]s, hand them to [`CellRegistry::register_native`]
//! and let the ghost exchange fill in the foreign view.

pub mod cell;
pub mod cell_type;
pub mod registry;

pub use cell::{Cell, CellFace, FaceNeighbor, MAX_GLOBAL_ID};
pub use cell_type::CellType;
pub use registry::{CellHandle, CellLocation, CellRegistry};
