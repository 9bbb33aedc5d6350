//! Geometry utilities for mesh-ghost.
//!
//! Coordinates are replicated on every rank; cells only carry vertex ids.

pub mod vector;
pub mod vertices;

pub use vector::Vector3;
pub use vertices::VertexTable;
