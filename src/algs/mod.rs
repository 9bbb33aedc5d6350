//! Re-export public algorithms.

pub mod communicator;
pub mod directed_graph;
pub mod feedback_arc_set;
pub mod ghost_exchange;
pub mod wire;

pub use directed_graph::{DirectedGraph, GraphVertex};
pub use ghost_exchange::exchange_ghost_cells;
