//! MeshGhostError: unified error type for mesh-ghost public APIs
//!
//! Lookup failures (`CellNotFound`, out-of-range unknowns) are recoverable and
//! may be turned into a diagnostic by the caller. Protocol anomalies mean the
//! distributed exchange is corrupted or mismatched; [`MeshGhostError::is_fatal`]
//! reports them and the driver must abort every rank.

use thiserror::Error;

/// Unified error type for mesh-ghost operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshGhostError {
    /// The global id is neither a native nor a foreign cell on this rank.
    #[error("cell with global id {0} is not registered on this rank")]
    CellNotFound(u64),

    /// A ghost record carried a cell-type tag this build does not know.
    #[error("unsupported cell type tag {tag} at word {offset} of the ghost buffer")]
    UnknownCellType { tag: i64, offset: usize },

    /// A ghost record ended before all of its announced fields were read.
    #[error("ghost record truncated at word {offset} (buffer holds {len} words)")]
    TruncatedRecord { offset: usize, len: usize },

    /// A ghost record field holds a value outside its domain (a negative
    /// count, a material id wider than 32 bits, a cell owned by the receiver).
    #[error("invalid value {value} in ghost record field `{field}`")]
    InvalidField { field: &'static str, value: i64 },

    /// A received cell is already registered on this rank.
    #[error("ghost exchange delivered cell {0}, which is already registered")]
    DuplicateGhostCell(u64),

    /// A cell references a vertex the replicated vertex table does not hold.
    #[error("vertex id {vertex} out of range (vertex table holds {len} vertices)")]
    VertexOutOfRange { vertex: u64, len: usize },

    /// Point-to-point or collective communication failed.
    #[error("communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },

    /// A received buffer does not have the announced size.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },

    /// Published address ranges are not contiguous from zero in rank order.
    #[error("address range of rank {rank} starts at {got}, expected {expected}")]
    AddressRangeMismatch { rank: usize, expected: u64, got: u64 },

    /// Offset is outside the published range of the owning rank.
    #[error("offset {offset} out of range for rank {owner} (owns {count} addresses)")]
    AddressOutOfRange { owner: usize, offset: u64, count: u64 },

    /// Rank argument is not part of the communicator.
    #[error("rank {rank} out of range (communicator size {size})")]
    RankOutOfRange { rank: usize, size: usize },

    /// The unknown id is not registered with the unknown manager.
    #[error("unknown id {0} is not registered")]
    UnknownOutOfRange(usize),

    /// The component does not exist for the given unknown.
    #[error("component {component} out of range for unknown {unknown} ({num_components} components)")]
    ComponentOutOfRange {
        unknown: usize,
        component: usize,
        num_components: usize,
    },

    /// The node index exceeds the node count of the cell.
    #[error("node {node} out of range for cell {cell} ({num_nodes} nodes)")]
    NodeOutOfRange {
        cell: u64,
        node: usize,
        num_nodes: usize,
    },

    /// MPI could not be initialized (or was initialized twice).
    #[error("MPI initialization failed")]
    MpiInit,

    /// A data-structure invariant does not hold.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl MeshGhostError {
    /// Returns true for protocol anomalies that leave the distributed state
    /// inconsistent. These must terminate the whole run, not only this rank.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MeshGhostError::UnknownCellType { .. }
                | MeshGhostError::TruncatedRecord { .. }
                | MeshGhostError::InvalidField { .. }
                | MeshGhostError::DuplicateGhostCell(_)
                | MeshGhostError::VertexOutOfRange { .. }
                | MeshGhostError::CommError { .. }
                | MeshGhostError::BufferSizeMismatch { .. }
                | MeshGhostError::AddressRangeMismatch { .. }
                | MeshGhostError::MpiInit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_errors_are_recoverable() {
        assert!(!MeshGhostError::CellNotFound(7).is_fatal());
        assert!(
            !MeshGhostError::AddressOutOfRange {
                owner: 1,
                offset: 9,
                count: 3
            }
            .is_fatal()
        );
    }

    #[test]
    fn protocol_errors_are_fatal() {
        assert!(MeshGhostError::UnknownCellType { tag: 9, offset: 0 }.is_fatal());
        assert!(
            MeshGhostError::BufferSizeMismatch {
                neighbor: 1,
                expected: 8,
                got: 4
            }
            .is_fatal()
        );
    }

    #[test]
    fn display_mentions_the_id() {
        let msg = MeshGhostError::CellNotFound(42).to_string();
        assert!(msg.contains("42"));
    }
}
