//! Structural self-checks run at the end of each bulk construction phase.

use crate::mesh_error::MeshGhostError;

/// Compiled-in when building with debug assertions or with either the
/// `check-invariants` or the `strict-invariants` feature.
pub const CHECKS_ENABLED: bool = cfg!(any(
    debug_assertions,
    feature = "strict-invariants",
    feature = "check-invariants"
));

/// Types whose internal bookkeeping can be verified after construction.
pub trait DebugInvariants {
    /// Panic on the first broken invariant if [`CHECKS_ENABLED`].
    fn debug_assert_invariants(&self);
    /// First broken invariant, if any. Always available.
    fn validate_invariants(&self) -> Result<(), MeshGhostError>;
}

/// `debug_invariants!(check, "where")` panics with the error of `check` when
/// [`CHECKS_ENABLED`](crate::debug_invariants::CHECKS_ENABLED); otherwise
/// `check` is not evaluated.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $site:literal) => {
        if $crate::debug_invariants::CHECKS_ENABLED {
            if let Err(e) = $check {
                panic!(concat!("[invariants] ", $site, ": {}"), e);
            }
        }
    };
}
