//! Global block addressing of per-rank DOFs.
//!
//! Every rank owns one half-open range `[start, start + count)` of a single
//! global address space. Ranges are assigned by a ring hand-off (rank `r`
//! waits for the end of rank `r - 1`'s range and passes its own end on to
//! `r + 1`), then published to all ranks with an all-gather. The published
//! table is contiguous from zero in rank order, so each address has exactly
//! one owner.
//!
//! The ring has no timeout: a rank whose predecessor never sends blocks
//! forever.

use crate::algs::communicator::{AddressCommTags, Communicator, Wait, recv_exact};
use crate::algs::wire::{WireAddressRange, WireOffset, cast_slice, cast_slice_mut};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshGhostError;
use bytemuck::Zeroable;

/// `[start, start + count)` in the global address space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AddressRange {
    pub start: u64,
    pub count: u64,
}

impl AddressRange {
    pub const fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }

    #[inline]
    pub const fn end(&self) -> u64 {
        self.start + self.count
    }

    #[inline]
    pub const fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end()
    }
}

/// The published address ranges of all ranks, seen from one rank.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AddressTable {
    rank: usize,
    ranges: Vec<AddressRange>,
    total: u64,
}

impl AddressTable {
    /// Assign this rank `local_count` addresses. Collective over `comm`.
    pub fn build<C: Communicator>(
        comm: &C,
        local_count: u64,
        tags: AddressCommTags,
    ) -> Result<Self, MeshGhostError> {
        let (me, n) = (comm.rank(), comm.size());

        // 1) ring hand-off
        let start = if me == 0 {
            0
        } else {
            let mut start = WireOffset::new(0);
            recv_exact(
                comm,
                me - 1,
                tags.handoff.as_u16(),
                cast_slice_mut(std::slice::from_mut(&mut start)),
            )
            .inspect_err(|e| log::error!("[rank {me}] address hand-off failed: {e}"))?;
            start.get()
        };
        let local = AddressRange::new(start, local_count);
        if me + 1 < n {
            let next = WireOffset::new(local.end());
            let _ = comm
                .isend(me + 1, tags.handoff.as_u16(), cast_slice(std::slice::from_ref(&next)))
                .wait();
        }
        log::debug!("[rank {me}] address range [{}, {})", local.start, local.end());

        // 2) publication
        let wire = WireAddressRange::new(local.start, local.count);
        let gathered = comm.allgather(cast_slice(std::slice::from_ref(&wire)), tags.publish)?;
        let expected = n * std::mem::size_of::<WireAddressRange>();
        if gathered.len() != expected {
            return Err(MeshGhostError::BufferSizeMismatch {
                neighbor: me,
                expected,
                got: gathered.len(),
            });
        }
        let mut published = vec![WireAddressRange::zeroed(); n];
        cast_slice_mut(&mut published).copy_from_slice(&gathered);
        let ranges = published
            .iter()
            .map(|w| AddressRange::new(w.start(), w.count()))
            .collect();

        let table = Self::from_ranges(me, ranges)
            .inspect_err(|e| log::error!("[rank {me}] published address ranges: {e}"))?;
        if table.ranges[me] != local {
            let e = MeshGhostError::AddressRangeMismatch {
                rank: me,
                expected: local.start,
                got: table.ranges[me].start,
            };
            log::error!("[rank {me}] published address ranges: {e}");
            return Err(e);
        }
        Ok(table)
    }

    /// Table over already known ranges, as seen from `rank`.
    ///
    /// Fails with `AddressRangeMismatch` unless the ranges are contiguous
    /// from zero in rank order, and with `RankOutOfRange` if `rank` has no
    /// range.
    pub fn from_ranges(rank: usize, ranges: Vec<AddressRange>) -> Result<Self, MeshGhostError> {
        if rank >= ranges.len() {
            return Err(MeshGhostError::RankOutOfRange {
                rank,
                size: ranges.len(),
            });
        }
        let total = contiguous_end(&ranges)?;
        Ok(Self {
            rank,
            ranges,
            total,
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn num_ranks(&self) -> usize {
        self.ranges.len()
    }

    pub fn local_range(&self) -> AddressRange {
        self.ranges[self.rank]
    }

    pub fn range(&self, rank: usize) -> Result<AddressRange, MeshGhostError> {
        self.ranges
            .get(rank)
            .copied()
            .ok_or(MeshGhostError::RankOutOfRange {
                rank,
                size: self.ranges.len(),
            })
    }

    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    /// Number of addresses over all ranks.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// `start[owner] + offset`.
    ///
    /// `offset` is not checked against the owner's count: an offset past the
    /// end silently aliases an address of the next rank. Use
    /// [`Self::checked_global_address`] where the offset is not trusted.
    ///
    /// # Panics
    /// If `owner` is not a rank of the table.
    #[inline]
    pub fn global_address(&self, owner: usize, offset: u64) -> u64 {
        self.ranges[owner].start + offset
    }

    pub fn checked_global_address(&self, owner: usize, offset: u64) -> Result<u64, MeshGhostError> {
        let range = self.range(owner)?;
        if offset >= range.count {
            return Err(MeshGhostError::AddressOutOfRange {
                owner,
                offset,
                count: range.count,
            });
        }
        Ok(range.start + offset)
    }

    /// Rank owning `address`, or `None` past the end of the address space.
    pub fn owner_of(&self, address: u64) -> Option<usize> {
        // ends are non-decreasing, so this finds the first range ending past
        // the address; empty ranges before it are skipped
        let r = self.ranges.partition_point(|range| range.end() <= address);
        (r < self.ranges.len()).then_some(r)
    }
}

impl DebugInvariants for AddressTable {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "AddressTable");
    }

    fn validate_invariants(&self) -> Result<(), MeshGhostError> {
        let end = contiguous_end(&self.ranges)?;
        if end != self.total {
            return Err(MeshGhostError::InvariantViolation(format!(
                "ranges end at {end}, total is {}",
                self.total
            )));
        }
        Ok(())
    }
}

/// End of the last range, provided the ranges tile `[0, end)` in rank order.
fn contiguous_end(ranges: &[AddressRange]) -> Result<u64, MeshGhostError> {
    let mut expected = 0u64;
    for (rank, range) in ranges.iter().enumerate() {
        if range.start != expected {
            return Err(MeshGhostError::AddressRangeMismatch {
                rank,
                expected,
                got: range.start,
            });
        }
        expected = range
            .start
            .checked_add(range.count)
            .ok_or(MeshGhostError::AddressOutOfRange {
                owner: rank,
                offset: range.start,
                count: range.count,
            })?;
    }
    Ok(expected)
}
