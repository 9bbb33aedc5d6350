//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Point-to-point handles are **waitable**: callers `.wait()` before they trust
//! that a buffer is ready. The collectives (`barrier`, `alltoall_counts`,
//! `alltoallv`, `allgather`) must be entered by every rank of the
//! communicator, in the same order, or the run deadlocks.
//!
//! The default collective implementations are built from `isend`/`irecv` so
//! any backend with working point-to-point messaging gets them for free;
//! [`NoComm`] and `MpiComm` override them.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::algs::wire::{WireCount, cast_slice, cast_slice_mut};
use crate::mesh_error::MeshGhostError;

/// Typed message tag. Every protocol derives its tags from a base so that
/// independent exchanges never consume each other's messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `k` steps after this one (wrapping).
    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Tags used by the ghost-cell exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GhostCommTags {
    pub sizes: CommTag,
    pub data: CommTag,
}

impl GhostCommTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            sizes: base,
            data: base.offset(1),
        }
    }
}

impl Default for GhostCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0x6A00))
    }
}

/// Tags used by the address ring hand-off and its publication.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AddressCommTags {
    pub handoff: CommTag,
    pub publish: CommTag,
}

impl AddressCommTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            handoff: base,
            publish: base.offset(1),
        }
    }
}

impl Default for AddressCommTags {
    fn default() -> Self {
        // 111 is the tag the ring hand-off has always used.
        Self::from_base(CommTag::new(111))
    }
}

/// Tags used while building a DOF map: the address assignment and the
/// exchange of ghost block offsets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DofCommTags {
    pub address: AddressCommTags,
    pub blocks: GhostCommTags,
}

impl DofCommTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            address: AddressCommTags::from_base(base),
            blocks: GhostCommTags::from_base(base.offset(2)),
        }
    }
}

impl Default for DofCommTags {
    fn default() -> Self {
        Self {
            address: AddressCommTags::default(),
            blocks: GhostCommTags::from_base(CommTag::new(0x6B00)),
        }
    }
}

/// Message-passing interface.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of at most `buf.len()` bytes. The data is returned by
    /// [`Wait::wait`]; `buf` only fixes the expected length.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process's rank.
    fn rank(&self) -> usize;
    /// Number of ranks in the communicator.
    fn size(&self) -> usize;

    /// Returns true for the serial no-op communicator.
    fn is_no_comm(&self) -> bool {
        false
    }

    /// Block until every rank has entered the barrier.
    fn barrier(&self, tag: CommTag) -> Result<(), MeshGhostError> {
        let (me, n) = (self.rank(), self.size());
        if n <= 1 {
            return Ok(());
        }
        let t = tag.as_u16();
        if me == 0 {
            for peer in 1..n {
                let mut token = [0u8; 1];
                recv_exact(self, peer, t, &mut token)?;
            }
            let sends: Vec<_> = (1..n).map(|peer| self.isend(peer, t, &[1])).collect();
            for s in sends {
                let _ = s.wait();
            }
        } else {
            let _ = self.isend(0, t, &[1]).wait();
            let mut token = [0u8; 1];
            recv_exact(self, 0, t, &mut token)?;
        }
        Ok(())
    }

    /// All-to-all exchange of one count per rank pair.
    ///
    /// `send[r]` is the count announced to rank `r`; the result holds at index
    /// `r` the count rank `r` announced to us.
    fn alltoall_counts(&self, send: &[u32], tag: CommTag) -> Result<Vec<u32>, MeshGhostError> {
        let n = self.size();
        check_len(send.len(), n, self.rank())?;
        let t = tag.as_u16();
        let me = self.rank();

        let mut recv_size = Vec::with_capacity(n);
        for peer in 0..n {
            let mut cnt = WireCount::new(0);
            let h = self.irecv(peer, t, cast_slice_mut(std::slice::from_mut(&mut cnt)));
            recv_size.push((peer, h));
        }
        let mut pending_sends = Vec::with_capacity(n);
        for (peer, &count) in send.iter().enumerate() {
            let wire = WireCount::new(count as usize);
            pending_sends.push(self.isend(peer, t, cast_slice(std::slice::from_ref(&wire))));
        }

        // wait for every receive, keep the first error but keep draining
        let mut counts = vec![0u32; n];
        let mut maybe_err = None;
        for (peer, h) in recv_size {
            match h.wait() {
                Some(data) if data.len() == std::mem::size_of::<WireCount>() => {
                    let mut cnt = WireCount::new(0);
                    cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
                    counts[peer] = cnt.get() as u32;
                }
                Some(data) if maybe_err.is_none() => {
                    maybe_err = Some(MeshGhostError::BufferSizeMismatch {
                        neighbor: peer,
                        expected: std::mem::size_of::<WireCount>(),
                        got: data.len(),
                    });
                }
                None if maybe_err.is_none() => {
                    maybe_err = Some(MeshGhostError::CommError {
                        neighbor: peer,
                        message: format!("rank {me} failed to receive count from rank {peer}"),
                    });
                }
                _ => {}
            }
        }
        for s in pending_sends {
            let _ = s.wait();
        }
        match maybe_err {
            Some(err) => Err(err),
            None => Ok(counts),
        }
    }

    /// Variable-size all-to-all.
    ///
    /// `send` is the concatenation of the per-destination byte blocks in rank
    /// order, `send_counts[r]` the length of the block for rank `r`. The
    /// result is the concatenation of the received blocks in source-rank
    /// order, `recv_counts[r]` bytes from rank `r`.
    fn alltoallv(
        &self,
        send: &[u8],
        send_counts: &[usize],
        recv_counts: &[usize],
        tag: CommTag,
    ) -> Result<Vec<u8>, MeshGhostError> {
        let n = self.size();
        let me = self.rank();
        check_len(send_counts.len(), n, me)?;
        check_len(recv_counts.len(), n, me)?;
        let total_send: usize = send_counts.iter().sum();
        if total_send != send.len() {
            return Err(MeshGhostError::BufferSizeMismatch {
                neighbor: me,
                expected: total_send,
                got: send.len(),
            });
        }
        let t = tag.as_u16();

        let mut recv_data = Vec::with_capacity(n);
        for (peer, &len) in recv_counts.iter().enumerate() {
            let mut buf = vec![0u8; len];
            let h = self.irecv(peer, t, &mut buf);
            recv_data.push((peer, len, h));
        }
        let mut pending_sends = Vec::with_capacity(n);
        let mut displ = 0usize;
        for (peer, &len) in send_counts.iter().enumerate() {
            pending_sends.push(self.isend(peer, t, &send[displ..displ + len]));
            displ += len;
        }

        let mut out = Vec::with_capacity(recv_counts.iter().sum());
        let mut maybe_err = None;
        for (peer, len, h) in recv_data {
            match h.wait() {
                Some(data) if data.len() == len => {
                    if maybe_err.is_none() {
                        out.extend_from_slice(&data);
                    }
                }
                // an empty block may be reported as "no data" by some backends
                None if len == 0 => {}
                Some(data) if maybe_err.is_none() => {
                    maybe_err = Some(MeshGhostError::BufferSizeMismatch {
                        neighbor: peer,
                        expected: len,
                        got: data.len(),
                    });
                }
                None if maybe_err.is_none() => {
                    maybe_err = Some(MeshGhostError::CommError {
                        neighbor: peer,
                        message: "no data received (wait returned None)".into(),
                    });
                }
                _ => {}
            }
        }
        for s in pending_sends {
            let _ = s.wait();
        }
        match maybe_err {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }

    /// Every rank contributes `send` (same length everywhere); the result is
    /// the concatenation of all contributions in rank order.
    fn allgather(&self, send: &[u8], tag: CommTag) -> Result<Vec<u8>, MeshGhostError> {
        let n = self.size();
        let send_counts = vec![send.len(); n];
        let mut payload = Vec::with_capacity(send.len() * n);
        for _ in 0..n {
            payload.extend_from_slice(send);
        }
        self.alltoallv(&payload, &send_counts, &send_counts, tag)
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

fn check_len(len: usize, size: usize, me: usize) -> Result<(), MeshGhostError> {
    if len == size {
        Ok(())
    } else {
        Err(MeshGhostError::CommError {
            neighbor: me,
            message: format!("collective argument has {len} entries, communicator has {size} ranks"),
        })
    }
}

/// Blocking receive of exactly `buf.len()` bytes from `peer`.
pub fn recv_exact<C: Communicator + ?Sized>(
    comm: &C,
    peer: usize,
    tag: u16,
    buf: &mut [u8],
) -> Result<(), MeshGhostError> {
    let expected = buf.len();
    let data = comm
        .irecv(peer, tag, buf)
        .wait()
        .ok_or_else(|| MeshGhostError::CommError {
            neighbor: peer,
            message: "no data received (wait returned None)".into(),
        })?;
    if data.len() != expected {
        return Err(MeshGhostError::BufferSizeMismatch {
            neighbor: peer,
            expected,
            got: data.len(),
        });
    }
    buf.copy_from_slice(&data);
    Ok(())
}

// --- NoComm: serial ---

/// Compile-time no-op comm for pure serial runs: one rank, collectives copy
/// the local contribution back.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }

    fn barrier(&self, _tag: CommTag) -> Result<(), MeshGhostError> {
        Ok(())
    }

    fn alltoall_counts(&self, send: &[u32], _tag: CommTag) -> Result<Vec<u32>, MeshGhostError> {
        check_len(send.len(), 1, 0)?;
        Ok(send.to_vec())
    }

    fn alltoallv(
        &self,
        send: &[u8],
        send_counts: &[usize],
        recv_counts: &[usize],
        _tag: CommTag,
    ) -> Result<Vec<u8>, MeshGhostError> {
        check_len(send_counts.len(), 1, 0)?;
        check_len(recv_counts.len(), 1, 0)?;
        if send.len() != recv_counts[0] {
            return Err(MeshGhostError::BufferSizeMismatch {
                neighbor: 0,
                expected: recv_counts[0],
                got: send.len(),
            });
        }
        Ok(send.to_vec())
    }

    fn allgather(&self, send: &[u8], _tag: CommTag) -> Result<Vec<u8>, MeshGhostError> {
        Ok(send.to_vec())
    }
}

// --- RayonComm: intra-process / one thread per rank ---

type Key = (usize, usize, u16); // (src, dst, tag)

/// Shared mailbox. Messages with the same `(src, dst, tag)` are delivered in
/// send order.
#[derive(Default)]
pub struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    signal: Mutex<()>,
    ready: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.slots.entry(key).or_default().push_back(data);
        let _guard = self.signal.lock();
        self.ready.notify_all();
    }

    fn try_take(&self, key: &Key) -> Option<Bytes> {
        self.slots.get_mut(key).and_then(|mut q| q.pop_front())
    }

    fn take(&self, key: &Key) -> Bytes {
        let mut guard = self.signal.lock();
        loop {
            if let Some(bytes) = self.try_take(key) {
                return bytes;
            }
            self.ready.wait(&mut guard);
        }
    }
}

static GLOBAL_MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(Mailbox::default()));

/// Pending receive on a [`RayonComm`]; blocks in `wait` until the message
/// arrives.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let bytes = self.mailbox.take(&self.key);
        let n = bytes.len().min(self.len);
        Some(bytes[..n].to_vec())
    }
}

/// One handle per simulated rank; all handles of one world share a mailbox.
#[derive(Clone)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for RayonComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl RayonComm {
    /// Handle on the process-wide mailbox. Independent groups built this way
    /// must use disjoint tags.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: Arc::clone(&GLOBAL_MAILBOX),
        }
    }

    /// `size` handles (ranks `0..size`) sharing a private mailbox.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use mpi::Count;

    pub struct MpiComm {
        _universe: mpi::environment::Universe,
        pub world: SimpleCommunicator,
        pub rank: usize,
        pub size: usize,
    }

    // MPI handles are only driven from the thread that owns the rank.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        pub fn new() -> Result<Self, MeshGhostError> {
            let universe = mpi::initialize().ok_or(MeshGhostError::MpiInit)?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    /// Deferred blocking receive; matched when waited on.
    pub struct MpiRecv {
        peer: i32,
        tag: i32,
        len: usize,
    }

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            let world = SimpleCommunicator::world();
            let (mut data, _status) = world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            data.truncate(self.len);
            Some(data)
        }
    }

    fn counts_and_displs(counts: &[usize]) -> (Vec<Count>, Vec<Count>) {
        let c: Vec<Count> = counts.iter().map(|&x| x as Count).collect();
        let d: Vec<Count> = c
            .iter()
            .scan(0, |acc, &x| {
                let tmp = *acc;
                *acc += x;
                Some(tmp)
            })
            .collect();
        (c, d)
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecv {
            MpiRecv {
                peer: peer as i32,
                tag: tag as i32,
                len: buf.len(),
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self, _tag: CommTag) -> Result<(), MeshGhostError> {
            self.world.barrier();
            Ok(())
        }

        fn alltoall_counts(&self, send: &[u32], _tag: CommTag) -> Result<Vec<u32>, MeshGhostError> {
            check_len(send.len(), self.size, self.rank)?;
            let mut recv = vec![0u32; self.size];
            self.world.all_to_all_into(send, &mut recv[..]);
            Ok(recv)
        }

        fn alltoallv(
            &self,
            send: &[u8],
            send_counts: &[usize],
            recv_counts: &[usize],
            _tag: CommTag,
        ) -> Result<Vec<u8>, MeshGhostError> {
            check_len(send_counts.len(), self.size, self.rank)?;
            check_len(recv_counts.len(), self.size, self.rank)?;
            let (sc, sd) = counts_and_displs(send_counts);
            let (rc, rd) = counts_and_displs(recv_counts);
            let mut recv = vec![0u8; recv_counts.iter().sum()];
            {
                let send_part = Partition::new(send, &sc[..], &sd[..]);
                let mut recv_part = PartitionMut::new(&mut recv[..], &rc[..], &rd[..]);
                self.world
                    .all_to_all_varcount_into(&send_part, &mut recv_part);
            }
            Ok(recv)
        }

        fn allgather(&self, send: &[u8], _tag: CommTag) -> Result<Vec<u8>, MeshGhostError> {
            let mut recv = vec![0u8; send.len() * self.size];
            self.world.all_gather_into(send, &mut recv[..]);
            Ok(recv)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
