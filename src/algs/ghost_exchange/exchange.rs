//! Stages 3 and 4 of the ghost exchange: size negotiation, then one
//! variable-size all-to-all of record words.
//!
//! Both steps are collectives. Every rank of the communicator must call
//! [`exchange_records`] with the same tags, even when it has nothing to send.

use std::collections::BTreeMap;

use crate::algs::communicator::{Communicator, GhostCommTags};
use crate::algs::wire::{bytes_to_words, word_bytes, words_to_bytes};
use crate::mesh_error::MeshGhostError;

/// Send `outgoing[r]` to rank `r` and return what every rank sent to us,
/// as `(source_rank, words)` in ascending source order. Ranks that sent
/// nothing are left out.
///
/// Records from one source keep their order.
pub fn exchange_records<C: Communicator>(
    comm: &C,
    outgoing: &BTreeMap<usize, Vec<i64>>,
    tags: GhostCommTags,
) -> Result<Vec<(usize, Vec<i64>)>, MeshGhostError> {
    let (me, n) = (comm.rank(), comm.size());

    let mut send_counts = vec![0u32; n];
    for (&dst, words) in outgoing {
        if dst >= n {
            return Err(MeshGhostError::RankOutOfRange { rank: dst, size: n });
        }
        send_counts[dst] = u32::try_from(words.len()).map_err(|_| MeshGhostError::CommError {
            neighbor: dst,
            message: format!("{} words exceed the size header", words.len()),
        })?;
    }

    // 1) size negotiation
    let recv_counts = comm.alltoall_counts(&send_counts, tags.sizes)?;
    log::debug!(
        "[rank {me}] ghost sizes: sending {:?} words, receiving {:?} words",
        send_counts,
        recv_counts
    );

    // 2) payload, packed in destination-rank order
    let mut send_words = Vec::with_capacity(send_counts.iter().map(|&c| c as usize).sum());
    for words in outgoing.values() {
        send_words.extend_from_slice(words);
    }
    let send_bytes: Vec<usize> = send_counts.iter().map(|&c| word_bytes(c as usize)).collect();
    let recv_bytes: Vec<usize> = recv_counts.iter().map(|&c| word_bytes(c as usize)).collect();
    let payload = comm.alltoallv(
        &words_to_bytes(&send_words),
        &send_bytes,
        &recv_bytes,
        tags.data,
    )?;

    // 3) split by source, displacements are the prefix sum of the counts
    let mut incoming = Vec::new();
    let mut displ = 0usize;
    for (src, &len) in recv_bytes.iter().enumerate() {
        let block = payload
            .get(displ..displ + len)
            .ok_or(MeshGhostError::BufferSizeMismatch {
                neighbor: src,
                expected: displ + len,
                got: payload.len(),
            })?;
        displ += len;
        if len == 0 {
            continue;
        }
        let words = bytes_to_words(block).map_err(|message| MeshGhostError::CommError {
            neighbor: src,
            message,
        })?;
        incoming.push((src, words));
    }
    Ok(incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{CommTag, NoComm, RayonComm};

    #[test]
    fn serial_exchange_loops_back() {
        let mut out = BTreeMap::new();
        out.insert(0, vec![1, -2, 3]);
        let got = exchange_records(&NoComm, &out, GhostCommTags::default()).unwrap();
        assert_eq!(got, vec![(0, vec![1, -2, 3])]);
    }

    #[test]
    fn destination_outside_communicator_is_rejected() {
        let mut out = BTreeMap::new();
        out.insert(4, vec![1]);
        assert_eq!(
            exchange_records(&NoComm, &out, GhostCommTags::default()),
            Err(MeshGhostError::RankOutOfRange { rank: 4, size: 1 })
        );
    }

    #[test]
    fn three_ranks_each_send_to_the_next() {
        let world = RayonComm::world(3);
        let tags = GhostCommTags::from_base(CommTag::new(0x100));
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let me = c.rank();
                        let mut out = BTreeMap::new();
                        out.insert((me + 1) % 3, vec![me as i64; me + 1]);
                        exchange_records(c, &out, tags).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], vec![(2, vec![2, 2, 2])]);
        assert_eq!(results[1], vec![(0, vec![0])]);
        assert_eq!(results[2], vec![(1, vec![1, 1])]);
    }
}
