//! Fixed, little-endian wire types for the exchange protocols.
//!
//! The layouts here are process-internal: they are only shared between the
//! sending and the receiving rank of a single run and are never persisted.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// A count carried on the wire (size negotiation).
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// One record word of a ghost-cell or block-offset payload.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireWord {
    pub v_le: i64,
}

impl WireWord {
    pub fn new(v: i64) -> Self {
        Self { v_le: v.to_le() }
    }
    pub fn get(&self) -> i64 {
        i64::from_le(self.v_le)
    }
}

/// An address offset handed from one rank to the next.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireOffset {
    pub v_le: u64,
}

impl WireOffset {
    pub fn new(v: u64) -> Self {
        Self { v_le: v.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.v_le)
    }
}

/// `(start, count)` of one rank's address range.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireAddressRange {
    pub start_le: u64,
    pub count_le: u64,
}

impl WireAddressRange {
    pub fn new(start: u64, count: u64) -> Self {
        Self {
            start_le: start.to_le(),
            count_le: count.to_le(),
        }
    }
    pub fn start(&self) -> u64 {
        u64::from_le(self.start_le)
    }
    pub fn count(&self) -> u64 {
        u64::from_le(self.count_le)
    }
}

/// Encode record words into a byte buffer.
pub fn words_to_bytes(words: &[i64]) -> Vec<u8> {
    let wire: Vec<WireWord> = words.iter().map(|&w| WireWord::new(w)).collect();
    cast_slice(&wire).to_vec()
}

/// Decode a byte buffer into record words. The length must be a multiple of
/// the word size.
pub fn bytes_to_words(bytes: &[u8]) -> Result<Vec<i64>, String> {
    if bytes.len() % size_of::<WireWord>() != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {}-byte words",
            bytes.len(),
            size_of::<WireWord>()
        ));
    }
    // `bytes` may be unaligned for i64, so copy through a zeroed buffer.
    let mut wire = vec![WireWord::zeroed(); bytes.len() / size_of::<WireWord>()];
    cast_slice_mut(&mut wire).copy_from_slice(bytes);
    Ok(wire.iter().map(WireWord::get).collect())
}

/// Byte length of `n` record words.
pub const fn word_bytes(n: usize) -> usize {
    n * size_of::<WireWord>()
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireWord>() == 8);
    assert!(size_of::<WireOffset>() == 8);
    assert!(size_of::<WireAddressRange>() == 16);
};
