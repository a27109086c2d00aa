/// Per-chunk size tag codec
///
/// The `HEADER_SIZE` bytes immediately below every user offset hold the
/// caller-requested size as a native-endian machine word. This codec is the
/// sole reader and writer of those bytes; both policies go through it so
/// `free` can recover the size without knowing who allocated.

use crate::config::{PoolOffset, HEADER_SIZE};

// The tag is stored as a u64; the two widths must agree.
const _: () = assert!(HEADER_SIZE == core::mem::size_of::<u64>());

/// Store `size` in the header ahead of `user_off`.
///
/// Callers guarantee `user_off` is at least `HEADER_SIZE` into the region;
/// the allocators never hand out anything closer to the pool base.
#[inline]
pub fn write_size(mem: &mut [u8], user_off: PoolOffset, size: usize) {
    let tag = user_off - HEADER_SIZE;
    mem[tag..user_off].copy_from_slice(&(size as u64).to_ne_bytes());
}

/// Read back the size stored ahead of `user_off`.
#[inline]
pub fn read_size(mem: &[u8], user_off: PoolOffset) -> usize {
    let tag = user_off - HEADER_SIZE;
    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&mem[tag..user_off]);
    u64::from_ne_bytes(raw) as usize
}
