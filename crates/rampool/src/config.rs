/// Pool geometry
///
/// Compile-time constants fixed for a given build, plus the chunk rounding
/// helper shared by both allocation policies.

/// Offset of a byte within the pool region. User-visible addresses are
/// always offsets; absolute pointers never leave the crate.
pub type PoolOffset = usize;

/// Total pool bytes; must be a power of two
pub const MEMORY_SIZE: usize = 8 * 1024 * 1024;

/// Bytes reserved ahead of each user offset for the size tag
pub const HEADER_SIZE: usize = 8;

/// Smallest chunk the buddy tree may produce
pub const MIN_MEM_CHUNK_SIZE: usize = 512;

/// Fixed object count per slab
pub const N_OBJS_PER_SLAB: usize = 64;

/// Round `n` up to the smallest chunk size the buddy tree can serve.
///
/// The result walks the geometric sequence `MIN_MEM_CHUNK_SIZE,
/// 2*MIN_MEM_CHUNK_SIZE, ...`; anything at or below the minimum rounds to
/// `MIN_MEM_CHUNK_SIZE` itself.
#[inline]
pub const fn next_chunk_size(n: usize) -> usize {
    let mut chunk = MIN_MEM_CHUNK_SIZE;
    while chunk < n {
        chunk *= 2;
    }
    chunk
}
