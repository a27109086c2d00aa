/// Pool facade
///
/// Owns the RAM region, the buddy tree, and the slab descriptor table, and
/// dispatches the public operations to the policy fixed at setup. All
/// user-visible addresses are offsets into the region.

use crate::buddy::BuddyTree;
use crate::config::{
    next_chunk_size, PoolOffset, HEADER_SIZE, MIN_MEM_CHUNK_SIZE, N_OBJS_PER_SLAB,
};
use crate::error::PoolError;
use crate::header;
use crate::slab::{object_offset, SlabTable};

/// Allocation policy, fixed for the lifetime of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Buddy,
    Slab,
}

/// A RAM pool plus the bookkeeping of the selected policy
pub struct MemoryPool {
    policy: Policy,
    mem: Box<[u8]>,
    buddy: BuddyTree,
    slabs: SlabTable,
}

impl MemoryPool {
    /// One-shot initialisation over a host-supplied region.
    ///
    /// The region length must be a power of two no smaller than
    /// `MIN_MEM_CHUNK_SIZE`; it becomes the pool for the life of the value.
    pub fn setup(policy: Policy, mem: Box<[u8]>) -> Result<Self, PoolError> {
        let size = mem.len();
        if !size.is_power_of_two() {
            return Err(PoolError::SizeNotPowerOfTwo(size));
        }
        if size < MIN_MEM_CHUNK_SIZE {
            return Err(PoolError::SizeTooSmall {
                size,
                min: MIN_MEM_CHUNK_SIZE,
            });
        }
        log::info!("pool: {:?} policy over {} bytes", policy, size);
        Ok(Self {
            policy,
            buddy: BuddyTree::new(size),
            slabs: SlabTable::new(),
            mem,
        })
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn size(&self) -> usize {
        self.mem.len()
    }

    pub fn mem(&self) -> &[u8] {
        &self.mem
    }

    pub fn buddy(&self) -> &BuddyTree {
        &self.buddy
    }

    pub fn slab_table(&self) -> &SlabTable {
        &self.slabs
    }

    /// Allocate `size` user bytes. `None` means capacity exhausted; the
    /// pool is left untouched on that path.
    pub fn alloc(&mut self, size: usize) -> Option<PoolOffset> {
        if size == 0 {
            return None;
        }
        match self.policy {
            Policy::Buddy => self.buddy_alloc(size),
            Policy::Slab => self.slab_alloc(size),
        }
    }

    /// Release a previously returned user offset. Offsets the pool cannot
    /// resolve are ignored.
    pub fn free(&mut self, user_off: PoolOffset) {
        if user_off < HEADER_SIZE || user_off >= self.mem.len() {
            log::debug!("pool: free ignored, offset {} outside the pool", user_off);
            return;
        }
        match self.policy {
            Policy::Buddy => self.buddy.release_at(user_off - HEADER_SIZE),
            Policy::Slab => self.slab_free(user_off),
        }
    }

    fn buddy_alloc(&mut self, size: usize) -> Option<PoolOffset> {
        let need = size.checked_add(HEADER_SIZE)?;
        if need > self.mem.len() {
            log::warn!("pool: {} byte request exceeds the pool", size);
            return None;
        }
        let chunk = next_chunk_size(need);
        let node = self.buddy.reserve(chunk)?;
        let user = self.buddy.node(node).start + HEADER_SIZE;
        header::write_size(&mut self.mem, user, size);
        Some(user)
    }

    fn slab_alloc(&mut self, size: usize) -> Option<PoolOffset> {
        let obj_size = size.checked_add(HEADER_SIZE)?;

        // a live slab of this class may still have a slot
        if let Some(class) = self.slabs.lookup_mut(obj_size) {
            if let Some(user) = class.take_slot() {
                header::write_size(&mut self.mem, user, size);
                return Some(user);
            }
        }

        // every slab is full (or the class is new): back a fresh slab with
        // a buddy chunk before taking its first slot
        let span = obj_size
            .checked_mul(N_OBJS_PER_SLAB)?
            .checked_add(HEADER_SIZE)?;
        if span > self.mem.len() {
            log::warn!("pool: slab of {} byte objects exceeds the pool", obj_size);
            return None;
        }
        let node = self.buddy.reserve(next_chunk_size(span))?;
        let slab_start = self.buddy.node(node).start;

        let class = self.slabs.ensure_class(obj_size);
        class.push_slab(slab_start);
        let user = class.take_slot()?;
        header::write_size(&mut self.mem, user, size);
        Some(user)
    }

    fn slab_free(&mut self, user_off: PoolOffset) {
        let size = header::read_size(&self.mem, user_off);
        let obj_size = match size.checked_add(HEADER_SIZE) {
            Some(v) => v,
            None => return,
        };
        let Some(class_idx) = self.slabs.position(obj_size) else {
            log::debug!("pool: free ignored, no class for {} byte objects", obj_size);
            return;
        };

        let released_chunk = {
            let class = self.slabs.class_mut(class_idx);
            let Some(slab_idx) = class.slab_index_containing(user_off) else {
                log::debug!("pool: free ignored, offset {} is in no slab", user_off);
                return;
            };
            let slab_start = class.slab(slab_idx).start;

            // map the offset back to its slot; anything that is not an
            // exact object start is ignored
            let Some(rel) = user_off.checked_sub(object_offset(slab_start, obj_size, 0)) else {
                return;
            };
            if rel % obj_size != 0 {
                return;
            }
            let slot = rel / obj_size;
            if slot >= N_OBJS_PER_SLAB {
                return;
            }

            class.slab_mut(slab_idx).release_slot(slot);
            if class.slab(slab_idx).is_empty() {
                Some(class.remove_slab(slab_idx).start)
            } else {
                None
            }
        };

        if let Some(chunk_start) = released_chunk {
            self.buddy.release_at(chunk_start);
        }
        if self.slabs.class(class_idx).is_empty() {
            self.slabs.delete_at(class_idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: usize = 8 * 1024 * 1024;

    fn pool(policy: Policy) -> MemoryPool {
        MemoryPool::setup(policy, vec![0u8; POOL].into_boxed_slice()).unwrap()
    }

    #[test]
    fn setup_rejects_bad_region_sizes() {
        let odd = vec![0u8; 1000].into_boxed_slice();
        assert!(matches!(
            MemoryPool::setup(Policy::Buddy, odd),
            Err(PoolError::SizeNotPowerOfTwo(1000))
        ));
        let tiny = vec![0u8; 256].into_boxed_slice();
        assert!(matches!(
            MemoryPool::setup(Policy::Buddy, tiny),
            Err(PoolError::SizeTooSmall { size: 256, min: 512 })
        ));
    }

    #[test]
    fn buddy_alloc_places_behind_the_header() {
        let mut pool = pool(Policy::Buddy);
        let off = pool.alloc(100).unwrap();
        assert_eq!(off, HEADER_SIZE);
        assert_eq!(header::read_size(pool.mem(), off), 100);
        assert_eq!(pool.buddy().stats().allocated_bytes, 512);
    }

    #[test]
    fn zero_sized_requests_are_refused() {
        let mut buddy_pool = pool(Policy::Buddy);
        assert_eq!(buddy_pool.alloc(0), None);
        let mut slab_pool = pool(Policy::Slab);
        assert_eq!(slab_pool.alloc(0), None);
    }

    #[test]
    fn buddy_free_unwinds_to_a_single_hole() {
        let mut pool = pool(Policy::Buddy);
        let a = pool.alloc(100).unwrap();
        let b = pool.alloc(100).unwrap();
        assert_eq!(b, 512 + HEADER_SIZE);
        pool.free(a);
        pool.free(b);
        assert!(pool.buddy().is_unfragmented());
    }

    #[test]
    fn buddy_free_of_garbage_offsets_is_a_no_op() {
        let mut pool = pool(Policy::Buddy);
        let a = pool.alloc(100).unwrap();
        pool.free(3); // below the first header
        pool.free(POOL + 8); // beyond the pool
        pool.free(a + 4); // not an allocation start
        assert_eq!(pool.buddy().stats().allocated_bytes, 512);
    }

    #[test]
    fn slab_alloc_reuses_the_open_slab() {
        let mut pool = pool(Policy::Slab);
        let first = pool.alloc(32).unwrap();
        let second = pool.alloc(32).unwrap();
        assert_eq!(first, 2 * HEADER_SIZE);
        assert_eq!(second, 2 * HEADER_SIZE + 40);
        // one backing chunk serves both
        assert_eq!(pool.buddy().stats().allocated_bytes, 4096);
        assert_eq!(pool.slab_table().len(), 1);
    }

    #[test]
    fn slab_free_releases_an_emptied_slab() {
        let mut pool = pool(Policy::Slab);
        let a = pool.alloc(32).unwrap();
        let b = pool.alloc(32).unwrap();
        pool.free(a);
        assert_eq!(pool.slab_table().len(), 1);
        pool.free(b);
        assert!(pool.slab_table().is_empty());
        assert!(pool.buddy().is_unfragmented());
    }

    #[test]
    fn slab_free_tolerates_unknown_offsets() {
        let mut pool = pool(Policy::Slab);
        let a = pool.alloc(32).unwrap();
        pool.free(a + 1); // inside the slab but not an object start
        pool.free(POOL - 8); // no slab there
        assert_eq!(pool.slab_table().class(0).used_objects(), 1);
    }

    #[test]
    fn slab_classes_are_kept_separate() {
        let mut pool = pool(Policy::Slab);
        pool.alloc(16).unwrap();
        pool.alloc(32).unwrap();
        pool.alloc(16).unwrap();
        let table = pool.slab_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.class(0).obj_size, 24);
        assert_eq!(table.class(1).obj_size, 40);
        assert_eq!(table.class(0).used_objects(), 2);
        assert_eq!(table.class(1).used_objects(), 1);
    }
}
