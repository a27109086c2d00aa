/// Buddy tree over the pool region
///
/// Implements the pool's power-of-two decomposition as an explicit binary
/// tree: placement by best-fit with leftmost tie-break, recursive splitting
/// down to the requested chunk size, and sibling coalescing on release.
///
/// Nodes live in an index arena. Children are reachable through their
/// parent's `Internal` state; the parent link is a plain index, so the tree
/// carries no ownership cycles. Slots vacated by coalescing are reused by
/// later splits.

use crate::config::{PoolOffset, MIN_MEM_CHUNK_SIZE};

/// Index of a node in the tree arena
pub type NodeId = usize;

/// Allocation state of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Leaf available for placement
    Hole,
    /// Leaf handed out to a caller
    Allocated,
    /// Split node owning two half-size children
    Internal { left: NodeId, right: NodeId },
}

/// A node in the buddy tree
#[derive(Debug, Clone, Copy)]
pub struct Node {
    /// Starting offset of the covered range
    pub start: PoolOffset,
    /// Covered bytes; always a power of two
    pub size: usize,
    pub state: NodeState,
    parent: Option<NodeId>,
}

/// Byte accounting over the current leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyStats {
    pub total_bytes: usize,
    pub free_bytes: usize,
    pub allocated_bytes: usize,
}

/// Buddy tree state
pub struct BuddyTree {
    nodes: Vec<Node>,
    /// Slots of coalesced-away nodes, reused on split
    free_slots: Vec<NodeId>,
    root: NodeId,
    total_size: usize,
}

impl BuddyTree {
    /// Create a tree whose root is a single hole covering `total_size`
    /// bytes. The caller validates that the size is a power of two.
    pub fn new(total_size: usize) -> Self {
        let root = Node {
            start: 0,
            size: total_size,
            state: NodeState::Hole,
            parent: None,
        };
        Self {
            nodes: vec![root],
            free_slots: Vec::new(),
            root: 0,
            total_size,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// True once every release has coalesced back to a single root hole.
    pub fn is_unfragmented(&self) -> bool {
        self.nodes[self.root].state == NodeState::Hole
    }

    /// Reserve an allocated leaf of exactly `chunk_size` bytes.
    ///
    /// `chunk_size` must already be rounded to a power of two of at least
    /// `MIN_MEM_CHUNK_SIZE`; callers round with `next_chunk_size`. Returns
    /// `None` without touching the tree when no hole can satisfy the
    /// request.
    pub fn reserve(&mut self, chunk_size: usize) -> Option<NodeId> {
        debug_assert!(chunk_size.is_power_of_two());
        debug_assert!(chunk_size >= MIN_MEM_CHUNK_SIZE);

        let Some(placement) = self.find_placement(self.root, chunk_size) else {
            log::warn!("buddy: no hole fits {} bytes", chunk_size);
            return None;
        };
        let leaf = self.split_to(placement, chunk_size);
        self.nodes[leaf].state = NodeState::Allocated;
        log::debug!(
            "buddy: reserved {} bytes at offset {}",
            chunk_size,
            self.nodes[leaf].start
        );
        Some(leaf)
    }

    /// Release the leaf starting at `offset` and coalesce holes upward as
    /// far as they reach. Offsets that start no leaf are ignored.
    pub fn release_at(&mut self, offset: PoolOffset) {
        let Some(leaf) = self.find_leaf_at(offset) else {
            log::debug!("buddy: release ignored, no leaf starts at offset {}", offset);
            return;
        };
        self.nodes[leaf].state = NodeState::Hole;
        log::debug!(
            "buddy: released {} bytes at offset {}",
            self.nodes[leaf].size,
            offset
        );
        self.coalesce_from(self.nodes[leaf].parent);
    }

    /// Return the leaf (hole or allocated) starting at `offset`.
    ///
    /// Sibling ranges are disjoint, so the search descends directly toward
    /// the offset instead of scanning both subtrees.
    pub fn find_leaf_at(&self, offset: PoolOffset) -> Option<NodeId> {
        if offset >= self.total_size {
            return None;
        }
        let mut id = self.root;
        loop {
            let node = &self.nodes[id];
            match node.state {
                NodeState::Internal { left, right } => {
                    let mid = node.start + node.size / 2;
                    id = if offset < mid { left } else { right };
                }
                _ => return (node.start == offset).then_some(id),
            }
        }
    }

    /// Walk the leaves and account free against allocated bytes.
    pub fn stats(&self) -> BuddyStats {
        let mut stats = BuddyStats {
            total_bytes: self.total_size,
            free_bytes: 0,
            allocated_bytes: 0,
        };
        self.accumulate(self.root, &mut stats);
        stats
    }

    /// Best-fit placement: the smallest hole at least `chunk_size` bytes,
    /// ties broken toward the lower offset.
    fn find_placement(&self, id: NodeId, chunk_size: usize) -> Option<NodeId> {
        let node = &self.nodes[id];
        match node.state {
            NodeState::Allocated => None,
            NodeState::Hole => (node.size >= chunk_size).then_some(id),
            NodeState::Internal { left, right } => {
                // a split node at or below the target size cannot contain a
                // sufficient hole anywhere beneath it
                if node.size <= chunk_size {
                    return None;
                }
                match (
                    self.find_placement(left, chunk_size),
                    self.find_placement(right, chunk_size),
                ) {
                    (Some(l), Some(r)) => {
                        if self.nodes[l].size <= self.nodes[r].size {
                            Some(l)
                        } else {
                            Some(r)
                        }
                    }
                    (Some(l), None) => Some(l),
                    (None, Some(r)) => Some(r),
                    (None, None) => None,
                }
            }
        }
    }

    /// Halve the placement node until a hole of exactly `chunk_size`
    /// remains, descending into the left child at every level.
    fn split_to(&mut self, mut id: NodeId, chunk_size: usize) -> NodeId {
        while self.nodes[id].size > chunk_size {
            let Node { start, size, .. } = self.nodes[id];
            let half = size / 2;
            let left = self.adopt(Node {
                start,
                size: half,
                state: NodeState::Hole,
                parent: Some(id),
            });
            let right = self.adopt(Node {
                start: start + half,
                size: half,
                state: NodeState::Hole,
                parent: Some(id),
            });
            self.nodes[id].state = NodeState::Internal { left, right };
            id = left;
        }
        id
    }

    /// Merge sibling holes into their parent, walking toward the root.
    /// Stops at the first parent with a non-hole child.
    fn coalesce_from(&mut self, mut next: Option<NodeId>) {
        while let Some(parent) = next {
            let NodeState::Internal { left, right } = self.nodes[parent].state else {
                return;
            };
            if self.nodes[left].state != NodeState::Hole
                || self.nodes[right].state != NodeState::Hole
            {
                return;
            }
            self.free_slots.push(left);
            self.free_slots.push(right);
            self.nodes[parent].state = NodeState::Hole;
            next = self.nodes[parent].parent;
        }
    }

    fn adopt(&mut self, node: Node) -> NodeId {
        match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn accumulate(&self, id: NodeId, stats: &mut BuddyStats) {
        let node = &self.nodes[id];
        match node.state {
            NodeState::Hole => stats.free_bytes += node.size,
            NodeState::Allocated => stats.allocated_bytes += node.size,
            NodeState::Internal { left, right } => {
                self.accumulate(left, stats);
                self.accumulate(right, stats);
            }
        }
    }
}
