//! Tombstone block used by the growth-oriented variant.
//!
//! ## Design
//!
//! `BlockNode` keeps records in place once written. Removing a record clears
//! its bit in a 64-bit live mask (a tombstone) instead of shifting the rest of
//! the block, and the `[begin, end)` window then creeps inward past any
//! tombstones left at its edges.
//!
//! ```text
//!            begin                 end
//!              v                    v
//! [ . . . . . r0 r1 ++ r3 ++ ++ r6 . . . ]      ++ = tombstone
//! ```
//!
//! ## Slab Integration
//!
//! Nodes live in a [`slab::Slab`]; `prev`/`next` are slab keys, so links stay
//! valid when the slab grows. `position` is the node's rank in the chain and
//! is refreshed whenever the chain is rebuilt; it addresses the node's entry
//! in the volume prefix index.

use crate::orderbook::BLOCK_CAPACITY;
use crate::types::Order;

const _: () = assert!(BLOCK_CAPACITY <= u64::BITS as usize);

/// Where the free space of a freshly allocated node should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Empty window in the middle; used for the sole block
    Centered,
    /// Empty window at the end; the node grows toward the front
    Front,
    /// Empty window at the start; the node grows toward the back
    Back,
}

/// Fixed-capacity block with per-slot tombstones.
#[derive(Debug, Clone)]
pub struct BlockNode {
    /// Inline slot storage; only slots with a live bit hold records
    slots: [Order; BLOCK_CAPACITY],

    /// Bit `i` set when slot `i` holds a live record
    live: u64,

    /// First slot of the potentially-live window
    begin: usize,

    /// One past the last slot of the potentially-live window
    end: usize,

    /// Sum of the live records' volume
    live_volume: i64,

    /// Rank of this node in the chain (prefix index position)
    pub position: usize,

    /// Previous node in the chain (slab key)
    pub prev: Option<usize>,

    /// Next node in the chain (slab key)
    pub next: Option<usize>,
}

impl BlockNode {
    /// Create an empty, unlinked node
    pub fn new(placement: Placement) -> Self {
        let at = match placement {
            Placement::Centered => BLOCK_CAPACITY / 2,
            Placement::Front => BLOCK_CAPACITY,
            Placement::Back => 0,
        };
        Self {
            slots: [Order::default(); BLOCK_CAPACITY],
            live: 0,
            begin: at,
            end: at,
            live_volume: 0,
            position: 0,
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub fn begin(&self) -> usize {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn has_front_space(&self) -> bool {
        self.begin > 0
    }

    #[inline]
    pub fn has_back_space(&self) -> bool {
        self.end < BLOCK_CAPACITY
    }

    /// Number of live records
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Sum of the live records' volume, O(1)
    #[inline]
    pub fn total_volume(&self) -> i64 {
        self.live_volume
    }

    #[inline]
    pub fn is_live(&self, index: usize) -> bool {
        index < BLOCK_CAPACITY && self.live & (1 << index) != 0
    }

    /// Live record at slot `index`
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Order> {
        if self.is_live(index) {
            Some(&self.slots[index])
        } else {
            None
        }
    }

    /// Claim the slot just below the window and return its index.
    ///
    /// # Panics
    ///
    /// Panics if there is no front space.
    pub fn push_front(&mut self, order: Order) -> usize {
        assert!(self.has_front_space(), "push_front into a block with no front space");
        self.begin -= 1;
        let index = self.begin;
        self.write(index, order);
        index
    }

    /// Claim the slot just above the window and return its index.
    ///
    /// # Panics
    ///
    /// Panics if there is no back space.
    pub fn push_back(&mut self, order: Order) -> usize {
        assert!(self.has_back_space(), "push_back into a block with no back space");
        let index = self.end;
        self.end += 1;
        self.write(index, order);
        index
    }

    /// Tombstone slot `index` and return the record it held.
    ///
    /// The window is not trimmed here; call [`BlockNode::trim`] afterwards.
    pub fn take(&mut self, index: usize) -> Option<Order> {
        if !self.is_live(index) {
            return None;
        }
        self.live &= !(1 << index);
        let order = self.slots[index];
        self.live_volume -= order.signed_volume();
        Some(order)
    }

    /// Overwrite the volume of a live slot and return the applied delta
    pub fn set_volume(&mut self, index: usize, volume: i32) -> Option<i64> {
        if !self.is_live(index) {
            return None;
        }
        let slot = &mut self.slots[index];
        let delta = i64::from(volume) - slot.signed_volume();
        slot.volume = volume;
        self.live_volume += delta;
        Some(delta)
    }

    /// Move `begin`/`end` inward past tombstones at the window edges.
    ///
    /// On an empty node the window collapses to a single point.
    pub fn trim(&mut self) {
        match self.next_live(self.begin) {
            Some(first) => self.begin = first,
            None => {
                self.begin = self.end;
                return;
            }
        }
        if let Some(last) = self.prev_live(self.end) {
            self.end = last + 1;
        }
    }

    /// Re-centre an empty node so both ends have room again
    pub fn recenter(&mut self) {
        debug_assert!(self.is_empty());
        self.begin = BLOCK_CAPACITY / 2;
        self.end = BLOCK_CAPACITY / 2;
    }

    /// First live slot at or after `from`, inside the window
    pub fn next_live(&self, from: usize) -> Option<usize> {
        let from = from.max(self.begin);
        if from >= self.end {
            return None;
        }
        let mask = self.live & (u64::MAX << from);
        if mask == 0 {
            return None;
        }
        let index = mask.trailing_zeros() as usize;
        (index < self.end).then_some(index)
    }

    /// Last live slot strictly before `before`, inside the window
    pub fn prev_live(&self, before: usize) -> Option<usize> {
        let before = before.min(self.end);
        if before <= self.begin {
            return None;
        }
        let mask = if before >= u64::BITS as usize {
            self.live
        } else {
            self.live & ((1u64 << before) - 1)
        };
        if mask == 0 {
            return None;
        }
        let index = (u64::BITS - 1 - mask.leading_zeros()) as usize;
        (index >= self.begin).then_some(index)
    }

    /// Raw slots `from..to`, tombstones included
    #[inline]
    pub fn raw_slots(&self, from: usize, to: usize) -> &[Order] {
        &self.slots[from..to]
    }

    /// Append the live records of slots `from..to` to `out`.
    ///
    /// A tombstone-free segment is copied as one slice; otherwise each live
    /// run is copied separately. Returns the number of records appended.
    pub fn copy_live(&self, from: usize, to: usize, out: &mut Vec<Order>) -> usize {
        if from >= to {
            return 0;
        }
        let span = segment_mask(from, to);
        let segment = self.live & span;
        if segment == span {
            out.extend_from_slice(&self.slots[from..to]);
            return to - from;
        }
        let mut copied = 0;
        let mut cursor = from;
        while let Some(start) = self.next_live(cursor).filter(|&i| i < to) {
            // Run ends at the first tombstone after `start` or at `to`.
            let dead_after = !self.live & segment_mask(start, to);
            let stop = if dead_after == 0 {
                to
            } else {
                dead_after.trailing_zeros() as usize
            };
            out.extend_from_slice(&self.slots[start..stop]);
            copied += stop - start;
            cursor = stop;
        }
        copied
    }

    fn write(&mut self, index: usize, order: Order) {
        debug_assert!(!self.is_live(index), "slot {} already live", index);
        self.slots[index] = order;
        self.live |= 1 << index;
        self.live_volume += order.signed_volume();
    }
}

/// Bit mask with bits `from..to` set
#[inline]
fn segment_mask(from: usize, to: usize) -> u64 {
    debug_assert!(from < to && to <= u64::BITS as usize);
    let high = if to >= u64::BITS as usize {
        u64::MAX
    } else {
        (1u64 << to) - 1
    };
    high & (u64::MAX << from)
}

// ============================================================================
// Unit Tests
// ============================================================================
