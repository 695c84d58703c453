//! Dense fixed-capacity block used by the compaction variant.
//!
//! ## Design
//!
//! A `Block` stores up to [`BLOCK_CAPACITY`] records contiguously in an inline
//! array. The live records occupy `items[head..head + len]`; there are never
//! holes. Blocks are stored in a [`slab::Slab`] and linked to their
//! neighbours by slab key, like nodes in a price-level queue.
//!
//! ```text
//! prev <- [ . . . r0 r1 r2 r3 . . . ] -> next
//!                 ^head        ^head+len
//! ```
//!
//! - Push at either end is O(1) while there is room at that end; otherwise the
//!   live run is re-centred once with a single `copy_within`.
//! - `erase` shifts whichever side of the removed record is shorter.
//!
//! Records are `Copy`, so every shift is a plain memmove.

use crate::orderbook::BLOCK_CAPACITY;
use crate::types::Order;

/// Dense block of records with doubly-linked neighbours.
#[derive(Debug, Clone)]
pub struct Block {
    /// Inline storage; only `head..head + len` is meaningful
    items: [Order; BLOCK_CAPACITY],

    /// Physical offset of the first live record
    head: usize,

    /// Number of live records
    len: usize,

    /// Sum of the live records' volume
    total_volume: i64,

    /// Previous block in the chain (slab key)
    pub prev: Option<usize>,

    /// Next block in the chain (slab key)
    pub next: Option<usize>,
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

impl Block {
    /// Create an empty, unlinked block with its free space split evenly
    pub fn new() -> Self {
        Self {
            items: [Order::default(); BLOCK_CAPACITY],
            head: BLOCK_CAPACITY / 2,
            len: 0,
            total_volume: 0,
            prev: None,
            next: None,
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        BLOCK_CAPACITY
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == BLOCK_CAPACITY
    }

    /// Sum of the live records' volume, O(1)
    #[inline]
    pub fn total_volume(&self) -> i64 {
        self.total_volume
    }

    /// Live records as a slice
    #[inline]
    pub fn as_slice(&self) -> &[Order] {
        &self.items[self.head..self.head + self.len]
    }

    /// Record at logical offset `index`
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Order> {
        self.as_slice().get(index)
    }

    #[inline]
    pub fn first(&self) -> Option<&Order> {
        self.as_slice().first()
    }

    #[inline]
    pub fn last(&self) -> Option<&Order> {
        self.as_slice().last()
    }

    /// Logical offset of the record with identifier `id` (linear scan)
    pub fn position_of(&self, id: u64) -> Option<usize> {
        self.as_slice().iter().position(|order| order.id == id)
    }

    /// Append a record at the back.
    ///
    /// # Panics
    ///
    /// Panics if the block is full.
    pub fn push_back(&mut self, order: Order) {
        assert!(!self.is_full(), "push_back into a full block");
        if self.head + self.len == BLOCK_CAPACITY {
            self.recenter((BLOCK_CAPACITY - self.len) / 2);
        }
        self.items[self.head + self.len] = order;
        self.len += 1;
        self.total_volume += order.signed_volume();
    }

    /// Prepend a record at the front.
    ///
    /// # Panics
    ///
    /// Panics if the block is full.
    pub fn push_front(&mut self, order: Order) {
        assert!(!self.is_full(), "push_front into a full block");
        if self.head == 0 {
            self.recenter((BLOCK_CAPACITY - self.len + 1) / 2);
        }
        self.head -= 1;
        self.items[self.head] = order;
        self.len += 1;
        self.total_volume += order.signed_volume();
    }

    /// Remove the last record.
    ///
    /// # Panics
    ///
    /// Panics if the block is empty.
    pub fn pop_back(&mut self) -> Order {
        assert!(!self.is_empty(), "pop_back from an empty block");
        self.len -= 1;
        let order = self.items[self.head + self.len];
        self.total_volume -= order.signed_volume();
        order
    }

    /// Remove the first record.
    ///
    /// # Panics
    ///
    /// Panics if the block is empty.
    pub fn pop_front(&mut self) -> Order {
        assert!(!self.is_empty(), "pop_front from an empty block");
        let order = self.items[self.head];
        self.head += 1;
        self.len -= 1;
        self.total_volume -= order.signed_volume();
        order
    }

    /// Remove the record at logical offset `index`, shifting the shorter side.
    ///
    /// Records after `index` keep their relative order and end up at logical
    /// offsets one lower, so `index` then addresses the following record.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn erase(&mut self, index: usize) -> Order {
        assert!(index < self.len, "erase index {} out of {}", index, self.len);
        let at = self.head + index;
        let order = self.items[at];
        if index < self.len / 2 {
            self.items.copy_within(self.head..at, self.head + 1);
            self.head += 1;
        } else {
            self.items.copy_within(at + 1..self.head + self.len, at);
        }
        self.len -= 1;
        self.total_volume -= order.signed_volume();
        order
    }

    /// Overwrite the volume of the record at logical offset `index`.
    ///
    /// Returns the signed delta applied to the block total.
    pub fn set_volume(&mut self, index: usize, volume: i32) -> i64 {
        assert!(index < self.len, "set_volume index {} out of {}", index, self.len);
        let slot = &mut self.items[self.head + index];
        let delta = i64::from(volume) - slot.signed_volume();
        slot.volume = volume;
        self.total_volume += delta;
        delta
    }

    /// Drop all records and re-centre
    pub fn clear(&mut self) {
        self.head = BLOCK_CAPACITY / 2;
        self.len = 0;
        self.total_volume = 0;
    }

    fn recenter(&mut self, new_head: usize) {
        debug_assert!(new_head + self.len <= BLOCK_CAPACITY);
        self.items
            .copy_within(self.head..self.head + self.len, new_head);
        self.head = new_head;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
