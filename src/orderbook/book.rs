//! Block order book: tombstone-based segmented deque.
//!
//! ## Architecture
//!
//! - **Slab of [`BlockNode`]s**: 64-slot blocks linked by slab key into a
//!   chain; allocated when an end runs out of room, freed when they empty
//!   (except the sole block, which is re-centred and kept)
//! - **HashMap**: order ID to [`Location`] for O(1) erase and update by ID
//! - **[`VolumePrefixIndex`]**: Fenwick tree over per-block live volume,
//!   rebuilt on every chain change and delta-updated otherwise
//!
//! ## Removal Policy
//!
//! Erasing a record tombstones its slot instead of shifting the block. The
//! block's live window then shrinks past tombstones at its edges. This keeps
//! random removal O(1) under continuous churn at the cost of slack capacity
//! until a block empties.
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | Push / pop at either end | O(1) amortized |
//! | Erase by ID | O(1) average |
//! | Update volume by ID | O(log b) |
//! | Volume range lookup | O(log b + 64) |
//! | Block alloc / free | O(b) (chain rebuild) |
//!
//! *b = number of blocks*
//!
//! ## Example
//!
//! ```
//! use block_order_book::orderbook::BlockOrderBook;
//! use block_order_book::types::Order;
//!
//! let mut book = BlockOrderBook::new();
//! for id in 1..=200 {
//!     book.push_back(Order::new(id, 0, 10, false));
//! }
//!
//! assert!(book.erase_by_id(42));
//! assert!(!book.erase_by_id(42));
//! assert_eq!(book.len(), 199);
//!
//! let mut out = Vec::new();
//! book.copy_volume_range(95, 105, &mut out);
//! assert_eq!(out.iter().map(|o| o.id).collect::<Vec<_>>(), vec![10, 11]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::iter::FusedIterator;

use slab::Slab;
use tracing::{debug, trace};

use crate::orderbook::node::{BlockNode, Placement};
use crate::orderbook::{OrderQueue, VolumePrefixIndex, BLOCK_CAPACITY};
use crate::types::{Cursor, Location, Order};

/// Segmented deque of orders with tombstoned removal and a volume prefix index.
pub struct BlockOrderBook {
    /// Block storage
    /// Key: slab key, Value: BlockNode
    blocks: Slab<BlockNode>,

    /// First block in the chain
    head: Option<usize>,

    /// Last block in the chain
    tail: Option<usize>,

    /// Number of live orders
    len: usize,

    /// Sum of all live orders' volume
    total_volume: i64,

    /// Order ID to slot location
    index: HashMap<u64, Location>,

    /// Block keys in chain order (rank -> slab key)
    chain: Vec<usize>,

    /// Cumulative block volume by chain rank
    prefix: VolumePrefixIndex,
}

impl Default for BlockOrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockOrderBook {
    /// Create a new empty book
    pub fn new() -> Self {
        Self {
            blocks: Slab::new(),
            head: None,
            tail: None,
            len: 0,
            total_volume: 0,
            index: HashMap::new(),
            chain: Vec::new(),
            prefix: VolumePrefixIndex::new(),
        }
    }

    /// Create a book with room for `blocks` blocks before reallocating
    ///
    /// # Example
    ///
    /// ```
    /// use block_order_book::orderbook::BlockOrderBook;
    ///
    /// let book = BlockOrderBook::with_block_capacity(16);
    /// assert!(book.is_empty());
    /// ```
    pub fn with_block_capacity(blocks: usize) -> Self {
        Self {
            blocks: Slab::with_capacity(blocks),
            head: None,
            tail: None,
            len: 0,
            total_volume: 0,
            index: HashMap::with_capacity(blocks * BLOCK_CAPACITY),
            chain: Vec::with_capacity(blocks),
            prefix: VolumePrefixIndex::new(),
        }
    }

    // ========================================================================
    // Size
    // ========================================================================

    /// Number of live orders
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated blocks
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Sum of all live orders' volume
    #[inline]
    pub fn total_volume(&self) -> i64 {
        self.total_volume
    }

    // ========================================================================
    // Deque Operations
    // ========================================================================

    /// First live order
    pub fn front(&self) -> Option<&Order> {
        self.get(self.begin())
    }

    /// Last live order
    pub fn back(&self) -> Option<&Order> {
        self.get(self.prev(self.end()))
    }

    /// Append an order at the back
    pub fn push_back(&mut self, order: Order) {
        let key = self.ensure_back_block();
        let index = self.blocks[key].push_back(order);
        self.on_insert(key, index, &order);
    }

    /// Prepend an order at the front
    pub fn push_front(&mut self, order: Order) {
        let key = self.ensure_front_block();
        let index = self.blocks[key].push_front(order);
        self.on_insert(key, index, &order);
    }

    /// Remove and return the first order, or None if empty
    pub fn pop_front(&mut self) -> Option<Order> {
        let first = self.begin();
        self.remove_at(first)
    }

    /// Remove and return the last order, or None if empty
    pub fn pop_back(&mut self) -> Option<Order> {
        let last = self.prev(self.end());
        self.remove_at(last)
    }

    /// Remove all orders and free every block
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
        self.total_volume = 0;
        self.index.clear();
        self.chain.clear();
        self.prefix.init(0);
    }

    // ========================================================================
    // Cursor Navigation
    // ========================================================================

    /// Cursor at the first live order (end if empty)
    pub fn begin(&self) -> Cursor {
        match self.head {
            Some(head) => self.find_next(head, 0),
            None => Cursor::end(),
        }
    }

    /// The past-the-end cursor
    #[inline]
    pub fn end(&self) -> Cursor {
        Cursor::end()
    }

    /// Order under a cursor, None for end or a tombstoned slot
    pub fn get(&self, cursor: Cursor) -> Option<&Order> {
        let key = cursor.block?;
        self.blocks.get(key)?.get(cursor.index)
    }

    /// Cursor at the next live order, skipping tombstones
    pub fn next(&self, cursor: Cursor) -> Cursor {
        match cursor.block {
            Some(key) => self.find_next(key, cursor.index + 1),
            None => Cursor::end(),
        }
    }

    /// Cursor at the previous live order; from end this is the last order
    pub fn prev(&self, cursor: Cursor) -> Cursor {
        match (cursor.block, self.tail) {
            (Some(key), _) => self.find_prev(key, cursor.index),
            (None, Some(tail)) => self.find_prev(tail, BLOCK_CAPACITY),
            (None, None) => Cursor::end(),
        }
    }

    /// Iterate over live orders front to back
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            book: self,
            front: self.begin(),
            back: self.end(),
            remaining: self.len,
        }
    }

    // ========================================================================
    // Erase and Lookup
    // ========================================================================

    /// Erase the order under `cursor` and return a cursor to the next order.
    ///
    /// Other cursors into the same block stay valid, since no slot moves.
    pub fn erase(&mut self, cursor: Cursor) -> Cursor {
        if cursor.is_end() {
            return cursor;
        }
        let next = self.next(cursor);
        self.remove_at(cursor);
        next
    }

    /// Remove an order by ID and return it
    pub fn remove_by_id(&mut self, id: u64) -> Option<Order> {
        let location = *self.index.get(&id)?;
        self.remove_at(location.cursor())
    }

    /// Erase an order by ID; false if the ID is not present
    pub fn erase_by_id(&mut self, id: u64) -> bool {
        self.remove_by_id(id).is_some()
    }

    /// Cursor at the order with this ID, or end
    pub fn find(&self, id: u64) -> Cursor {
        self.index
            .get(&id)
            .map_or(Cursor::end(), |location| location.cursor())
    }

    /// Order with this ID
    pub fn get_by_id(&self, id: u64) -> Option<&Order> {
        self.get(self.find(id))
    }

    /// Check if an order ID is live
    #[inline]
    pub fn contains_id(&self, id: u64) -> bool {
        self.index.contains_key(&id)
    }

    /// Set the volume of an order by ID, propagating the change to the
    /// block total and the prefix index. False if the ID is not present.
    pub fn update_volume(&mut self, id: u64, volume: i32) -> bool {
        let Some(location) = self.index.get(&id).copied() else {
            return false;
        };
        let Some(node) = self.blocks.get_mut(location.block) else {
            return false;
        };
        match node.set_volume(location.index, volume) {
            None => false,
            Some(0) => true,
            Some(delta) => {
                self.propagate(location.block, delta);
                true
            }
        }
    }

    // ========================================================================
    // Bulk Copies
    // ========================================================================

    /// Append every slot between two cursors to `out`, tombstones included.
    ///
    /// Whole block segments are copied as slices. Tombstoned slots carry the
    /// record they held before removal, so callers must pick live bounds and
    /// accept stale interior records. Returns the number of slots appended.
    pub fn copy_range_including_tombstones(
        &self,
        first: Cursor,
        last: Cursor,
        out: &mut Vec<Order>,
    ) -> usize {
        self.walk_segments(first, last, |node, from, to| {
            out.extend_from_slice(node.raw_slots(from, to));
            to - from
        })
    }

    /// Append the contiguous run of live orders covering the cumulative
    /// volume window `[lower, upper]` to `out`.
    ///
    /// The run starts at the first order whose running volume reaches
    /// `lower` (clamped to at least 1). When `upper` is below the total it
    /// ends with the first order whose running volume reaches `upper`, plus
    /// any zero-volume orders after it while the running volume sits exactly
    /// on `upper`. Otherwise the run goes to the back of the book, so
    /// `i64::MAX` reads as "to the end". Nothing is copied when
    /// `lower > upper` or `lower` exceeds the total volume. Returns the
    /// number of orders appended.
    pub fn copy_volume_range(&self, lower: i64, upper: i64, out: &mut Vec<Order>) -> usize {
        let lower = lower.max(1);
        if self.chain.is_empty() || lower > self.total_volume || lower > upper {
            return 0;
        }
        let (first, _) = self.position_by_volume(lower);
        if first.is_end() {
            return 0;
        }
        let stop = if upper >= self.total_volume {
            Cursor::end()
        } else {
            let (last, through) = self.position_by_volume(upper);
            let mut stop = self.next(last);
            if through == upper {
                while matches!(self.get(stop), Some(order) if order.volume == 0) {
                    stop = self.next(stop);
                }
            }
            stop
        };
        self.walk_segments(first, stop, |node, from, to| node.copy_live(from, to, out))
    }

    /// Check every internal invariant, panicking on the first violation
    pub fn validate(&self) {
        let mut live = 0;
        let mut volume = 0;
        let mut rank = 0;
        let mut current = self.head;
        let mut prev = None;
        while let Some(key) = current {
            let node = &self.blocks[key];
            assert_eq!(node.prev, prev, "broken back link at block {}", key);
            assert_eq!(node.position, rank, "stale chain rank at block {}", key);
            assert_eq!(self.chain[rank], key, "chain order mismatch at rank {}", rank);
            assert!(
                !node.is_empty() || self.blocks.len() == 1,
                "empty block {} left in a multi-block chain",
                key
            );
            let mut block_volume = 0;
            for index in node.begin()..node.end() {
                if let Some(order) = node.get(index) {
                    block_volume += order.signed_volume();
                    assert_eq!(
                        self.index.get(&order.id),
                        Some(&Location::new(key, index)),
                        "index entry for order {} is stale",
                        order.id
                    );
                }
            }
            assert_eq!(block_volume, node.total_volume(), "block {} volume drifted", key);
            live += node.live_count();
            volume += block_volume;
            prev = Some(key);
            current = node.next;
            rank += 1;
        }
        assert_eq!(prev, self.tail, "tail does not end the chain");
        assert_eq!(rank, self.blocks.len(), "unlinked blocks in the slab");
        assert_eq!(live, self.len, "length drifted");
        assert_eq!(self.index.len(), self.len, "index has entries for dead orders");
        assert_eq!(volume, self.total_volume, "total volume drifted");
        assert_eq!(self.prefix.total(), self.total_volume, "prefix index drifted");
        assert_eq!(self.iter().count(), self.len, "iteration skipped live orders");
    }

    // ========================================================================
    // Block Management
    // ========================================================================

    fn allocate(&mut self, placement: Placement) -> usize {
        let key = self.blocks.insert(BlockNode::new(placement));
        trace!(block = key, ?placement, blocks = self.blocks.len(), "allocated block");
        key
    }

    fn ensure_back_block(&mut self) -> usize {
        match self.tail {
            Some(tail) if self.blocks[tail].has_back_space() => tail,
            Some(tail) => {
                let key = self.allocate(Placement::Back);
                self.link_after(tail, key);
                self.rebuild_chain();
                key
            }
            None => self.allocate_sole(),
        }
    }

    fn ensure_front_block(&mut self) -> usize {
        match self.head {
            Some(head) if self.blocks[head].has_front_space() => head,
            Some(head) => {
                let key = self.allocate(Placement::Front);
                self.link_before(head, key);
                self.rebuild_chain();
                key
            }
            None => self.allocate_sole(),
        }
    }

    fn allocate_sole(&mut self) -> usize {
        let key = self.allocate(Placement::Centered);
        self.head = Some(key);
        self.tail = Some(key);
        self.rebuild_chain();
        key
    }

    fn link_after(&mut self, node: usize, new_block: usize) {
        let next = self.blocks[node].next;
        self.blocks[new_block].prev = Some(node);
        self.blocks[new_block].next = next;
        match next {
            Some(next) => self.blocks[next].prev = Some(new_block),
            None => self.tail = Some(new_block),
        }
        self.blocks[node].next = Some(new_block);
    }

    fn link_before(&mut self, node: usize, new_block: usize) {
        let prev = self.blocks[node].prev;
        self.blocks[new_block].next = Some(node);
        self.blocks[new_block].prev = prev;
        match prev {
            Some(prev) => self.blocks[prev].next = Some(new_block),
            None => self.head = Some(new_block),
        }
        self.blocks[node].prev = Some(new_block);
    }

    fn unlink(&mut self, key: usize) {
        let node = self.blocks.remove(key);
        match node.prev {
            Some(prev) => self.blocks[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.blocks[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        trace!(block = key, blocks = self.blocks.len(), "freed block");
        self.rebuild_chain();
    }

    /// Re-rank every block and rebuild the prefix index from block totals
    fn rebuild_chain(&mut self) {
        self.chain.clear();
        let mut current = self.head;
        while let Some(key) = current {
            let node = &mut self.blocks[key];
            node.position = self.chain.len();
            self.chain.push(key);
            current = node.next;
        }
        let blocks = &self.blocks;
        self.prefix =
            VolumePrefixIndex::from_totals(self.chain.iter().map(|&key| blocks[key].total_volume()));
        self.total_volume = self.prefix.total();
    }

    // ========================================================================
    // Slot Bookkeeping
    // ========================================================================

    fn on_insert(&mut self, key: usize, index: usize, order: &Order) {
        self.len += 1;
        self.index.insert(order.id, Location::new(key, index));
        self.propagate(key, order.signed_volume());
    }

    fn remove_at(&mut self, cursor: Cursor) -> Option<Order> {
        let key = cursor.block?;
        let order = self.blocks.get_mut(key)?.take(cursor.index)?;
        self.index.remove(&order.id);
        self.len -= 1;
        self.propagate(key, -order.signed_volume());
        self.trim_block(key);
        Some(order)
    }

    /// Push a block-volume delta into the running total and prefix index
    fn propagate(&mut self, key: usize, delta: i64) {
        self.total_volume += delta;
        self.prefix.update(self.blocks[key].position, delta);
    }

    fn trim_block(&mut self, key: usize) {
        let node = &mut self.blocks[key];
        node.trim();
        if !node.is_empty() {
            return;
        }
        if self.head == Some(key) && self.tail == Some(key) {
            node.recenter();
            debug!(block = key, "recentered sole block");
        } else {
            self.unlink(key);
        }
    }

    // ========================================================================
    // Traversal Helpers
    // ========================================================================

    fn find_next(&self, key: usize, from: usize) -> Cursor {
        let mut current = Some(key);
        let mut from = from;
        while let Some(key) = current {
            let Some(node) = self.blocks.get(key) else {
                break;
            };
            if let Some(index) = node.next_live(from) {
                return Cursor::at(key, index);
            }
            current = node.next;
            from = 0;
        }
        Cursor::end()
    }

    fn find_prev(&self, key: usize, before: usize) -> Cursor {
        let mut current = Some(key);
        let mut before = before;
        while let Some(key) = current {
            let Some(node) = self.blocks.get(key) else {
                break;
            };
            if let Some(index) = node.prev_live(before) {
                return Cursor::at(key, index);
            }
            current = node.prev;
            before = BLOCK_CAPACITY;
        }
        Cursor::end()
    }

    /// Visit the in-window slot segments of each block between two cursors
    fn walk_segments<F>(&self, first: Cursor, last: Cursor, mut visit: F) -> usize
    where
        F: FnMut(&BlockNode, usize, usize) -> usize,
    {
        let Some(mut key) = first.block else {
            return 0;
        };
        let mut from = first.index;
        let mut total = 0;
        while let Some(node) = self.blocks.get(key) {
            let from_slot = from.max(node.begin());
            let is_last = last.block == Some(key);
            let to = if is_last { last.index } else { node.end() };
            if to > from_slot {
                total += visit(node, from_slot, to);
            }
            match node.next {
                Some(next) if !is_last => {
                    key = next;
                    from = 0;
                }
                _ => break,
            }
        }
        total
    }

    /// Cursor at the first live order whose running volume reaches `target`,
    /// with the running volume through that order
    fn position_by_volume(&self, target: i64) -> (Cursor, i64) {
        if self.chain.is_empty() || target <= 0 {
            let first = self.begin();
            return (first, self.get(first).map_or(0, Order::signed_volume));
        }
        if target > self.total_volume {
            return (Cursor::end(), self.total_volume);
        }
        let rank = self.prefix.lower_bound(target);
        let Some(&key) = self.chain.get(rank) else {
            return (Cursor::end(), self.total_volume);
        };
        let before = match rank {
            0 => 0,
            rank => self.prefix.prefix_sum(rank - 1),
        };
        let node = &self.blocks[key];
        let mut running = before;
        let mut slot = node.next_live(node.begin());
        while let Some(index) = slot {
            if let Some(order) = node.get(index) {
                running += order.signed_volume();
                if running >= target {
                    return (Cursor::at(key, index), running);
                }
            }
            slot = node.next_live(index + 1);
        }
        let next = match node.next {
            Some(next) => self.find_next(next, 0),
            None => Cursor::end(),
        };
        (next, running + self.get(next).map_or(0, Order::signed_volume))
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl Clone for BlockOrderBook {
    /// Element-wise deep copy; the copy has no tombstones.
    fn clone(&self) -> Self {
        self.iter().copied().collect()
    }
}

impl fmt::Debug for BlockOrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<Order> for BlockOrderBook {
    fn from_iter<I: IntoIterator<Item = Order>>(iter: I) -> Self {
        let mut book = Self::new();
        book.extend(iter);
        book
    }
}

impl Extend<Order> for BlockOrderBook {
    fn extend<I: IntoIterator<Item = Order>>(&mut self, iter: I) {
        for order in iter {
            self.push_back(order);
        }
    }
}

impl<'a> IntoIterator for &'a BlockOrderBook {
    type Item = &'a Order;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl OrderQueue for BlockOrderBook {
    fn len(&self) -> usize {
        BlockOrderBook::len(self)
    }

    fn front(&self) -> Option<&Order> {
        BlockOrderBook::front(self)
    }

    fn back(&self) -> Option<&Order> {
        BlockOrderBook::back(self)
    }

    fn push_back(&mut self, order: Order) {
        BlockOrderBook::push_back(self, order)
    }

    fn push_front(&mut self, order: Order) {
        BlockOrderBook::push_front(self, order)
    }

    fn pop_front(&mut self) -> Option<Order> {
        BlockOrderBook::pop_front(self)
    }

    fn pop_back(&mut self) -> Option<Order> {
        BlockOrderBook::pop_back(self)
    }

    fn erase_by_id(&mut self, id: u64) -> bool {
        BlockOrderBook::erase_by_id(self, id)
    }

    fn contains_id(&self, id: u64) -> bool {
        BlockOrderBook::contains_id(self, id)
    }

    fn update_volume(&mut self, id: u64, volume: i32) -> bool {
        BlockOrderBook::update_volume(self, id, volume)
    }

    fn total_volume(&self) -> i64 {
        BlockOrderBook::total_volume(self)
    }

    fn copy_volume_range(&self, lower: i64, upper: i64, out: &mut Vec<Order>) -> usize {
        BlockOrderBook::copy_volume_range(self, lower, upper, out)
    }

    fn snapshot(&self) -> Vec<Order> {
        self.iter().copied().collect()
    }
}

// ============================================================================
// Iterator
// ============================================================================

/// Front-to-back iterator over the live orders of a [`BlockOrderBook`]
#[derive(Clone)]
pub struct Iter<'a> {
    book: &'a BlockOrderBook,
    front: Cursor,
    back: Cursor,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let order = self.book.get(self.front)?;
        self.front = self.book.next(self.front);
        self.remaining -= 1;
        Some(order)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.back = self.book.prev(self.back);
        let order = self.book.get(self.back)?;
        self.remaining -= 1;
        Some(order)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

// ============================================================================
// Unit Tests
// ============================================================================
