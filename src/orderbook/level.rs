//! Block level: compaction-based segmented deque.
//!
//! ## Design
//!
//! A `BlockLevel` chains dense [`Block`]s through a slab. Records never leave
//! holes: erasing one shifts the shorter side of its block, and a block that
//! empties is freed on the spot (the sole block is re-centred instead).
//!
//! ```text
//! head <-> [r0 r1 r2] <-> [r3 r4 r5 r6] <-> [r7] <-> tail
//! ```
//!
//! ## Lazy ID Lookup
//!
//! With a single block a linear scan finds any ID quickly, so no map is kept.
//! Once a second block is allocated the level switches to an ID to block map,
//! built from every record in one pass; the position inside the block is still
//! a scan. Dropping back to one block tears the map down again.
//!
//! | Blocks | Lookup |
//! |--------|--------|
//! | 0..=1 | scan the head block |
//! | 2.. | hash to block, scan inside |
//!
//! ## Cursor Stability
//!
//! Cursors address a logical offset inside a block. Any erase in a block
//! shifts its records, so only the cursor returned by [`BlockLevel::erase`]
//! stays meaningful afterwards.

use std::collections::HashMap;
use std::fmt;
use std::iter::FusedIterator;

use slab::Slab;
use tracing::{debug, trace};

use crate::orderbook::{Block, OrderQueue};
use crate::types::{Cursor, Location, Order};

/// ID lookup strategy, switched on block count
#[derive(Debug, Clone, Default)]
enum LookupMode {
    /// At most one block: scan it
    #[default]
    Scan,
    /// Order ID to the slab key of its block
    Hashed(HashMap<u64, usize>),
}

/// Segmented deque of orders with compacting removal and lazy ID lookup.
///
/// ## Example
///
/// ```
/// use block_order_book::orderbook::BlockLevel;
/// use block_order_book::types::Order;
///
/// let mut level = BlockLevel::new();
/// for id in 1..=64 {
///     level.push_back(Order::new(id, 0, 10, false));
/// }
/// assert!(!level.is_index_active());
///
/// level.push_back(Order::new(65, 0, 10, false));
/// assert!(level.is_index_active());
///
/// let ids: Vec<u64> = level.volume_range(95, 105).map(|o| o.id).collect();
/// assert_eq!(ids, vec![10, 11]);
/// ```
pub struct BlockLevel {
    /// Block storage
    /// Key: slab key, Value: Block
    blocks: Slab<Block>,

    /// First block in the chain
    head: Option<usize>,

    /// Last block in the chain
    tail: Option<usize>,

    /// Number of orders
    len: usize,

    /// Sum of all orders' volume
    total_volume: i64,

    lookup: LookupMode,
}

impl Default for BlockLevel {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockLevel {
    /// Create a new empty level
    pub fn new() -> Self {
        Self {
            blocks: Slab::new(),
            head: None,
            tail: None,
            len: 0,
            total_volume: 0,
            lookup: LookupMode::Scan,
        }
    }

    /// Create a level with room for `blocks` blocks before reallocating
    pub fn with_block_capacity(blocks: usize) -> Self {
        Self {
            blocks: Slab::with_capacity(blocks),
            ..Self::new()
        }
    }

    // ========================================================================
    // Size
    // ========================================================================

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn total_volume(&self) -> i64 {
        self.total_volume
    }

    /// Whether the ID to block map is currently maintained
    #[inline]
    pub fn is_index_active(&self) -> bool {
        matches!(self.lookup, LookupMode::Hashed(_))
    }

    // ========================================================================
    // Deque Operations
    // ========================================================================

    pub fn front(&self) -> Option<&Order> {
        self.blocks.get(self.head?)?.first()
    }

    pub fn back(&self) -> Option<&Order> {
        self.blocks.get(self.tail?)?.last()
    }

    /// Append an order at the back
    pub fn push_back(&mut self, order: Order) {
        let key = self.ensure_back_block();
        self.blocks[key].push_back(order);
        self.on_insert(key, &order);
    }

    /// Prepend an order at the front
    pub fn push_front(&mut self, order: Order) {
        let key = self.ensure_front_block();
        self.blocks[key].push_front(order);
        self.on_insert(key, &order);
    }

    /// Remove and return the first order, or None if empty
    pub fn pop_front(&mut self) -> Option<Order> {
        let key = self.head?;
        if self.blocks[key].is_empty() {
            return None;
        }
        let order = self.blocks[key].pop_front();
        self.on_remove(key, &order);
        Some(order)
    }

    /// Remove and return the last order, or None if empty
    pub fn pop_back(&mut self) -> Option<Order> {
        let key = self.tail?;
        if self.blocks[key].is_empty() {
            return None;
        }
        let order = self.blocks[key].pop_back();
        self.on_remove(key, &order);
        Some(order)
    }

    /// Remove all orders and free every block
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
        self.total_volume = 0;
        self.deactivate_index();
    }

    // ========================================================================
    // Cursor Navigation
    // ========================================================================

    /// Cursor at the first order (end if empty)
    pub fn begin(&self) -> Cursor {
        match self.head {
            Some(head) if !self.blocks[head].is_empty() => Cursor::at(head, 0),
            _ => Cursor::end(),
        }
    }

    #[inline]
    pub fn end(&self) -> Cursor {
        Cursor::end()
    }

    pub fn get(&self, cursor: Cursor) -> Option<&Order> {
        self.blocks.get(cursor.block?)?.get(cursor.index)
    }

    /// Cursor at the following order
    pub fn next(&self, cursor: Cursor) -> Cursor {
        let Some((key, block)) = cursor
            .block
            .and_then(|key| Some((key, self.blocks.get(key)?)))
        else {
            return Cursor::end();
        };
        if cursor.index + 1 < block.len() {
            return Cursor::at(key, cursor.index + 1);
        }
        match block.next {
            Some(next) => Cursor::at(next, 0),
            None => Cursor::end(),
        }
    }

    /// Cursor at the preceding order; from end this is the last order
    pub fn prev(&self, cursor: Cursor) -> Cursor {
        match cursor.block {
            None => self.last_of(self.tail),
            Some(key) if cursor.index > 0 => Cursor::at(key, cursor.index - 1),
            Some(key) => self.last_of(self.blocks.get(key).and_then(|block| block.prev)),
        }
    }

    /// Iterate over orders front to back
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            range: Range {
                level: self,
                front: self.begin(),
                back: self.end(),
            },
            remaining: self.len,
        }
    }

    // ========================================================================
    // Erase and Lookup
    // ========================================================================

    /// Erase the order under `cursor`, returning a cursor to the order that
    /// followed it.
    pub fn erase(&mut self, cursor: Cursor) -> Cursor {
        let Some(key) = cursor.block else {
            return cursor;
        };
        match self.remove_at(key, cursor.index) {
            Some((_, next)) => next,
            None => Cursor::end(),
        }
    }

    /// Remove an order by ID and return it
    pub fn remove_by_id(&mut self, id: u64) -> Option<Order> {
        let location = self.locate(id)?;
        self.remove_at(location.block, location.index)
            .map(|(order, _)| order)
    }

    /// Erase an order by ID; false if the ID is not present
    pub fn erase_by_id(&mut self, id: u64) -> bool {
        self.remove_by_id(id).is_some()
    }

    /// Cursor at the order with this ID, or end
    pub fn find(&self, id: u64) -> Cursor {
        self.locate(id).map_or(Cursor::end(), |location| location.cursor())
    }

    pub fn get_by_id(&self, id: u64) -> Option<&Order> {
        self.get(self.find(id))
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.locate(id).is_some()
    }

    /// Set the volume of an order by ID; false if the ID is not present
    pub fn update_volume(&mut self, id: u64, volume: i32) -> bool {
        let Some(location) = self.locate(id) else {
            return false;
        };
        let delta = self.blocks[location.block].set_volume(location.index, volume);
        self.total_volume += delta;
        true
    }

    // ========================================================================
    // Volume Queries
    // ========================================================================

    /// Orders covering the cumulative volume window `[lower, upper]`.
    ///
    /// The range starts at the first order whose running volume reaches
    /// `lower` (clamped to at least 1). When `upper` is below the total it
    /// ends with the first order whose running volume reaches `upper`, plus
    /// the zero-volume orders that keep the running volume exactly on
    /// `upper`. An `upper` at or past the total, `i64::MAX` included, runs
    /// to the back of the level. It is empty when `lower > upper` or `lower`
    /// exceeds the total volume.
    pub fn volume_range(&self, lower: i64, upper: i64) -> Range<'_> {
        let empty = Range {
            level: self,
            front: Cursor::end(),
            back: Cursor::end(),
        };
        let lower = lower.max(1);
        if self.is_empty() || lower > upper || lower > self.total_volume {
            return empty;
        }
        let (first, before) = self.seek_volume(self.begin(), 0, lower);
        if first.is_end() {
            return empty;
        }
        let back = if upper >= self.total_volume {
            Cursor::end()
        } else {
            let (last, before_last) = self.seek_volume(first, before, upper);
            let through = before_last + self.get(last).map_or(0, Order::signed_volume);
            let mut back = self.next(last);
            if through == upper {
                while matches!(self.get(back), Some(order) if order.volume == 0) {
                    back = self.next(back);
                }
            }
            back
        };
        Range {
            level: self,
            front: first,
            back,
        }
    }

    /// Append the orders of [`BlockLevel::volume_range`] to `out`, one slice
    /// per block. Returns the number of orders appended.
    pub fn copy_volume_range(&self, lower: i64, upper: i64, out: &mut Vec<Order>) -> usize {
        let (mut cursor, stop) = self.volume_range(lower, upper).bounds();
        let before = out.len();
        while cursor != stop {
            let Some(key) = cursor.block else {
                break;
            };
            let block = &self.blocks[key];
            let is_last = stop.block == Some(key);
            let to = if is_last { stop.index } else { block.len() };
            out.extend_from_slice(&block.as_slice()[cursor.index..to]);
            if is_last {
                break;
            }
            cursor = block.next.map_or(Cursor::end(), |next| Cursor::at(next, 0));
        }
        out.len() - before
    }

    /// Check every internal invariant, panicking on the first violation
    pub fn validate(&self) {
        let mut len = 0;
        let mut volume = 0;
        let mut blocks = 0;
        let mut prev = None;
        let mut current = self.head;
        while let Some(key) = current {
            let block = &self.blocks[key];
            assert_eq!(block.prev, prev, "broken back link at block {}", key);
            assert!(
                !block.is_empty() || self.blocks.len() == 1,
                "empty block {} left in a multi-block chain",
                key
            );
            let block_volume: i64 = block.as_slice().iter().map(Order::signed_volume).sum();
            assert_eq!(block_volume, block.total_volume(), "block {} volume drifted", key);
            if let LookupMode::Hashed(map) = &self.lookup {
                for order in block.as_slice() {
                    assert_eq!(map.get(&order.id), Some(&key), "stale map entry for {}", order.id);
                }
            }
            len += block.len();
            volume += block_volume;
            blocks += 1;
            prev = Some(key);
            current = block.next;
        }
        assert_eq!(prev, self.tail, "tail does not end the chain");
        assert_eq!(blocks, self.blocks.len(), "unlinked blocks in the slab");
        assert_eq!(len, self.len, "length drifted");
        assert_eq!(volume, self.total_volume, "total volume drifted");
        match &self.lookup {
            LookupMode::Scan => assert!(self.blocks.len() <= 1, "scan lookup over many blocks"),
            LookupMode::Hashed(map) => {
                assert!(self.blocks.len() >= 2, "map kept for a single block");
                assert_eq!(map.len(), self.len, "map has entries for removed orders");
            }
        }
    }

    // ========================================================================
    // Block Management
    // ========================================================================

    fn allocate(&mut self) -> usize {
        let key = self.blocks.insert(Block::new());
        trace!(block = key, blocks = self.blocks.len(), "allocated block");
        if self.blocks.len() >= 2 && !self.is_index_active() {
            self.activate_index();
        }
        key
    }

    fn free(&mut self, key: usize) {
        let block = self.blocks.remove(key);
        match block.prev {
            Some(prev) => self.blocks[prev].next = block.next,
            None => self.head = block.next,
        }
        match block.next {
            Some(next) => self.blocks[next].prev = block.prev,
            None => self.tail = block.prev,
        }
        trace!(block = key, blocks = self.blocks.len(), "freed block");
        if self.blocks.len() <= 1 {
            self.deactivate_index();
        }
    }

    fn ensure_back_block(&mut self) -> usize {
        match self.tail {
            Some(tail) if !self.blocks[tail].is_full() => tail,
            Some(tail) => {
                let key = self.allocate();
                self.blocks[key].prev = Some(tail);
                self.blocks[tail].next = Some(key);
                self.tail = Some(key);
                key
            }
            None => self.allocate_sole(),
        }
    }

    fn ensure_front_block(&mut self) -> usize {
        match self.head {
            Some(head) if !self.blocks[head].is_full() => head,
            Some(head) => {
                let key = self.allocate();
                self.blocks[key].next = Some(head);
                self.blocks[head].prev = Some(key);
                self.head = Some(key);
                key
            }
            None => self.allocate_sole(),
        }
    }

    fn allocate_sole(&mut self) -> usize {
        let key = self.allocate();
        self.head = Some(key);
        self.tail = Some(key);
        key
    }

    // ========================================================================
    // ID Lookup
    // ========================================================================

    fn activate_index(&mut self) {
        let map: HashMap<u64, usize> = self
            .blocks
            .iter()
            .flat_map(|(key, block)| block.as_slice().iter().map(move |order| (order.id, key)))
            .collect();
        debug!(entries = map.len(), blocks = self.blocks.len(), "activated id index");
        self.lookup = LookupMode::Hashed(map);
    }

    fn deactivate_index(&mut self) {
        if self.is_index_active() {
            debug!(blocks = self.blocks.len(), "tore down id index");
            self.lookup = LookupMode::Scan;
        }
    }

    fn locate(&self, id: u64) -> Option<Location> {
        let key = match &self.lookup {
            LookupMode::Scan => self.head?,
            LookupMode::Hashed(map) => *map.get(&id)?,
        };
        let index = self.blocks.get(key)?.position_of(id)?;
        Some(Location::new(key, index))
    }

    fn on_insert(&mut self, key: usize, order: &Order) {
        self.len += 1;
        self.total_volume += order.signed_volume();
        if let LookupMode::Hashed(map) = &mut self.lookup {
            map.insert(order.id, key);
        }
    }

    /// Bookkeeping after a record left block `key`; frees the block if it
    /// emptied and returns whether it was freed
    fn on_remove(&mut self, key: usize, order: &Order) -> bool {
        self.len -= 1;
        self.total_volume -= order.signed_volume();
        if let LookupMode::Hashed(map) = &mut self.lookup {
            map.remove(&order.id);
        }
        if !self.blocks[key].is_empty() {
            return false;
        }
        if self.head == Some(key) && self.tail == Some(key) {
            self.blocks[key].clear();
            debug!(block = key, "recentered sole block");
            false
        } else {
            self.free(key);
            true
        }
    }

    /// Erase `index` in block `key`, returning the record and the cursor
    /// to the order that followed it
    fn remove_at(&mut self, key: usize, index: usize) -> Option<(Order, Cursor)> {
        let block = self.blocks.get_mut(key)?;
        if index >= block.len() {
            return None;
        }
        let order = block.erase(index);
        let following = block.next;
        let remaining = block.len();
        let freed = self.on_remove(key, &order);
        let next = if !freed && index < remaining {
            Cursor::at(key, index)
        } else {
            following.map_or(Cursor::end(), |next| Cursor::at(next, 0))
        };
        Some((order, next))
    }

    // ========================================================================
    // Traversal Helpers
    // ========================================================================

    fn last_of(&self, key: Option<usize>) -> Cursor {
        match key.and_then(|key| Some((key, self.blocks.get(key)?.len()))) {
            Some((key, len)) if len > 0 => Cursor::at(key, len - 1),
            _ => Cursor::end(),
        }
    }

    /// Walk forward from `from`, whose preceding running volume is `before`,
    /// to the first order whose running volume reaches `target`. Returns
    /// that cursor and the running volume before it.
    fn seek_volume(&self, from: Cursor, mut before: i64, target: i64) -> (Cursor, i64) {
        let Some(mut key) = from.block else {
            return (Cursor::end(), before);
        };
        let mut start = from.index;
        loop {
            let block = &self.blocks[key];
            let rest = &block.as_slice()[start..];
            let rest_volume: i64 = if start == 0 {
                block.total_volume()
            } else {
                rest.iter().map(Order::signed_volume).sum()
            };
            if before + rest_volume >= target {
                let mut running = before;
                for (offset, order) in rest.iter().enumerate() {
                    let after = running + order.signed_volume();
                    if after >= target {
                        return (Cursor::at(key, start + offset), running);
                    }
                    running = after;
                }
            }
            before += rest_volume;
            match block.next {
                Some(next) => {
                    key = next;
                    start = 0;
                }
                None => return (Cursor::end(), before),
            }
        }
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl Clone for BlockLevel {
    /// Element-wise deep copy; blocks are packed afresh.
    fn clone(&self) -> Self {
        self.iter().copied().collect()
    }
}

impl fmt::Debug for BlockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<Order> for BlockLevel {
    fn from_iter<I: IntoIterator<Item = Order>>(iter: I) -> Self {
        let mut level = Self::new();
        level.extend(iter);
        level
    }
}

impl Extend<Order> for BlockLevel {
    fn extend<I: IntoIterator<Item = Order>>(&mut self, iter: I) {
        for order in iter {
            self.push_back(order);
        }
    }
}

impl<'a> IntoIterator for &'a BlockLevel {
    type Item = &'a Order;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl OrderQueue for BlockLevel {
    fn len(&self) -> usize {
        BlockLevel::len(self)
    }

    fn front(&self) -> Option<&Order> {
        BlockLevel::front(self)
    }

    fn back(&self) -> Option<&Order> {
        BlockLevel::back(self)
    }

    fn push_back(&mut self, order: Order) {
        BlockLevel::push_back(self, order)
    }

    fn push_front(&mut self, order: Order) {
        BlockLevel::push_front(self, order)
    }

    fn pop_front(&mut self) -> Option<Order> {
        BlockLevel::pop_front(self)
    }

    fn pop_back(&mut self) -> Option<Order> {
        BlockLevel::pop_back(self)
    }

    fn erase_by_id(&mut self, id: u64) -> bool {
        BlockLevel::erase_by_id(self, id)
    }

    fn contains_id(&self, id: u64) -> bool {
        BlockLevel::contains_id(self, id)
    }

    fn update_volume(&mut self, id: u64, volume: i32) -> bool {
        BlockLevel::update_volume(self, id, volume)
    }

    fn total_volume(&self) -> i64 {
        BlockLevel::total_volume(self)
    }

    fn copy_volume_range(&self, lower: i64, upper: i64, out: &mut Vec<Order>) -> usize {
        BlockLevel::copy_volume_range(self, lower, upper, out)
    }

    fn snapshot(&self) -> Vec<Order> {
        self.iter().copied().collect()
    }
}

// ============================================================================
// Iterators
// ============================================================================

/// Half-open run of orders between two cursors of a [`BlockLevel`]
#[derive(Clone)]
pub struct Range<'a> {
    level: &'a BlockLevel,
    front: Cursor,
    back: Cursor,
}

impl Range<'_> {
    /// Remaining `(first, past-the-end)` cursors
    pub fn bounds(&self) -> (Cursor, Cursor) {
        (self.front, self.back)
    }

    pub fn is_empty(&self) -> bool {
        self.front == self.back
    }
}

impl<'a> Iterator for Range<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let order = self.level.get(self.front)?;
        self.front = self.level.next(self.front);
        Some(order)
    }
}

impl DoubleEndedIterator for Range<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back = self.level.prev(self.back);
        self.level.get(self.back)
    }
}

impl FusedIterator for Range<'_> {}

/// Front-to-back iterator over every order of a [`BlockLevel`]
#[derive(Clone)]
pub struct Iter<'a> {
    range: Range<'a>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        let order = self.range.next()?;
        self.remaining -= 1;
        Some(order)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let order = self.range.next_back()?;
        self.remaining -= 1;
        Some(order)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

// ============================================================================
// Unit Tests
// ============================================================================
