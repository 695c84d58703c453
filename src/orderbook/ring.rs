//! Power-of-two ring buffer.
//!
//! ## Design
//!
//! `RingBuffer<T>` stores elements in a `Vec<Option<T>>` whose length is
//! always zero or a power of two, so a logical index maps to a slot with a
//! single mask: `(head + index) & (capacity - 1)`.
//!
//! ```text
//! capacity 8, head 6, len 4
//!
//! slot:    0    1    2    3    4    5    6    7
//!        [ r2 | r3 | -- | -- | -- | -- | r0 | r1 ]
//!                                        ^head
//! ```
//!
//! Growth doubles to the next power of two and unwraps the elements to start
//! at slot 0. Capacity is never released by pops or `clear`.
//!
//! Within this crate the ring is the flat reference container the segmented
//! books are measured against: positional access is O(1), removal by ID is a
//! binary search plus an O(n) shift.

use std::fmt;
use std::iter::FusedIterator;
use std::ops::{Index, IndexMut};

use tracing::trace;

use crate::error::{DequeError, Result};
use crate::orderbook::OrderQueue;
use crate::types::Order;

/// Growable double-ended queue on a power-of-two ring.
///
/// ## Example
///
/// ```
/// use block_order_book::orderbook::RingBuffer;
///
/// let mut ring = RingBuffer::with_capacity(3);
/// assert_eq!(ring.capacity(), 4);
///
/// ring.push_back(2);
/// ring.push_back(3);
/// ring.push_front(1);
/// assert_eq!(ring[0], 1);
/// assert_eq!(ring.erase(1), Some(2));
/// assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
/// ```
pub struct RingBuffer<T> {
    /// Slot storage; `len()` is zero or a power of two
    buf: Vec<Option<T>>,

    /// Slot of the logical front
    head: usize,

    /// Number of stored elements
    len: usize,
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RingBuffer<T> {
    /// Create an empty ring without allocating
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            head: 0,
            len: 0,
        }
    }

    /// Create a ring with room for at least `capacity` elements
    ///
    /// # Panics
    ///
    /// Panics if the rounded-up capacity overflows `usize`.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut ring = Self::new();
        ring.reserve(capacity);
        ring
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots (always zero or a power of two)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    // ========================================================================
    // Capacity
    // ========================================================================

    /// Make room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows or the allocation fails.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(err) = self.try_reserve(additional) {
            panic!("RingBuffer::reserve: {}", err);
        }
    }

    /// Fallible [`RingBuffer::reserve`]; the ring is unchanged on error.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let required = self
            .len
            .checked_add(additional)
            .ok_or(DequeError::CapacityOverflow {
                requested: usize::MAX,
            })?;
        if required <= self.capacity() {
            return Ok(());
        }
        let capacity = required
            .checked_next_power_of_two()
            .ok_or(DequeError::CapacityOverflow { requested: required })?;
        self.grow_to(capacity)
    }

    fn grow_to(&mut self, capacity: usize) -> Result<()> {
        let mut buf: Vec<Option<T>> = Vec::new();
        buf.try_reserve_exact(capacity)?;
        for index in 0..self.len {
            let slot = self.slot(index);
            buf.push(self.buf[slot].take());
        }
        buf.resize_with(capacity, || None);
        trace!(from = self.buf.len(), to = capacity, len = self.len, "grew ring buffer");
        self.buf = buf;
        self.head = 0;
        Ok(())
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.head + index) & (self.capacity() - 1)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Element at logical `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.buf[self.slot(index)].as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let slot = self.slot(index);
        self.buf[slot].as_mut()
    }

    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn back(&self) -> Option<&T> {
        self.get(self.len.checked_sub(1)?)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            front: 0,
            back: self.len,
        }
    }

    // ========================================================================
    // Deque Operations
    // ========================================================================

    pub fn push_back(&mut self, value: T) {
        self.reserve(1);
        let slot = self.slot(self.len);
        self.buf[slot] = Some(value);
        self.len += 1;
    }

    pub fn push_front(&mut self, value: T) {
        self.reserve(1);
        self.head = (self.head + self.capacity() - 1) & (self.capacity() - 1);
        self.buf[self.head] = Some(value);
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.buf[self.head].take();
        self.head = (self.head + 1) & (self.capacity() - 1);
        self.len -= 1;
        value
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.len -= 1;
        let slot = self.slot(self.len);
        self.buf[slot].take()
    }

    /// Remove the element at logical `index`, shifting the shorter side.
    ///
    /// Afterwards `index` addresses the element that followed the removed one.
    pub fn erase(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        if index < self.len / 2 {
            for i in (1..=index).rev() {
                let (a, b) = (self.slot(i), self.slot(i - 1));
                self.buf.swap(a, b);
            }
            self.pop_front()
        } else {
            for i in index..self.len - 1 {
                let (a, b) = (self.slot(i), self.slot(i + 1));
                self.buf.swap(a, b);
            }
            self.pop_back()
        }
    }

    /// Drop every element; capacity is kept
    pub fn clear(&mut self) {
        while self.pop_back().is_some() {}
        self.head = 0;
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Index of the first element for which `pred` is false, assuming the
    /// ring is partitioned by `pred`
    pub fn partition_point<P>(&self, mut pred: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get(mid) {
                Some(value) if pred(value) => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }

    /// Binary search on a key the ring is sorted by, like
    /// [`slice::binary_search_by_key`]
    pub fn binary_search_by_key<K, F>(&self, key: &K, mut f: F) -> std::result::Result<usize, usize>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        let index = self.partition_point(|value| f(value) < *key);
        match self.get(index) {
            Some(value) if f(value) == *key => Ok(index),
            _ => Err(index),
        }
    }
}

impl RingBuffer<Order> {
    /// Logical index of the order with this ID.
    ///
    /// Binary search: IDs must ascend from front to back, which holds when
    /// producers hand out increasing IDs and `push_front` only ever carries
    /// older orders.
    pub fn position_of_id(&self, id: u64) -> Option<usize> {
        self.binary_search_by_key(&id, |order| order.id).ok()
    }

    /// Sum of every order's volume, O(n)
    pub fn total_volume(&self) -> i64 {
        self.iter().map(Order::signed_volume).sum()
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl<T> Index<usize> for RingBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        let len = self.len;
        self.get(index)
            .unwrap_or_else(|| panic!("index {} out of bounds for length {}", index, len))
    }
}

impl<T> IndexMut<usize> for RingBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;
        self.get_mut(index)
            .unwrap_or_else(|| panic!("index {} out of bounds for length {}", index, len))
    }
}

impl<T: Clone> Clone for RingBuffer<T> {
    /// Copies into the smallest power-of-two capacity, starting at slot 0
    fn clone(&self) -> Self {
        let mut ring = Self::with_capacity(self.len);
        ring.extend(self.iter().cloned());
        ring
    }
}

impl<T: fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for RingBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for RingBuffer<T> {}

impl<T> FromIterator<T> for RingBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ring = Self::new();
        ring.extend(iter);
        ring
    }
}

impl<T> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for RingBuffer<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { ring: self }
    }
}

impl OrderQueue for RingBuffer<Order> {
    fn len(&self) -> usize {
        RingBuffer::len(self)
    }

    fn front(&self) -> Option<&Order> {
        RingBuffer::front(self)
    }

    fn back(&self) -> Option<&Order> {
        RingBuffer::back(self)
    }

    fn push_back(&mut self, order: Order) {
        RingBuffer::push_back(self, order)
    }

    fn push_front(&mut self, order: Order) {
        RingBuffer::push_front(self, order)
    }

    fn pop_front(&mut self) -> Option<Order> {
        RingBuffer::pop_front(self)
    }

    fn pop_back(&mut self) -> Option<Order> {
        RingBuffer::pop_back(self)
    }

    fn erase_by_id(&mut self, id: u64) -> bool {
        match self.position_of_id(id) {
            Some(index) => self.erase(index).is_some(),
            None => false,
        }
    }

    fn contains_id(&self, id: u64) -> bool {
        self.position_of_id(id).is_some()
    }

    fn update_volume(&mut self, id: u64, volume: i32) -> bool {
        let Some(order) = self.position_of_id(id).and_then(|index| self.get_mut(index)) else {
            return false;
        };
        order.volume = volume;
        true
    }

    fn total_volume(&self) -> i64 {
        RingBuffer::total_volume(self)
    }

    /// Linear scan over running volume; same window policy as the segmented
    /// books.
    fn copy_volume_range(&self, lower: i64, upper: i64, out: &mut Vec<Order>) -> usize {
        let total = self.total_volume();
        let lower = lower.max(1);
        if self.is_empty() || lower > upper || lower > total {
            return 0;
        }
        let open_ended = upper >= total;
        let mut running = 0;
        let mut first = None;
        let mut last = self.len;
        let mut on_upper = false;
        for (index, order) in self.iter().enumerate() {
            if on_upper {
                if order.volume != 0 {
                    last = index;
                    break;
                }
                continue;
            }
            running += order.signed_volume();
            if first.is_none() && running >= lower {
                first = Some(index);
            }
            if first.is_some() && !open_ended && running >= upper {
                if running > upper {
                    last = index + 1;
                    break;
                }
                on_upper = true;
            }
        }
        let Some(first) = first else {
            return 0;
        };
        out.extend(self.iter().skip(first).take(last - first).copied());
        last - first
    }

    fn snapshot(&self) -> Vec<Order> {
        self.iter().copied().collect()
    }
}

// ============================================================================
// Iterators
// ============================================================================

/// Borrowing iterator over a [`RingBuffer`]
pub struct Iter<'a, T> {
    ring: &'a RingBuffer<T>,
    front: usize,
    back: usize,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring,
            front: self.front,
            back: self.back,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let value = self.ring.get(self.front);
        self.front += 1;
        value
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }

    /// O(1): jumps straight to the target index
    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.back - self.front {
            self.front = self.back;
            return None;
        }
        self.front += n;
        self.next()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.ring.get(self.back)
    }

    fn nth_back(&mut self, n: usize) -> Option<Self::Item> {
        if n >= self.back - self.front {
            self.back = self.front;
            return None;
        }
        self.back -= n;
        self.next_back()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

/// Owning iterator over a [`RingBuffer`]
pub struct IntoIter<T> {
    ring: RingBuffer<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.ring.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.ring.len(), Some(self.ring.len()))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        self.ring.pop_back()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> FusedIterator for IntoIter<T> {}

// ============================================================================
// Unit Tests
// ============================================================================
