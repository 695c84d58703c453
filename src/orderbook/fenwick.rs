//! Volume prefix index over per-block volume totals.
//!
//! ## Design
//!
//! A Fenwick (binary indexed) tree stored in a `Vec<i64>` of length `n + 1`.
//! Position `k` is the k-th block in chain order. The tree is rebuilt with
//! [`VolumePrefixIndex::init`] whenever block linkage changes and updated
//! with deltas otherwise.
//!
//! ## Complexity
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | `update` | O(log n) |
//! | `prefix_sum` | O(log n) |
//! | `lower_bound` | O(log n) |
//! | `init` | O(n) |
//!
//! `lower_bound` assumes non-negative block totals, like any Fenwick search;
//! with negative totals it still returns a position, just not necessarily the
//! first one whose prefix reaches the target.

/// Fenwick tree of signed block volumes.
///
/// ## Example
///
/// ```
/// use block_order_book::orderbook::VolumePrefixIndex;
///
/// let mut index = VolumePrefixIndex::from_totals([10, 20, 30]);
/// assert_eq!(index.prefix_sum(1), 30);
/// assert_eq!(index.lower_bound(31), 2);
///
/// index.update(0, 5);
/// assert_eq!(index.total(), 65);
/// ```
#[derive(Debug, Clone, Default)]
pub struct VolumePrefixIndex {
    /// 1-based partial sums; empty means zero positions
    tree: Vec<i64>,
}

impl VolumePrefixIndex {
    /// Create an index with zero positions
    pub fn new() -> Self {
        Self { tree: Vec::new() }
    }

    /// Build an index from block totals in chain order
    pub fn from_totals<I>(totals: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut tree = vec![0];
        tree.extend(totals);
        let len = tree.len();
        // Linear-time construction: push each node into its parent.
        for idx in 1..len {
            let parent = idx + lowest_bit(idx);
            if parent < len {
                tree[parent] += tree[idx];
            }
        }
        Self { tree }
    }

    /// Reset to `n` positions, all zero
    pub fn init(&mut self, n: usize) {
        self.tree.clear();
        self.tree.resize(n + 1, 0);
    }

    /// Number of positions
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `delta` to the value at `position`
    ///
    /// No-op when the index has no positions.
    pub fn update(&mut self, position: usize, delta: i64) {
        if self.tree.is_empty() {
            return;
        }
        debug_assert!(position < self.len(), "position {} out of range", position);
        let mut idx = position + 1;
        while idx < self.tree.len() {
            self.tree[idx] += delta;
            idx += lowest_bit(idx);
        }
    }

    /// Sum of the values at positions `0..=position`
    ///
    /// Returns 0 when the index has no positions.
    pub fn prefix_sum(&self, position: usize) -> i64 {
        if self.tree.is_empty() {
            return 0;
        }
        let mut idx = (position + 1).min(self.len());
        let mut sum = 0;
        while idx > 0 {
            sum += self.tree[idx];
            idx &= idx - 1;
        }
        sum
    }

    /// Sum of all positions
    pub fn total(&self) -> i64 {
        match self.len() {
            0 => 0,
            n => self.prefix_sum(n - 1),
        }
    }

    /// Smallest position whose inclusive prefix sum is `>= target`.
    ///
    /// Returns `len()` when no position reaches the target, and 0 when the
    /// index is empty.
    pub fn lower_bound(&self, mut target: i64) -> usize {
        let mut idx = 0;
        let mut bit = self.highest_bit();
        while bit != 0 {
            let next = idx + bit;
            if next < self.tree.len() && self.tree[next] < target {
                idx = next;
                target -= self.tree[next];
            }
            bit >>= 1;
        }
        idx
    }

    fn highest_bit(&self) -> usize {
        match self.len() {
            0 => 0,
            n => 1 << (usize::BITS - 1 - n.leading_zeros()),
        }
    }
}

#[inline]
fn lowest_bit(idx: usize) -> usize {
    idx & idx.wrapping_neg()
}

// ============================================================================
// Unit Tests
// ============================================================================
