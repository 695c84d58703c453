//! Order containers: two segmented deques and a flat ring buffer.
//!
//! ## Architecture
//!
//! All three containers hold [`Order`] records in arrival order and answer
//! the same questions: push and pop at either end, remove or re-volume an
//! order by ID, and copy out the run of orders covering a cumulative-volume
//! window.
//!
//! - **Slab-based blocks**: both segmented variants keep fixed 64-slot blocks
//!   in a [`slab::Slab`], linked by key
//! - **Tombstones vs compaction**: [`BlockOrderBook`] marks removed slots dead
//!   and keeps a Fenwick [`VolumePrefixIndex`]; [`BlockLevel`] closes gaps
//!   immediately and keeps an ID map only once it spans two blocks
//! - **Reference ring**: [`RingBuffer`] is a plain power-of-two deque
//!
//! ## Components
//!
//! - [`Block`]: dense block for the compaction variant
//! - [`BlockNode`]: tombstone block with a live bitmask
//! - [`VolumePrefixIndex`]: prefix sums over per-block volume
//! - [`OrderQueue`]: the shared container contract
//!
//! ## Performance
//!
//! | Operation | BlockOrderBook | BlockLevel | RingBuffer |
//! |-----------|----------------|------------|------------|
//! | Push / pop at ends | O(1) | O(1) | O(1) amortized |
//! | Erase by ID | O(1) | O(64) | O(log n + n) |
//! | Volume range start | O(log b + 64) | O(b + 64) | O(n) |
//!
//! *b = number of blocks*
//!
//! ## Example
//!
//! ```
//! use block_order_book::orderbook::{BlockLevel, BlockOrderBook, OrderQueue, RingBuffer};
//! use block_order_book::types::Order;
//!
//! fn fill(queue: &mut impl OrderQueue) {
//!     for id in 1..=200 {
//!         queue.push_back(Order::new(id, 0, 10, false));
//!     }
//! }
//!
//! let (mut book, mut level, mut ring) =
//!     (BlockOrderBook::new(), BlockLevel::new(), RingBuffer::<Order>::new());
//! fill(&mut book);
//! fill(&mut level);
//! fill(&mut ring);
//!
//! assert_eq!(book.state_root(), level.state_root());
//! assert_eq!(level.state_root(), ring.state_root());
//! ```

pub mod block;
pub mod book;
pub mod fenwick;
pub mod level;
pub mod node;
pub mod ring;

pub use block::Block;
pub use book::BlockOrderBook;
pub use fenwick::VolumePrefixIndex;
pub use level::BlockLevel;
pub use node::{BlockNode, Placement};
pub use ring::RingBuffer;

use crate::types::{state_root, Order};

/// Slots per block in both segmented containers.
///
/// Capped at 64 so a block's live set fits one `u64` mask.
pub const BLOCK_CAPACITY: usize = 64;

/// Common contract of the order containers.
///
/// Lookups that miss report `false` or `None`; nothing here panics on a
/// missing ID or an empty container.
pub trait OrderQueue {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn front(&self) -> Option<&Order>;

    fn back(&self) -> Option<&Order>;

    fn push_back(&mut self, order: Order);

    fn push_front(&mut self, order: Order);

    fn pop_front(&mut self) -> Option<Order>;

    fn pop_back(&mut self) -> Option<Order>;

    /// Remove the order with this ID; false if absent
    fn erase_by_id(&mut self, id: u64) -> bool;

    fn contains_id(&self, id: u64) -> bool;

    /// Overwrite an order's volume; false if absent
    fn update_volume(&mut self, id: u64, volume: i32) -> bool;

    /// Sum of every order's volume
    fn total_volume(&self) -> i64;

    /// Append the run of orders covering the cumulative volume window
    /// `[lower, upper]` to `out` and return how many were appended.
    ///
    /// The run starts at the first order whose running volume reaches
    /// `lower` (at least 1) and ends with the first order whose running
    /// volume reaches `upper`, together with any zero-volume orders that
    /// leave the running volume exactly on `upper`. An `upper` at or past the
    /// total runs to the back.
    fn copy_volume_range(&self, lower: i64, upper: i64, out: &mut Vec<Order>) -> usize;

    /// Orders front to back, copied out
    fn snapshot(&self) -> Vec<Order>;

    /// SHA-256 over the orders front to back
    fn state_root(&self) -> [u8; 32] {
        state_root(&self.snapshot())
    }
}
