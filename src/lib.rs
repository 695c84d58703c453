//! # Block Order Book
//!
//! Sequence containers for resting orders that need cheap pushes at both
//! ends, O(1) removal by order ID, and fast "which orders cover cumulative
//! volume `[lower, upper]`" queries.
//!
//! ## Architecture
//!
//! The crate consists of:
//! - **Types**: the `Copy` [`Order`] record and cursor handles
//! - **OrderBook**: three containers behind one [`OrderQueue`] contract
//!   - [`BlockOrderBook`]: 64-slot blocks with tombstoned removal and a
//!     Fenwick prefix index over block volumes
//!   - [`BlockLevel`]: dense blocks that compact on removal, with an ID map
//!     that only exists while two or more blocks are live
//!   - [`RingBuffer`]: a power-of-two ring used as the flat reference
//! - **Error**: [`DequeError`] for the few fallible growth paths
//!
//! ## Design Principles
//!
//! 1. **Stable handles**: blocks live in a slab and are addressed by key, so
//!    ID index entries survive arena growth
//! 2. **Slice copies**: records are `Copy`; block shifts and range copies are
//!    memmoves, never per-element clones
//! 3. **Determinism**: identical operation streams produce identical
//!    sequences; [`state_root`] hashes a sequence for comparison
//! 4. **Synchronous**: single-owner containers, no internal locking
//!
//! ## Example
//!
//! ```
//! use block_order_book::{BlockOrderBook, Order, OrderQueue};
//!
//! let mut book = BlockOrderBook::new();
//! for id in 1..=100 {
//!     book.push_back(Order::new(id, 1_000_000 + id, 10, false));
//! }
//!
//! book.erase_by_id(50);
//! assert_eq!(book.len(), 99);
//! assert_eq!(book.total_volume(), 990);
//!
//! let mut window = Vec::new();
//! book.copy_volume_range(1, 25, &mut window);
//! assert_eq!(window.len(), 3);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Order, Cursor, Location
pub mod types;

/// Order containers: segmented deques, prefix index, ring buffer
pub mod orderbook;

/// Error type for fallible growth
pub mod error;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use error::{DequeError, Result};
pub use orderbook::{BlockLevel, BlockOrderBook, OrderQueue, RingBuffer, BLOCK_CAPACITY};
pub use types::{state_root, Cursor, Location, Order};
