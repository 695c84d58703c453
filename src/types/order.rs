//! The fixed-layout record stored by every container in this crate.
//!
//! ## Layout
//!
//! `Order` is `Copy` and owns no heap memory, so blocks can relocate it with
//! plain slice copies (`copy_within`, `extend_from_slice`) instead of
//! element-wise moves.
//!
//! ## Identifier Ordering
//!
//! Producers hand out increasing identifiers. The segmented containers only
//! treat `id` as a unique key while the record is present; the ring buffer's
//! ID lookup is a binary search and relies on the increasing order.

use sha2::{Digest, Sha256};

/// A resting order as seen by the sequence containers.
///
/// ## Example
///
/// ```
/// use block_order_book::types::Order;
///
/// let order = Order::new(7, 1_703_577_600_000, -250, true);
/// assert_eq!(order.id, 7);
/// assert_eq!(order.signed_volume(), -250);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Order {
    /// Unique identifier (assigned by the producer, increasing)
    pub id: u64,

    /// Exchange timestamp
    pub timestamp: u64,

    /// Signed volume; range queries run over its cumulative sum
    pub volume: i32,

    /// Whether the order belongs to us
    pub is_own: bool,
}

impl Order {
    /// Create a new order record
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier
    /// * `timestamp` - Exchange timestamp
    /// * `volume` - Signed volume
    /// * `is_own` - Ownership flag
    #[inline]
    pub const fn new(id: u64, timestamp: u64, volume: i32, is_own: bool) -> Self {
        Self {
            id,
            timestamp,
            volume,
            is_own,
        }
    }

    /// Volume widened for accumulation
    #[inline]
    pub fn signed_volume(&self) -> i64 {
        i64::from(self.volume)
    }

    /// Feed the record into a running digest.
    ///
    /// Fields are written little-endian in declaration order.
    pub(crate) fn digest_into(&self, hasher: &mut Sha256) {
        hasher.update(self.id.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.volume.to_le_bytes());
        hasher.update([u8::from(self.is_own)]);
    }
}

/// Compute the SHA-256 state root of a record sequence.
///
/// The root depends on the records and their order, not on how a container
/// lays them out in memory.
pub fn state_root<'a, I>(orders: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut hasher = Sha256::new();
    let mut count: u64 = 0;
    for order in orders {
        order.digest_into(&mut hasher);
        count += 1;
    }
    hasher.update(count.to_le_bytes());
    hasher.finalize().into()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_new() {
        let order = Order::new(1, 1_703_577_600_000, 100, false);

        assert_eq!(order.id, 1);
        assert_eq!(order.timestamp, 1_703_577_600_000);
        assert_eq!(order.volume, 100);
        assert!(!order.is_own);
    }

    #[test]
    fn test_order_signed_volume() {
        assert_eq!(Order::new(1, 0, i32::MIN, false).signed_volume(), i64::from(i32::MIN));
        assert_eq!(Order::new(1, 0, -5, false).signed_volume(), -5);
    }

    #[test]
    fn test_order_is_copy() {
        let order = Order::new(3, 9, 12, true);
        let copy = order;
        assert_eq!(order, copy);
    }

    #[test]
    fn test_state_root_deterministic() {
        let orders = vec![Order::new(1, 10, 5, false), Order::new(2, 11, -3, true)];

        let root1 = state_root(&orders);
        let root2 = state_root(&orders);

        assert_eq!(root1, root2, "state root must be deterministic");
    }

    #[test]
    fn test_state_root_order_sensitive() {
        let a = Order::new(1, 10, 5, false);
        let b = Order::new(2, 11, -3, true);

        assert_ne!(state_root(&[a, b]), state_root(&[b, a]));
        assert_ne!(state_root(&[a]), state_root(&[a, a]));
    }

    #[test]
    fn test_state_root_empty() {
        let empty: Vec<Order> = Vec::new();
        assert_eq!(state_root(&empty), state_root(std::iter::empty()));
    }
}
