//! Shared helpers for the integration tests.

#![allow(dead_code)]

use block_order_book::Order;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// ORDER GENERATION
// ============================================================================

/// Deterministic order stream shaped like live exchange data.
///
/// IDs increase by 1 to 4, timestamps track the ID with jitter, and volumes
/// are signed in `[-1000, 1000)`. Same seed = same orders.
pub struct OrderGenerator {
    rng: ChaCha8Rng,
    next_id: u64,
}

impl OrderGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 1,
        }
    }

    pub fn next_order(&mut self) -> Order {
        let id = self.next_id;
        self.next_id += 1 + (self.rng.next_u64() & 0x3);
        let timestamp = 1_000_000 + (id << 5) + (self.rng.next_u64() & 0xFFFF);
        let volume = (self.rng.next_u64() % 2_000) as i32 - 1_000;
        let is_own = self.rng.next_u64() & 0x1 == 0;
        Order::new(id, timestamp, volume, is_own)
    }

    pub fn generate(&mut self, count: usize) -> Vec<Order> {
        (0..count).map(|_| self.next_order()).collect()
    }
}

/// Orders `1..=count` with non-negative random volumes below `max_volume`
pub fn positive_orders(count: u64, max_volume: i32, seed: u64) -> Vec<Order> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (1..=count)
        .map(|id| Order::new(id, 1_000_000 + (id << 5), rng.gen_range(0..max_volume), rng.gen_bool(0.5)))
        .collect()
}

/// Orders `1..=count`, all with the same volume
pub fn uniform_orders(count: u64, volume: i32) -> Vec<Order> {
    (1..=count)
        .map(|id| Order::new(id, 1_000_000 + id, volume, false))
        .collect()
}

// ============================================================================
// REFERENCE QUERIES
// ============================================================================

/// IDs covering the cumulative volume window `[lower, upper]`, computed the
/// slow way over a plain slice
pub fn reference_range(orders: &[Order], lower: i64, upper: i64) -> Vec<u64> {
    let total: i64 = orders.iter().map(Order::signed_volume).sum();
    let lower = lower.max(1);
    if orders.is_empty() || lower > upper || lower > total {
        return Vec::new();
    }
    let open_ended = upper >= total;

    let mut running = 0;
    let mut ids = Vec::new();
    let mut on_upper = false;
    for order in orders {
        if on_upper {
            if order.volume != 0 {
                break;
            }
            ids.push(order.id);
            continue;
        }
        running += order.signed_volume();
        if ids.is_empty() && running < lower {
            continue;
        }
        ids.push(order.id);
        if !open_ended && running >= upper {
            if running > upper {
                break;
            }
            on_upper = true;
        }
    }
    ids
}

pub fn ids(orders: &[Order]) -> Vec<u64> {
    orders.iter().map(|o| o.id).collect()
}
