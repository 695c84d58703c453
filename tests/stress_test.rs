//! Stress tests for the order containers.
//!
//! These tests verify:
//! 1. The containers stay consistent under long randomized churn
//! 2. Identical seeds produce identical state roots
//! 3. Tombstoned blocks are reclaimed as they empty
//!
//! Throughput is printed for comparison, not asserted.
//!
//! ## Running Stress Tests
//!
//! ```bash
//! # Run all stress tests (release mode recommended)
//! cargo test --release --test stress_test -- --nocapture
//!
//! # Run specific test
//! cargo test --release --test stress_test stress_churn -- --nocapture
//! ```

mod common;

use std::collections::HashMap;
use std::time::Instant;

use block_order_book::{BlockLevel, BlockOrderBook, Order, OrderQueue, RingBuffer, BLOCK_CAPACITY};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use common::OrderGenerator;

// ============================================================================
// TEST CONSTANTS
// ============================================================================

/// Orders resident before churn starts
const RESIDENT_ORDERS: usize = 10_000;

/// Churn operations per container
const CHURN_OPS: usize = 60_000;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Live order IDs with O(1) random pick and O(1) removal by ID
#[derive(Default)]
struct LiveSet {
    ids: Vec<u64>,
    slots: HashMap<u64, usize>,
}

impl LiveSet {
    fn insert(&mut self, id: u64) {
        self.slots.insert(id, self.ids.len());
        self.ids.push(id);
    }

    fn remove(&mut self, id: u64) -> bool {
        let Some(slot) = self.slots.remove(&id) else {
            return false;
        };
        self.ids.swap_remove(slot);
        if let Some(&moved) = self.ids.get(slot) {
            self.slots.insert(moved, slot);
        }
        true
    }

    fn pick(&self, rng: &mut ChaCha8Rng) -> Option<u64> {
        if self.ids.is_empty() {
            return None;
        }
        Some(self.ids[rng.gen_range(0..self.ids.len())])
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Replay a seeded churn of erase / replenish / pop / amend operations and
/// return the final state root together with the ops/sec achieved.
fn run_churn<Q: OrderQueue>(queue: &mut Q, seed: u64) -> ([u8; 32], f64) {
    let mut generator = OrderGenerator::new(seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);
    let mut live = LiveSet::default();

    for order in generator.generate(RESIDENT_ORDERS) {
        live.insert(order.id);
        queue.push_back(order);
    }

    let start = Instant::now();
    for _ in 0..CHURN_OPS {
        match rng.gen_range(0..10) {
            0..=4 => {
                if let Some(id) = live.pick(&mut rng) {
                    live.remove(id);
                    assert!(queue.erase_by_id(id), "live id {} missing", id);
                }
            }
            5 => {
                if let Some(order) = queue.pop_front() {
                    assert!(live.remove(order.id), "popped unknown id {}", order.id);
                }
            }
            6 => {
                if let Some(id) = live.pick(&mut rng) {
                    assert!(queue.update_volume(id, rng.gen_range(-1_000..1_000)));
                }
            }
            _ => {
                let order = generator.next_order();
                live.insert(order.id);
                queue.push_back(order);
            }
        }
    }
    let elapsed = start.elapsed();

    assert_eq!(queue.len(), live.len());
    let expected: i64 = queue.snapshot().iter().map(Order::signed_volume).sum();
    assert_eq!(queue.total_volume(), expected);

    (queue.state_root(), CHURN_OPS as f64 / elapsed.as_secs_f64())
}

// ============================================================================
// STRESS TESTS
// ============================================================================

/// Main stress test: the same churn through all three containers.
///
/// # Verification
/// - Every container ends with identical contents
/// - Internal invariants hold after the run
#[test]
fn stress_churn() {
    println!("\n=== STRESS TEST: {} churn ops over {} orders ===\n", CHURN_OPS, RESIDENT_ORDERS);

    let mut book = BlockOrderBook::with_block_capacity(RESIDENT_ORDERS / BLOCK_CAPACITY * 2);
    let mut level = BlockLevel::with_block_capacity(RESIDENT_ORDERS / BLOCK_CAPACITY * 2);
    let mut ring = RingBuffer::<Order>::with_capacity(RESIDENT_ORDERS * 2);

    let (book_root, book_rate) = run_churn(&mut book, 42);
    let (level_root, level_rate) = run_churn(&mut level, 42);
    let (ring_root, ring_rate) = run_churn(&mut ring, 42);

    println!("{:>16} {:>14} {:>10}", "Container", "Ops/sec", "Blocks");
    println!("{:-<16} {:-<14} {:-<10}", "", "", "");
    println!("{:>16} {:>14.0} {:>10}", "BlockOrderBook", book_rate, book.block_count());
    println!("{:>16} {:>14.0} {:>10}", "BlockLevel", level_rate, level.block_count());
    println!("{:>16} {:>14.0} {:>10}", "RingBuffer", ring_rate, "-");
    println!();
    println!("  State root:        {}", hex::encode(book_root));

    book.validate();
    level.validate();
    assert_eq!(book_root, level_root, "tombstone and compaction books diverged");
    assert_eq!(book_root, ring_root, "segmented books diverged from the ring");

    println!("\n=== STRESS TEST PASSED ===\n");
}

/// Verify determinism: the same seed produces the same state root, a
/// different seed does not.
#[test]
fn verify_determinism() {
    println!("\n=== DETERMINISM TEST ===\n");

    let root1 = run_churn(&mut BlockOrderBook::new(), 12_345).0;
    let root2 = run_churn(&mut BlockOrderBook::new(), 12_345).0;
    let root3 = run_churn(&mut BlockOrderBook::new(), 12_346).0;

    println!("  Run 1 state root: {}", hex::encode(root1));
    println!("  Run 2 state root: {}", hex::encode(root2));
    println!("  Different seed:   {}", hex::encode(root3));

    assert_eq!(root1, root2, "State roots must match for determinism");
    assert_ne!(root1, root3, "Different seeds should produce different roots");

    println!("\n=== DETERMINISM VERIFIED ===\n");
}

/// Emptying most of the book must hand blocks back.
#[test]
fn stress_block_reclamation() {
    println!("\n=== BLOCK RECLAMATION TEST ===\n");

    const ORDER_COUNT: u64 = 100_000;

    let mut book: BlockOrderBook = (1..=ORDER_COUNT)
        .map(|id| Order::new(id, id, 1, false))
        .collect();
    let peak_blocks = book.block_count();

    // Keep one order in every thousand.
    for id in 1..=ORDER_COUNT {
        if id % 1_000 != 0 {
            book.erase_by_id(id);
        }
    }
    let sparse_blocks = book.block_count();

    println!("  Peak blocks:       {:>10}", peak_blocks);
    println!("  Blocks afterwards: {:>10}", sparse_blocks);
    println!("  Live orders:       {:>10}", book.len());

    assert_eq!(book.len(), 100);
    assert!(sparse_blocks <= 100, "{} blocks left for 100 orders", sparse_blocks);
    book.validate();

    println!("\n=== BLOCK RECLAMATION PASSED ===\n");
}

/// Volume window queries at scale against the slow reference.
#[test]
fn stress_volume_windows() {
    println!("\n=== VOLUME WINDOW TEST ===\n");

    let orders = common::positive_orders(200_000, 1_000, 8);
    let book: BlockOrderBook = orders.iter().copied().collect();
    let level: BlockLevel = orders.iter().copied().collect();
    let total = book.total_volume();

    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let mut out = Vec::new();
    let start = Instant::now();
    for _ in 0..200 {
        let lower = rng.gen_range(1..=total);
        let upper = lower + rng.gen_range(0..50_000);
        let reference = common::reference_range(&orders, lower, upper);

        out.clear();
        book.copy_volume_range(lower, upper, &mut out);
        assert_eq!(common::ids(&out), reference);

        out.clear();
        level.copy_volume_range(lower, upper, &mut out);
        assert_eq!(common::ids(&out), reference);
    }

    println!("  200 windows checked in {:.2?}", start.elapsed());
    println!("\n=== VOLUME WINDOW TEST PASSED ===\n");
}
