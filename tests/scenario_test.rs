//! End-to-end scenarios run against every container through `OrderQueue`.

mod common;

use block_order_book::{BlockLevel, BlockOrderBook, Order, OrderQueue, RingBuffer};

use common::{ids, positive_orders, reference_range, uniform_orders, OrderGenerator};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn containers() -> (BlockOrderBook, BlockLevel, RingBuffer<Order>) {
    (BlockOrderBook::new(), BlockLevel::new(), RingBuffer::new())
}

fn fill<Q: OrderQueue>(queue: &mut Q, orders: &[Order]) {
    for order in orders {
        queue.push_back(*order);
    }
}

fn window<Q: OrderQueue>(queue: &Q, lower: i64, upper: i64) -> Vec<u64> {
    let mut out = Vec::new();
    queue.copy_volume_range(lower, upper, &mut out);
    ids(&out)
}

// ============================================================================
// VOLUME WINDOWS
// ============================================================================

fn volume_window_scenario<Q: OrderQueue>(mut queue: Q) {
    fill(&mut queue, &uniform_orders(200, 10));

    assert_eq!(window(&queue, 95, 105), vec![10, 11]);
    assert_eq!(window(&queue, 100, 100), vec![10]);
    assert_eq!(window(&queue, 1, 1), vec![1]);
    assert_eq!(window(&queue, 1_991, i64::MAX), vec![200]);
    assert!(window(&queue, 2_001, 3_000).is_empty());
    assert!(window(&queue, 500, 499).is_empty());
}

#[test]
fn scenario_volume_window() {
    let (book, level, ring) = containers();
    volume_window_scenario(book);
    volume_window_scenario(level);
    volume_window_scenario(ring);
}

fn windows_match_reference<Q: OrderQueue>(mut queue: Q) {
    let orders = positive_orders(1_000, 50, 11);
    fill(&mut queue, &orders);
    let total = queue.total_volume();

    for lower in (0..=total + 10).step_by(97) {
        for span in [0, 1, 25, 500, 5_000] {
            let upper = lower + span;
            assert_eq!(
                window(&queue, lower, upper),
                reference_range(&orders, lower, upper),
                "window [{}, {}]",
                lower,
                upper
            );
        }
    }
}

#[test]
fn scenario_windows_match_reference() {
    let (book, level, ring) = containers();
    windows_match_reference(book);
    windows_match_reference(level);
    windows_match_reference(ring);
}

fn tail_windows<Q: OrderQueue + Default>() {
    let cases: [(&[i32], i64, i64, &[u64]); 6] = [
        (&[10, 10, 0], 1, i64::MAX, &[1, 2, 3]),
        (&[10, -5, 5], 1, i64::MAX, &[1, 2, 3]),
        (&[10, 10, 0, 0], 15, 20, &[2, 3, 4]),
        (&[10, 0, 10], 1, 10, &[1, 2]),
        (&[10, 0, 0, 10], 10, 10, &[1, 2, 3]),
        (&[0, 10, 0], 1, 5, &[2]),
    ];

    for (volumes, lower, upper, expected) in cases {
        let orders: Vec<Order> = volumes
            .iter()
            .zip(1..)
            .map(|(&volume, id)| Order::new(id, id, volume, false))
            .collect();
        let mut queue = Q::default();
        fill(&mut queue, &orders);

        assert_eq!(window(&queue, lower, upper), expected, "{:?} [{}, {}]", volumes, lower, upper);
        assert_eq!(reference_range(&orders, lower, upper), expected);
    }
}

#[test]
fn scenario_windows_keep_zero_and_negative_tails() {
    tail_windows::<BlockOrderBook>();
    tail_windows::<BlockLevel>();
    tail_windows::<RingBuffer<Order>>();
}

#[test]
fn scenario_windows_skip_tombstones() {
    let orders = positive_orders(500, 20, 5);
    let mut book = BlockOrderBook::new();
    fill(&mut book, &orders);

    let mut survivors = Vec::new();
    for order in &orders {
        if order.id % 7 == 0 || (60..=70).contains(&order.id) {
            assert!(book.erase_by_id(order.id));
        } else {
            survivors.push(*order);
        }
    }
    book.validate();

    let total = book.total_volume();
    for lower in (1..=total).step_by(131) {
        let upper = lower + 400;
        assert_eq!(window(&book, lower, upper), reference_range(&survivors, lower, upper));
    }
}

// ============================================================================
// DEQUE BEHAVIOUR
// ============================================================================

fn push_pop_push<Q: OrderQueue>(mut queue: Q) {
    fill(&mut queue, &uniform_orders(100, 1));
    for _ in 0..50 {
        queue.pop_front();
    }
    for id in 101..=150 {
        queue.push_back(Order::new(id, id, 1, false));
    }

    assert_eq!(queue.len(), 100);
    assert_eq!(queue.front().map(|o| o.id), Some(51));
    assert_eq!(queue.back().map(|o| o.id), Some(150));
    assert_eq!(ids(&queue.snapshot()), (51..=150).collect::<Vec<_>>());
}

#[test]
fn scenario_push_pop_push() {
    let (book, level, ring) = containers();
    push_pop_push(book);
    push_pop_push(level);
    push_pop_push(ring);
}

fn drain_both_ends<Q: OrderQueue>(mut queue: Q) {
    fill(&mut queue, &uniform_orders(300, 2));

    let mut front = 1;
    let mut back = 300;
    while !queue.is_empty() {
        assert_eq!(queue.pop_front().map(|o| o.id), Some(front));
        front += 1;
        if let Some(order) = queue.pop_back() {
            assert_eq!(order.id, back);
            back -= 1;
        }
    }

    assert_eq!(queue.total_volume(), 0);
    assert!(queue.pop_front().is_none());
    assert!(queue.pop_back().is_none());
    assert!(queue.front().is_none());

    queue.push_front(Order::new(1, 0, 5, true));
    assert_eq!(queue.len(), 1);
}

#[test]
fn scenario_drain_both_ends() {
    let (book, level, ring) = containers();
    drain_both_ends(book);
    drain_both_ends(level);
    drain_both_ends(ring);
}

fn erase_is_idempotent<Q: OrderQueue>(mut queue: Q) {
    fill(&mut queue, &uniform_orders(150, 3));

    assert!(queue.erase_by_id(77));
    let len = queue.len();
    let volume = queue.total_volume();
    let root = queue.state_root();

    assert!(!queue.erase_by_id(77));
    assert!(!queue.erase_by_id(10_000));
    assert!(!queue.update_volume(77, 1));

    assert_eq!(queue.len(), len);
    assert_eq!(queue.total_volume(), volume);
    assert_eq!(queue.state_root(), root);
}

#[test]
fn scenario_erase_is_idempotent() {
    let (book, level, ring) = containers();
    erase_is_idempotent(book);
    erase_is_idempotent(level);
    erase_is_idempotent(ring);
}

fn signed_volume_bookkeeping<Q: OrderQueue>(mut queue: Q) {
    let orders = OrderGenerator::new(3).generate(1_500);
    fill(&mut queue, &orders);

    for order in orders.iter().step_by(4) {
        assert!(queue.erase_by_id(order.id));
    }
    for order in orders.iter().skip(2).step_by(8) {
        assert!(queue.update_volume(order.id, -order.volume));
    }

    let expected: i64 = queue.snapshot().iter().map(Order::signed_volume).sum();
    assert_eq!(queue.total_volume(), expected);
}

#[test]
fn scenario_signed_volume_bookkeeping() {
    let (book, level, ring) = containers();
    signed_volume_bookkeeping(book);
    signed_volume_bookkeeping(level);
    signed_volume_bookkeeping(ring);
}

// ============================================================================
// CONTAINER-SPECIFIC BEHAVIOUR
// ============================================================================

#[test]
fn scenario_level_index_lifecycle() {
    let mut level = BlockLevel::new();

    for id in 1..=64 {
        level.push_back(Order::new(id, id, 1, false));
    }
    assert_eq!(level.block_count(), 1);
    assert!(!level.is_index_active());

    level.push_back(Order::new(65, 65, 1, false));
    assert_eq!(level.block_count(), 2);
    assert!(level.is_index_active());
    assert!(level.contains_id(3));
    assert!(level.contains_id(65));

    assert!(level.erase_by_id(65));
    assert_eq!(level.block_count(), 1);
    assert!(!level.is_index_active());
    assert!(level.contains_id(3));
    assert!(!level.contains_id(65));
    level.validate();
}

#[test]
fn scenario_book_reinserts_erased_ids() {
    let mut book: BlockOrderBook = uniform_orders(100, 1).into_iter().collect();

    assert!(book.erase_by_id(10));
    book.push_back(Order::new(10, 500, 77, true));
    assert_eq!(book.find(10), book.prev(book.end()));
    assert_eq!(book.get_by_id(10).map(|o| o.volume), Some(77));

    assert!(book.erase_by_id(20));
    book.push_front(Order::new(20, 501, 55, false));
    assert_eq!(book.find(20), book.begin());
    assert_eq!(book.get_by_id(20).map(|o| o.volume), Some(55));

    // The front slot freed here is the one the next push_front reuses.
    assert!(book.erase_by_id(20));
    book.push_front(Order::new(20, 502, 5, false));
    assert_eq!(book.find(20), book.begin());
    assert_eq!(book.get(book.find(20)).map(|o| o.timestamp), Some(502));

    assert_eq!(book.len(), 100);
    assert_eq!(book.total_volume(), 98 + 77 + 5);
    assert!(book.erase_by_id(10));
    assert!(!book.contains_id(10));
    book.validate();
}

#[test]
fn scenario_level_reinserts_erased_ids_across_index_activation() {
    let mut level: BlockLevel = uniform_orders(64, 1).into_iter().collect();
    assert!(!level.is_index_active());

    assert!(level.erase_by_id(10));
    level.push_back(Order::new(10, 500, 77, true));
    assert_eq!(level.find(10), level.prev(level.end()));
    assert_eq!(level.get_by_id(10).map(|o| o.volume), Some(77));

    assert!(level.erase_by_id(20));
    level.push_front(Order::new(20, 501, 55, false));
    assert_eq!(level.find(20), level.begin());
    assert_eq!(level.block_count(), 1);
    assert!(!level.is_index_active());

    level.push_back(Order::new(65, 65, 1, false));
    assert!(level.is_index_active());
    assert_eq!(level.get_by_id(10).map(|o| o.volume), Some(77));
    assert_eq!(level.get_by_id(20).map(|o| o.volume), Some(55));

    assert!(level.erase_by_id(30));
    level.push_front(Order::new(30, 502, 33, false));
    assert_eq!(level.find(30), level.begin());
    assert_eq!(level.get_by_id(30).map(|o| o.volume), Some(33));

    assert!(level.erase_by_id(65));
    level.push_back(Order::new(65, 503, 44, false));
    assert_eq!(level.find(65), level.prev(level.end()));
    assert_eq!(level.get_by_id(65).map(|o| o.volume), Some(44));

    assert_eq!(level.len(), 65);
    let expected: i64 = level.snapshot().iter().map(Order::signed_volume).sum();
    assert_eq!(level.total_volume(), expected);
    level.validate();
}

#[test]
fn scenario_book_remove_middle_with_replenish() {
    let mut book: BlockOrderBook = uniform_orders(5_000, 1).into_iter().collect();
    let mut next_id = 5_001;

    for round in 0..20_000u64 {
        let victim = 1 + (round * 7_919) % (next_id - 1);
        if book.erase_by_id(victim) {
            book.push_back(Order::new(next_id, next_id, 1, false));
            next_id += 1;
        }
    }

    assert_eq!(book.len(), 5_000);
    assert_eq!(book.total_volume(), 5_000);
    book.validate();
}

#[test]
fn scenario_deep_copy_and_take() {
    let orders = OrderGenerator::new(21).generate(700);

    let mut book: BlockOrderBook = orders.iter().copied().collect();
    let mut level: BlockLevel = orders.iter().copied().collect();
    book.erase_by_id(orders[10].id);
    level.erase_by_id(orders[10].id);

    let book_copy = book.clone();
    let level_copy = level.clone();
    book.pop_front();
    level.pop_back();

    assert_eq!(book_copy.len(), 699);
    assert_eq!(level_copy.len(), 699);
    assert_eq!(book_copy.state_root(), level_copy.state_root());

    let moved = std::mem::take(&mut book);
    assert_eq!(moved.len(), 698);
    assert!(book.is_empty());
    book.validate();
}
