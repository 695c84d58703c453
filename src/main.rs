//! Block Order Book - Binary Entry Point
//!
//! Replays one deterministic order stream into all three containers and
//! prints their sizes, a volume window and the state roots, which must agree.
//!
//! Set `RUST_LOG=block_order_book=trace` to watch blocks being allocated and
//! freed.

use block_order_book::{BlockLevel, BlockOrderBook, Order, OrderQueue, RingBuffer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Orders pushed in the demo run
const ORDER_COUNT: u64 = 10_000;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "block_order_book=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(orders = ORDER_COUNT, "replaying order stream");

    let mut book = BlockOrderBook::with_block_capacity((ORDER_COUNT as usize) / 64 + 1);
    let mut level = BlockLevel::with_block_capacity((ORDER_COUNT as usize) / 64 + 1);
    let mut ring = RingBuffer::<Order>::with_capacity(ORDER_COUNT as usize);

    replay(&mut book);
    replay(&mut level);
    replay(&mut ring);

    println!("===========================================");
    println!("  Block Order Book - container comparison");
    println!("===========================================");
    println!();

    report("BlockOrderBook", &book);
    println!("  blocks: {}", book.block_count());
    report("BlockLevel", &level);
    println!("  blocks: {}  id index: {}", level.block_count(), level.is_index_active());
    report("RingBuffer", &ring);
    println!("  capacity: {}", ring.capacity());
    println!();

    let roots = [book.state_root(), level.state_root(), ring.state_root()];
    if roots.iter().all(|root| *root == roots[0]) {
        tracing::info!(root = %hex::encode(roots[0]), "containers agree");
    } else {
        tracing::error!("containers diverged");
        std::process::exit(1);
    }
}

/// Push, cancel and amend a fixed stream of orders
fn replay<Q: OrderQueue>(queue: &mut Q) {
    for id in 1..=ORDER_COUNT {
        let volume = ((id * 7_919) % 100) as i32 + 1;
        queue.push_back(Order::new(id, 1_000_000 + (id << 5), volume, id % 4 == 0));
    }
    // Cancel every third order, then amend every tenth survivor.
    for id in (3..=ORDER_COUNT).step_by(3) {
        queue.erase_by_id(id);
    }
    for id in (10..=ORDER_COUNT).step_by(10) {
        queue.update_volume(id, 1);
    }
    // Consume a few from the front as fills would.
    for _ in 0..100 {
        queue.pop_front();
    }
}

fn report<Q: OrderQueue>(name: &str, queue: &Q) {
    let mut window = Vec::new();
    let copied = queue.copy_volume_range(10_000, 12_000, &mut window);

    println!("{}:", name);
    println!("  orders: {}", queue.len());
    println!("  total volume: {}", queue.total_volume());
    println!(
        "  window [10000, 12000]: {} orders (ids {}..={})",
        copied,
        window.first().map_or(0, |o| o.id),
        window.last().map_or(0, |o| o.id)
    );
    println!("  state root: {}", hex::encode(queue.state_root()));
}
