//! Memoization Demo Application
//!
//! Walks through keyed calls, timeouts, group invalidation and stream replay.
//!
//! Usage:
//!   cargo run --example memoize_demo
//!
//! Set RUST_LOG=ouroboros_memo=debug to see every hit, miss and refresh.

use futures::stream;
use ouroboros_memo::{configure, CacheConfig, CallArgs, Memoizer, Signature, Value};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("=== Memoization Demo ===");

    let memo = Memoizer::new();

    info!("\n--- Keyed arguments ---");
    let price = memo.wrap(
        "price",
        &Signature::new(["sku", "request_id"]),
        configure([0], Vec::<String>::new(), None, Some("catalog")),
        |args: CallArgs| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let sku = args.arg(0).and_then(Value::as_str).unwrap_or_default().to_string();
            Ok::<_, anyhow::Error>(sku.len() as f64 * 9.99)
        },
    );

    for request_id in 0..3 {
        let started = std::time::Instant::now();
        let value = price
            .call(CallArgs::positional(["KB-104"]).with_arg(request_id))
            .await?;
        info!(
            "price(KB-104, request {}) = {:.2} in {:?}",
            request_id,
            value,
            started.elapsed()
        );
    }
    info!("Stats: {:?}", price.stats());

    info!("\n--- Timeouts ---");
    let quote = memo.wrap_sync(
        "quote",
        &Signature::empty(),
        CacheConfig::builder().timeout(Duration::from_millis(300)).build(),
        |_args: CallArgs| Ok::<_, anyhow::Error>(chrono::Utc::now()),
    );
    let first = quote.call(CallArgs::new()).await?;
    let cached = quote.call(CallArgs::new()).await?;
    info!("Within timeout, same value: {}", first == cached);
    tokio::time::sleep(Duration::from_millis(400)).await;
    let refreshed = quote.call(CallArgs::new()).await?;
    info!("After timeout, refreshed: {}", refreshed != first);

    info!("\n--- Group invalidation ---");
    let event = memo.invalidate_group(Some("catalog")).await;
    info!("Dropped {} entries ({})", event.removed, event.reason);
    price.call(CallArgs::positional(["KB-104"])).await?;
    info!("Stats after invalidation: {:?}", price.stats());

    info!("\n--- Stream replay ---");
    let feed = memo.wrap_stream(
        "feed",
        &Signature::new(["topic"]),
        CacheConfig::builder().key_position(0).build(),
        |args: CallArgs| {
            let topic = args.arg(0).and_then(Value::as_str).unwrap_or("all").to_string();
            info!("Producing feed for {}", topic);
            stream::iter((1..=3).map(move |n| format!("{} #{}", topic, n)))
        },
    );
    for pass in 1..=2 {
        let mut cursor = feed.call(CallArgs::positional(["rust"])).await?;
        let items = cursor.collect_all().await;
        info!("Pass {}: {:?}", pass, items);
    }

    info!("\n--- Store ---");
    info!("{}", memo.store().stats().await);

    info!("\n=== Demo Complete ===");

    Ok(())
}
