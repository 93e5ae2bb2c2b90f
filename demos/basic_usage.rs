// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic message-cache usage example.
//!
//! Demonstrates:
//! 1. Building a SQLite-backed cache in a temporary directory
//! 2. Writing messages to two chats past the per-chat bound
//! 3. Reading them back (newest first)
//! 4. Full-text and sender search
//! 5. Running the expiry sweeper alongside
//! 6. Displaying captured metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! RUST_LOG=message_cache=debug cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use message_cache::{spawn_expiry_sweeper, MessageCache, MessageCacheConfig};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde::Serialize;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct ChatMessage<'a> {
    text: &'a str,
    sender_name: &'a str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().map_err(|_| "failed to install metrics recorder")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("message_cache=info")))
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           message-cache: Basic Usage Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure
    // ─────────────────────────────────────────────────────────────────────────
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("messages.db");
    let cache = Arc::new(MessageCache::new(MessageCacheConfig::sqlite(&db_path, 3, 300))?);
    cache.connect().await?;
    println!("📦 SQLite cache at {} (3 messages/chat, 300s TTL)\n", db_path.display());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_expiry_sweeper(cache.clone(), Duration::from_secs(30), shutdown_rx);

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Write
    // ─────────────────────────────────────────────────────────────────────────
    println!("✍️  Writing messages...");
    let lines = [
        ("ops", "1", "deploy scheduled for noon", "Ann"),
        ("ops", "2", "rollback plan attached", "Ben"),
        ("ops", "3", "deploy window confirmed", "Ann"),
        ("ops", "4", "all green after deploy", "Cara"),
        ("random", "1", "anyone up for lunch?", "Ben"),
    ];
    for (chat, id, text, sender) in lines {
        cache
            .add_message(chat, id, &ChatMessage { text, sender_name: sender })
            .await?;
        println!("   └─ {chat}/{id}: {text:?} ({sender})");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read back
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Chat 'ops' (newest first, oldest evicted):");
    for message in cache.get_messages("ops", None).await? {
        println!("   └─ {}", message["text"]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Search
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔎 search_messages(\"deploy\"):");
    for hit in cache.search_messages("deploy", None, None).await? {
        println!(
            "   └─ {}/{} rank={:.3} {}",
            hit.chat_id,
            hit.message_id,
            hit.rank.unwrap_or_default(),
            hit.payload["text"]
        );
    }

    println!("\n🔎 search_by_sender(\"Ben\"):");
    for hit in cache.search_by_sender("Ben", None, None).await? {
        println!("   └─ {}/{} {}", hit.chat_id, hit.message_id, hit.payload["text"]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Stats & metrics
    // ─────────────────────────────────────────────────────────────────────────
    let stats = cache.get_stats().await?;
    println!("\n📊 Stats:\n{}", serde_json::to_string_pretty(&stats)?);

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    shutdown_tx.send(true)?;
    sweeper.await?;
    cache.close().await?;
    println!("\n✅ Done\n");

    Ok(())
}

/// Print every captured metric, grouped by kind.
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<String> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            let name = if labels.is_empty() {
                key.name().to_string()
            } else {
                format!("{}{{{}}}", key.name(), labels.join(","))
            };

            match value {
                DebugValue::Counter(v) => format!("counter   {name} = {v}"),
                DebugValue::Gauge(v) => format!("gauge     {name} = {:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => {
                    let count = samples.len();
                    let sum: f64 = samples.iter().map(|s| s.into_inner()).sum();
                    let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                    format!("histogram {name} count={count} avg={avg:.6}")
                }
            }
        })
        .collect();

    lines.sort();
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {line}");
    }
}
