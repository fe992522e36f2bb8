//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `gomarket_core` linkage and print the persisted cart of one
//!   database file.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `gomarket_cli [DB_PATH]` (falls back to `GOMARKET_DB_PATH`).

use gomarket_core::{CartProvider, CartStore, SqliteKeyValueStore};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("gomarket_core ping={}", gomarket_core::ping());
    println!("gomarket_core version={}", gomarket_core::core_version());

    let Some(db_path) = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GOMARKET_DB_PATH").ok())
    else {
        return ExitCode::SUCCESS;
    };

    let storage = match SqliteKeyValueStore::open(&db_path) {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("failed to open `{db_path}`: {err}");
            return ExitCode::FAILURE;
        }
    };
    let cart = CartProvider::new(CartStore::load(Arc::new(storage))).handle();
    let snapshot = cart.snapshot();

    for line in &snapshot.lines {
        println!(
            "line id={} quantity={} price={:.2} total={:.2}",
            line.id,
            line.quantity,
            line.price,
            line.line_total()
        );
    }
    println!(
        "cart lines={} quantity={} subtotal={:.2}",
        snapshot.lines.len(),
        snapshot.total_quantity(),
        snapshot.subtotal()
    );
    ExitCode::SUCCESS
}
