//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the cart provider and its mutators to Dart via FRB.
//! - Keep error semantics simple: envelopes with `ok` + `message`.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Cart calls before `cart_init` fail with the missing-provider usage error.
//! - The cart provider is created at most once per process.

use gomarket_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    use_cart, CartHandle, CartLine, CartProvider, CartSnapshot, CartStore, CartUsageError,
    Revision, SqliteKeyValueStore,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

const CART_DB_FILE_NAME: &str = "gomarket_cart.sqlite3";
const CART_DB_PATH_ENV: &str = "GOMARKET_DB_PATH";

static CART_PROVIDER: OnceLock<(PathBuf, CartProvider)> = OnceLock::new();
static CART_INIT_LOCK: Mutex<()> = Mutex::new(());

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Product fields supplied by catalog views when adding to cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItemInput {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub price: f64,
}

/// One cart line as rendered by cart views.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLineItem {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub price: f64,
    pub quantity: u32,
    /// `price * quantity`.
    pub line_total: f64,
}

/// Read-only cart state envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshotResponse {
    pub ok: bool,
    pub items: Vec<CartLineItem>,
    pub revision: u64,
    pub total_quantity: u64,
    pub subtotal: f64,
    /// Human-readable message for diagnostics.
    pub message: String,
}

/// Mutation result envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartActionResponse {
    /// `false` only when the cart is unavailable.
    pub ok: bool,
    /// Whether the cart collection changed.
    pub changed: bool,
    /// Revision committed by this call; the current revision when nothing
    /// changed.
    pub revision: u64,
    pub message: String,
}

/// Creates the process-wide cart provider and loads the persisted cart.
///
/// Path resolution: `db_path` argument, then `GOMARKET_DB_PATH`, then a
/// file in the system temp directory.
///
/// # FFI contract
/// - Sync call; opens SQLite and reads one key.
/// - Idempotent for the same path; a different path after init is rejected.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn cart_init(db_path: Option<String>) -> String {
    let requested = resolve_cart_db_path(db_path);
    let _init = CART_INIT_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some((active_path, _)) = CART_PROVIDER.get() {
        if *active_path == requested {
            return String::new();
        }
        return format!(
            "cart already initialized at `{}`; refusing to switch to `{}`",
            active_path.display(),
            requested.display()
        );
    }

    let storage = match SqliteKeyValueStore::open(&requested) {
        Ok(storage) => storage,
        Err(err) => {
            warn!("event=cart_init module=ffi status=error error_code=storage_open_failed error={err}");
            return format!("cart_init failed: {err}");
        }
    };
    let provider = CartProvider::new(CartStore::load(Arc::new(storage)));
    info!(
        "event=cart_init module=ffi status=ok line_count={}",
        provider.handle().lines().len()
    );

    if CART_PROVIDER.set((requested, provider)).is_err() {
        return "cart_init failed: provider already set".to_string();
    }
    String::new()
}

/// Returns the current cart state.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Never panics; `ok=false` before `cart_init`.
#[flutter_rust_bridge::frb(sync)]
pub fn cart_snapshot() -> CartSnapshotResponse {
    match with_cart(|cart| cart.snapshot()) {
        Ok(snapshot) => to_snapshot_response(snapshot),
        Err(err) => CartSnapshotResponse {
            ok: false,
            items: Vec::new(),
            revision: 0,
            total_quantity: 0,
            subtotal: 0.0,
            message: format!("cart_snapshot failed: {err}"),
        },
    }
}

/// Adds one unit of the given product.
///
/// # FFI contract
/// - Sync call; writes the full cart to storage when it changes.
/// - Invalid input is reported as `changed=false`.
#[flutter_rust_bridge::frb(sync)]
pub fn cart_add(item: CartItemInput) -> CartActionResponse {
    let line = CartLine::new(item.id.trim(), item.title, item.image_url, item.price);
    run_action("cart_add", move |cart| cart.add_to_cart(line))
}

/// Adds one unit to an existing line; unknown ids are a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn cart_increment(id: String) -> CartActionResponse {
    run_action("cart_increment", |cart| cart.increment(id.trim()))
}

/// Removes one unit from an existing line, keeping at least one.
#[flutter_rust_bridge::frb(sync)]
pub fn cart_decrement(id: String) -> CartActionResponse {
    run_action("cart_decrement", |cart| cart.decrement(id.trim()))
}

fn run_action(
    action: &'static str,
    f: impl FnOnce(&CartHandle) -> Option<Revision>,
) -> CartActionResponse {
    match with_cart(|cart| match f(cart) {
        Some(committed) => (true, committed),
        None => (false, cart.snapshot().revision),
    }) {
        Ok((changed, revision)) => CartActionResponse {
            ok: true,
            changed,
            revision,
            message: if changed {
                "Cart updated.".to_string()
            } else {
                "No change.".to_string()
            },
        },
        Err(err) => CartActionResponse {
            ok: false,
            changed: false,
            revision: 0,
            message: format!("{action} failed: {err}"),
        },
    }
}

fn with_cart<T>(f: impl FnOnce(&CartHandle) -> T) -> Result<T, CartUsageError> {
    let run = || use_cart().map(|cart| f(&cart));
    match CART_PROVIDER.get() {
        Some((_, provider)) => provider.scope(run),
        None => run(),
    }
}

fn resolve_cart_db_path(explicit: Option<String>) -> PathBuf {
    explicit
        .into_iter()
        .chain(std::env::var(CART_DB_PATH_ENV).ok())
        .map(|raw| raw.trim().to_string())
        .find(|candidate| !candidate.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(CART_DB_FILE_NAME))
}

fn to_snapshot_response(snapshot: CartSnapshot) -> CartSnapshotResponse {
    let total_quantity = snapshot.total_quantity();
    let subtotal = snapshot.subtotal();
    let items = snapshot
        .lines
        .into_iter()
        .map(|line| CartLineItem {
            line_total: line.line_total(),
            id: line.id,
            title: line.title,
            image_url: line.image_url,
            price: line.price,
            quantity: line.quantity,
        })
        .collect::<Vec<_>>();
    let message = if items.is_empty() {
        "Cart is empty.".to_string()
    } else {
        format!("{} line(s) in cart.", items.len())
    };
    CartSnapshotResponse {
        ok: true,
        items,
        revision: snapshot.revision,
        total_quantity,
        subtotal,
        message,
    }
}
