//! Cart store: authoritative in-process cart state mirrored to storage.
//!
//! # Responsibility
//! - Own the ordered cart line collection for one app session.
//! - Rewrite the persisted payload after every committed mutation.
//! - Notify subscribers with a fresh snapshot after each commit.
//!
//! # Invariants
//! - At most one line per id; `quantity >= 1`; insertion order is kept.
//! - Mutations are serialized: compute, commit and persist run under one
//!   lock, so concurrent callers never lose each other's updates.
//! - `revision` increases by exactly one per committed mutation.
//! - Mutators never return errors; storage failures are logged and dropped.
//! - Subscribers see snapshots in strictly increasing revision order, so the
//!   last snapshot a subscriber received is the current cart once delivery
//!   drains.

use crate::model::cart_line::{decode_cart_payload, encode_cart_payload, CartLine};
use crate::repo::kv_repo::KeyValueStore;
use log::{debug, info, warn};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Storage key holding the serialized cart collection.
pub const CART_STORAGE_KEY: &str = "@GoMarket:products";

/// Handle returned by `CartStore::subscribe`.
pub type SubscriptionId = u64;

/// Monotonic commit counter; `0` is the freshly loaded state.
pub type Revision = u64;

type Listener = Arc<dyn Fn(&CartSnapshot) + Send + Sync>;

/// Read-only copy of cart state at one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    pub revision: Revision,
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn subtotal(&self) -> f64 {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}

#[derive(Debug, Default)]
struct CartState {
    lines: Vec<CartLine>,
    revision: Revision,
}

// Committed snapshots awaiting delivery. Filled under the state lock, so
// `pending` is in revision order; one thread at a time drains it.
#[derive(Default)]
struct Delivery {
    pending: VecDeque<CartSnapshot>,
    draining: bool,
}

#[derive(Default)]
struct Listeners {
    next_id: SubscriptionId,
    entries: BTreeMap<SubscriptionId, Listener>,
}

/// Cart state container backed by a key-value store.
pub struct CartStore {
    storage: Arc<dyn KeyValueStore>,
    state: Mutex<CartState>,
    listeners: Mutex<Listeners>,
    delivery: Mutex<Delivery>,
}

impl CartStore {
    /// Creates the store and restores any persisted collection.
    ///
    /// An absent, unreadable or corrupt payload yields an empty cart; the
    /// failure is logged and nothing is written back until the first
    /// mutation.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let started_at = Instant::now();
        let lines = match storage.get(CART_STORAGE_KEY) {
            Ok(Some(raw)) => match decode_cart_payload(&raw) {
                Ok(lines) => {
                    info!(
                        "event=cart_load module=cart status=ok source=storage line_count={} duration_ms={}",
                        lines.len(),
                        started_at.elapsed().as_millis()
                    );
                    lines
                }
                Err(err) => {
                    warn!(
                        "event=cart_load module=cart status=error error_code=payload_invalid error={err}"
                    );
                    Vec::new()
                }
            },
            Ok(None) => {
                info!("event=cart_load module=cart status=ok source=empty line_count=0");
                Vec::new()
            }
            Err(err) => {
                warn!(
                    "event=cart_load module=cart status=error error_code=storage_read_failed error={err}"
                );
                Vec::new()
            }
        };

        Self {
            storage,
            state: Mutex::new(CartState { lines, revision: 0 }),
            listeners: Mutex::new(Listeners::default()),
            delivery: Mutex::new(Delivery::default()),
        }
    }

    /// Adds one unit of `line`.
    ///
    /// Existing id: quantity += 1, other fields keep their stored values.
    /// New id: appended with quantity 1 whatever quantity the caller set.
    /// Returns the committed revision, or `None` when `line` fails
    /// validation or the existing line is already at `u32::MAX`.
    pub fn add_to_cart(&self, line: CartLine) -> Option<Revision> {
        let line = CartLine { quantity: 1, ..line };
        if let Err(err) = line.validate() {
            warn!("event=cart_add module=cart status=error error_code=invalid_line error={err}");
            return None;
        }

        self.mutate("cart_add", |lines| {
            match lines.iter_mut().find(|item| item.id == line.id) {
                Some(existing) => bump(existing),
                None => {
                    lines.push(line);
                    true
                }
            }
        })
    }

    /// Adds one unit to an existing line; absent ids are a no-op.
    ///
    /// Returns the committed revision, `None` when nothing changed.
    pub fn increment(&self, id: &str) -> Option<Revision> {
        self.mutate("cart_increment", |lines| {
            lines
                .iter_mut()
                .find(|item| item.id == id)
                .is_some_and(bump)
        })
    }

    /// Removes one unit from an existing line, never going below 1.
    ///
    /// Returns the committed revision, `None` when nothing changed.
    pub fn decrement(&self, id: &str) -> Option<Revision> {
        self.mutate("cart_decrement", |lines| {
            match lines.iter_mut().find(|item| item.id == id) {
                Some(item) if item.quantity > 1 => {
                    item.quantity -= 1;
                    true
                }
                _ => false,
            }
        })
    }

    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.lock_state();
        CartSnapshot {
            revision: state.revision,
            lines: state.lines.clone(),
        }
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.lock_state().lines.clone()
    }

    pub fn get(&self, id: &str) -> Option<CartLine> {
        self.lock_state()
            .lines
            .iter()
            .find(|line| line.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_state().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().lines.is_empty()
    }

    pub fn revision(&self) -> Revision {
        self.lock_state().revision
    }

    pub fn total_quantity(&self) -> u64 {
        self.snapshot().total_quantity()
    }

    pub fn subtotal(&self) -> f64 {
        self.snapshot().subtotal()
    }

    /// Registers a listener called with the new snapshot after each commit.
    ///
    /// Listeners run after the state lock is released, so they may read and
    /// mutate the store. Snapshots arrive in revision order: when another
    /// thread is already delivering, a commit is queued and handed out by
    /// that thread, after the snapshots committed before it.
    pub fn subscribe(
        &self,
        listener: impl Fn(&CartSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut listeners = self.lock_listeners();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.insert(id, Arc::new(listener));
        id
    }

    /// Removes a listener; returns `false` for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock_listeners().entries.remove(&id).is_some()
    }

    fn mutate(
        &self,
        event: &'static str,
        apply: impl FnOnce(&mut Vec<CartLine>) -> bool,
    ) -> Option<Revision> {
        let (revision, should_drain) = {
            let mut state = self.lock_state();
            if !apply(&mut state.lines) {
                debug!("event={event} module=cart status=noop revision={}", state.revision);
                return None;
            }
            state.revision += 1;
            self.persist(event, &state);

            let mut delivery = self.lock_delivery();
            delivery.pending.push_back(CartSnapshot {
                revision: state.revision,
                lines: state.lines.clone(),
            });
            let should_drain = !delivery.draining;
            delivery.draining = true;
            (state.revision, should_drain)
        };

        if should_drain {
            self.drain_deliveries();
        }
        Some(revision)
    }

    fn persist(&self, event: &'static str, state: &CartState) {
        let started_at = Instant::now();
        let result = encode_cart_payload(&state.lines)
            .map_err(|err| err.to_string())
            .and_then(|payload| {
                self.storage
                    .set(CART_STORAGE_KEY, &payload)
                    .map_err(|err| err.to_string())
            });

        match result {
            Ok(()) => debug!(
                "event={event} module=cart status=ok revision={} line_count={} duration_ms={}",
                state.revision,
                state.lines.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={event} module=cart status=error error_code=persist_failed revision={} error={err}",
                state.revision
            ),
        }
    }

    fn drain_deliveries(&self) {
        let guard = DrainGuard { store: self };
        loop {
            let snapshot = {
                let mut delivery = self.lock_delivery();
                match delivery.pending.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        delivery.draining = false;
                        break;
                    }
                }
            };

            let listeners: Vec<Listener> =
                self.lock_listeners().entries.values().cloned().collect();
            for listener in listeners {
                listener(&snapshot);
            }
        }
        std::mem::forget(guard);
    }

    // State is only touched by whole-step mutations, so a poisoned lock
    // still guards a consistent collection.
    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, Delivery> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Hands the drain role back when a listener panics, so later commits still
// get delivered.
struct DrainGuard<'a> {
    store: &'a CartStore,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.store.lock_delivery().draining = false;
    }
}

fn bump(line: &mut CartLine) -> bool {
    match line.quantity.checked_add(1) {
        Some(next) => {
            line.quantity = next;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{CartStore, CART_STORAGE_KEY};
    use crate::model::cart_line::{encode_cart_payload, CartLine};
    use crate::repo::kv_repo::{KeyValueStore, KvError, KvResult, MemoryKeyValueStore};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingStore {
        writes: AtomicUsize,
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> KvResult<Option<String>> {
            Err(KvError::Poisoned)
        }

        fn set(&self, _key: &str, _value: &str) -> KvResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(KvError::Poisoned)
        }
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let storage = Arc::new(FailingStore {
            writes: AtomicUsize::new(0),
        });
        let store = CartStore::load(storage.clone());
        assert!(store.is_empty());

        assert_eq!(store.add_to_cart(CartLine::new("a", "A", "", 1.0)), Some(1));
        assert_eq!(store.increment("a"), Some(2));
        assert_eq!(store.get("a").unwrap().quantity, 2);
        assert_eq!(storage.writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_line_is_rejected_without_write() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let store = CartStore::load(storage.clone());

        assert_eq!(store.add_to_cart(CartLine::new("", "Nameless", "", 1.0)), None);
        assert!(store.is_empty());
        assert_eq!(store.revision(), 0);
        assert_eq!(storage.get(CART_STORAGE_KEY).unwrap(), None);
    }

    fn store_with_line_at_max() -> CartStore {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let mut line = CartLine::new("a", "A", "", 1.0);
        line.quantity = u32::MAX;
        storage
            .set(CART_STORAGE_KEY, &encode_cart_payload(&[line]).unwrap())
            .unwrap();
        CartStore::load(storage)
    }

    #[test]
    fn increment_stops_at_u32_max() {
        let store = store_with_line_at_max();
        assert_eq!(store.increment("a"), None);
        assert_eq!(store.get("a").unwrap().quantity, u32::MAX);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn add_existing_line_stops_at_u32_max() {
        let store = store_with_line_at_max();
        assert_eq!(store.add_to_cart(CartLine::new("a", "A", "", 1.0)), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().quantity, u32::MAX);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn listener_panic_releases_delivery() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let store = CartStore::load(storage);
        let panicking = store.subscribe(|snapshot| {
            if snapshot.revision == 1 {
                panic!("listener failed");
            }
        });

        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.add_to_cart(CartLine::new("a", "A", "", 1.0))
        }));
        assert!(first.is_err());
        store.unsubscribe(panicking);

        let seen = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&seen);
        store.subscribe(move |snapshot| {
            sink.store(snapshot.revision, Ordering::SeqCst);
        });
        assert_eq!(store.increment("a"), Some(2));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
