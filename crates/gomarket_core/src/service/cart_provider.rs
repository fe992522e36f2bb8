//! Scoped access to the cart store.
//!
//! # Responsibility
//! - Inject one `CartStore` into the dynamic extent of `CartProvider::scope`.
//! - Resolve the innermost provider for `use_cart` callers.
//!
//! # Invariants
//! - `use_cart` outside every scope on the current thread fails with
//!   `CartUsageError::MissingProvider`.
//! - Scopes nest; leaving a scope (normally or by unwinding) restores the
//!   enclosing provider.

use crate::model::cart_line::CartLine;
use crate::service::cart_store::{CartSnapshot, CartStore, Revision, SubscriptionId};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

thread_local! {
    static PROVIDER_STACK: RefCell<Vec<Arc<CartStore>>> = const { RefCell::new(Vec::new()) };
}

/// Misuse of the consumer interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartUsageError {
    MissingProvider,
}

impl Display for CartUsageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingProvider => write!(f, "use_cart must be used within a CartProvider"),
        }
    }
}

impl Error for CartUsageError {}

/// Owner of the app-wide cart store.
///
/// Created once at app start; no teardown is needed.
#[derive(Clone)]
pub struct CartProvider {
    store: Arc<CartStore>,
}

impl CartProvider {
    pub fn new(store: CartStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Runs `f` with this provider's store visible to `use_cart`.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        PROVIDER_STACK.with(|stack| stack.borrow_mut().push(Arc::clone(&self.store)));
        let _guard = ScopeGuard;
        f()
    }

    /// Direct handle for callers that hold the provider itself.
    pub fn handle(&self) -> CartHandle {
        CartHandle {
            store: Arc::clone(&self.store),
        }
    }
}

struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        PROVIDER_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Returns the cart of the innermost enclosing `CartProvider::scope`.
pub fn use_cart() -> Result<CartHandle, CartUsageError> {
    PROVIDER_STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|store| CartHandle {
                store: Arc::clone(store),
            })
            .ok_or(CartUsageError::MissingProvider)
    })
}

/// Consumer view of the cart: current snapshot plus the three mutators.
#[derive(Clone)]
pub struct CartHandle {
    store: Arc<CartStore>,
}

impl CartHandle {
    pub fn snapshot(&self) -> CartSnapshot {
        self.store.snapshot()
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.store.lines()
    }

    pub fn add_to_cart(&self, line: CartLine) -> Option<Revision> {
        self.store.add_to_cart(line)
    }

    pub fn increment(&self, id: &str) -> Option<Revision> {
        self.store.increment(id)
    }

    pub fn decrement(&self, id: &str) -> Option<Revision> {
        self.store.decrement(id)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&CartSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Returns whether both handles point at the same store.
    pub fn same_store(&self, other: &CartHandle) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}
