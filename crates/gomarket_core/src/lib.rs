//! Core cart logic for the GoMarket app.
//! This crate is the single source of truth for cart invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{DbError, DbLocation};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::cart_line::{
    decode_cart_payload, encode_cart_payload, CartLine, CartLineId, CartLineValidationError,
    CartPayloadError,
};
pub use repo::kv_repo::{
    KeyValueStore, KvError, KvResult, MemoryKeyValueStore, SqliteKeyValueStore,
};
pub use service::cart_provider::{use_cart, CartHandle, CartProvider, CartUsageError};
pub use service::cart_store::{
    CartSnapshot, CartStore, Revision, SubscriptionId, CART_STORAGE_KEY,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
