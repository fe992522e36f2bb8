//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the key-value contract services persist through.
//! - Isolate SQLite query details from service orchestration.

pub mod kv_repo;
