//! Core use-case services.
//!
//! # Responsibility
//! - Own cart state and its persistence policy.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod cart_provider;
pub mod cart_store;
