//! Cart domain model.
//!
//! # Responsibility
//! - Define the cart line record and its stored payload shape.
//!
//! # Invariants
//! - A collection holds at most one line per id, in insertion order.

pub mod cart_line;
