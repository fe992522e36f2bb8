//! Flutter bridge crate for GoMarket cart core.

pub mod api;
