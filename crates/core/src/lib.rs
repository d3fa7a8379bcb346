//! Shared domain types for the Shoptalk workspace.
//!
//! Everything in this crate is plain data: typed IDs, validated email
//! addresses, and the order status enum. There is no I/O here, which lets
//! the server and the CLI depend on it without dragging in a runtime.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
