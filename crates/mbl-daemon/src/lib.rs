//! mbl-daemon library target.
//!
//! Exposes the chat command handler for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod handler;
