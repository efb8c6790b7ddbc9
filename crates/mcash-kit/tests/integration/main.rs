//! Integration tests for mcash-kit.
//!
//! These tests drive the public API against `MemoryNode`, an in-process
//! provider that plays the full node, the solidity node and the event
//! server.
//!
//! Run with: `cargo test --test integration`

mod common;
mod contract_integration;
mod event_integration;
mod plugin_integration;
mod wallet_integration;
