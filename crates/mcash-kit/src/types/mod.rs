//! Core types for the MCASH chain.
//!
//! Addresses and amounts are validated value types; transactions and
//! receipts mirror the node's JSON and keep unknown fields.

pub mod address;
mod event;
mod permission;
mod transaction;
mod units;

pub use address::Address;
pub use event::EventRecord;
pub use permission::{ApprovedList, Permission, PermissionKey, SignWeight};
pub use transaction::{
    BroadcastResult, ReturnStatus, Transaction, TransactionInfo, TriggerResponse,
};
pub use units::{MATOSHI_PER_MCASH, from_matoshi, to_matoshi};
