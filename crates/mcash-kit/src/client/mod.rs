//! Client module for talking to MCASH nodes.
//!
//! This module provides the client infrastructure:
//!
//! - [`Mcash`]: the main client and the single entry point for all operations
//! - [`McashBuilder`]: fluent builder for configuring the client
//! - [`Provider`]: the HTTP seam, with [`HttpProvider`] as the default
//!
//! # Components
//!
//! Operations are grouped the way the node groups them:
//!
//! | Component | Created with | Purpose |
//! |-----------|--------------|---------|
//! | [`Wallet`] | [`Mcash::wallet`] | Chain queries, signing and broadcasting |
//! | [`TransactionBuilder`] | [`Mcash::transaction_builder`] | Unsigned transactions |
//! | [`EventServer`] | [`Mcash::event`] | Contract event queries |
//!
//! # Plugins
//!
//! A [`Plugin`] can replace or add named operations on any [`Component`].
//! Registered overrides are consulted before the built-in behaviour.

mod broadcast;
mod event;
mod mcash;
mod plugin;
mod provider;
mod query;
mod signer;
mod transaction;

pub use broadcast::{AccountOptions, SignOptions};
pub use event::{EventPoller, EventQuery, EventServer, MAX_EVENT_PAGE_SIZE};
pub use mcash::{ConnectionStatus, CurrentProviders, Mcash, McashBuilder, PollConfig};
pub use plugin::{Component, Override, OverrideFn, Plugin, PluginReport};
pub use provider::{DEFAULT_TIMEOUT, HttpMethod, HttpProvider, Provider, ProviderFuture, ProviderRequest, RetryConfig};
pub use query::{BlockId, Direction, Wallet};
pub use signer::{
    ETH_MESSAGE_HEADER, GeneratedAccount, MCASH_MESSAGE_HEADER, PrivateKey, RecoverableSignature, sign_message,
    sign_transaction, verify_signature,
};
pub use transaction::{
    AccountPermissions, CreateTokenOptions, DEFAULT_FEE_LIMIT, DeployOptions, FreezeOptions, MAX_FEE_LIMIT,
    MAX_ORIGIN_ENERGY_LIMIT, Resource, TransactionBuilder, TransferOptions, TriggerOptions, TriggerParam,
    UnfreezeOptions, UpdateTokenOptions,
};
