//! An async Rust client for the MCASH chain.
//!
//! **mcash-kit** talks to the node's HTTP API: it builds and signs
//! transactions, calls and deploys smart contracts, and reads contract
//! events from an event server.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mcash_kit::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcash_kit::Error> {
//!     // Configure once
//!     let client = Mcash::builder("https://mainnet.mcash.network")
//!         .private_key("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
//!         .build()?;
//!
//!     // Query
//!     let balance = client.wallet().get_balance(None).await?;
//!     println!("Balance: {}", from_matoshi(balance));
//!
//!     // Build, sign and broadcast
//!     let result = client
//!         .wallet()
//!         .send_transaction("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE", 1_000_000, AccountOptions::default())
//!         .await?;
//!     println!("Broadcast: {}", result.result);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Design Principles
//!
//! 1. **Single entry point**: everything hangs off the [`Mcash`] client
//! 2. **Configure once**: nodes, event server and default account are set at build time
//! 3. **One async convention**: every network operation is an `async fn` returning `Result`
//! 4. **Options over overloads**: optional arguments live in `*Options` structs with defaults
//! 5. **Pluggable**: a [`Plugin`] can override any named operation
//!
//! # Core Types
//!
//! - [`Address`]: validated 21-byte account address (base58 or hex)
//! - [`Transaction`]: node transaction JSON with signatures
//! - [`PrivateKey`]: secp256k1 signing key
//!
//! # Smart Contracts
//!
//! ```rust,no_run
//! # use mcash_kit::*;
//! # use serde_json::json;
//! # async fn example(client: Mcash) -> Result<(), mcash_kit::Error> {
//! let mut token = client.contract(&json!([]), None)?;
//! token.at("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE").await?;
//! let supply = token.method("totalSupply", vec![])?.call(CallOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod client;
pub mod contract;
pub mod error;
pub mod types;
pub mod utils;
pub mod validator;

// Re-export commonly used types at crate root
pub use error::{Error, PermissionErrorKind, RpcError};
pub use types::*;

// Re-export contract types
pub use contract::{
    CallOptions, Contract, ContractEventOptions, DecodedInput, Method, MethodCall, SendOptions, SendOutcome,
    WatchHandle, WatchOptions,
};

// Re-export client types
pub use client::{
    AccountOptions, AccountPermissions, BlockId, Component, ConnectionStatus, CreateTokenOptions, CurrentProviders,
    DeployOptions, Direction, EventPoller, EventQuery, EventServer, FreezeOptions, HttpProvider, Mcash, McashBuilder,
    Override, Plugin, PluginReport, PollConfig, PrivateKey, Provider, ProviderFuture, ProviderRequest, Resource,
    RetryConfig, SignOptions, TransactionBuilder, TransferOptions, TriggerOptions, TriggerParam, UnfreezeOptions,
    UpdateTokenOptions, Wallet,
};
