//! Chain queries.
//!
//! [`Wallet`] groups the read operations of the full and solidity nodes.
//! Signing and broadcasting live on the same type (see `broadcast.rs`).
//! Queries that return raw JSON can be replaced by a plugin registered for
//! [`Component::Wallet`] under the method name.

use std::fmt;
use std::str::FromStr;

use futures::future::try_join;
use serde_json::{Map, Value, json};

use crate::error::Error;
use crate::types::address::{is_address, to_hex};
use crate::types::{Transaction, TransactionInfo};
use crate::utils::to_utf8;

use super::mcash::Mcash;
use super::plugin::Component;
use super::provider::ProviderRequest;

/// Block selector for [`Wallet::get_block`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockId {
    Latest,
    Earliest,
    Number(u64),
    Hash(String),
}

impl From<u64> for BlockId {
    fn from(number: u64) -> Self {
        BlockId::Number(number)
    }
}

impl FromStr for BlockId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(BlockId::Latest),
            "earliest" => Ok(BlockId::Earliest),
            _ => match s.parse::<u64>() {
                Ok(number) => Ok(BlockId::Number(number)),
                Err(_) if crate::utils::is_hex(s) => Ok(BlockId::Hash(s.to_string())),
                Err(_) => Err(Error::validation("Invalid block ID provided")),
            },
        }
    }
}

/// Which side of a transfer to list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    To,
    From,
    All,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::To => "to",
            Direction::From => "from",
            Direction::All => "all",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to" => Ok(Direction::To),
            "from" => Ok(Direction::From),
            "all" => Ok(Direction::All),
            _ => Err(Error::validation(
                "Invalid direction provided: Expected \"to\", \"from\" or \"all\"",
            )),
        }
    }
}

/// Queries, signing and broadcasting against the configured nodes.
///
/// # Example
///
/// ```rust,no_run
/// # use mcash_kit::*;
/// # async fn example() -> Result<(), mcash_kit::Error> {
/// let mcash = Mcash::full_host("https://api.mcash.network").build()?;
/// let wallet = mcash.wallet();
///
/// let block = wallet.get_current_block().await?;
/// let balance = wallet.get_balance(Some("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE")).await?;
/// let recent = wallet
///     .get_transactions_related(Some("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE"), Direction::All, 30, 0)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Wallet {
    pub(crate) client: Mcash,
}

impl Wallet {
    pub(crate) fn new(client: Mcash) -> Self {
        Self { client }
    }

    /// Hex form of `address` or of the default address.
    pub(crate) fn resolve_address(&self, address: Option<&str>) -> Result<String, Error> {
        match self.client.address_or_default(address) {
            Value::String(address) if is_address(&address) => to_hex(&address),
            _ => Err(Error::validation("Invalid address provided")),
        }
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    pub async fn get_current_block(&self) -> Result<Value, Error> {
        self.client
            .dispatch(Component::Wallet, "get_current_block", vec![], async {
                self.client.full_get("wallet/getnowblock").await
            })
            .await
    }

    pub async fn get_confirmed_current_block(&self) -> Result<Value, Error> {
        self.client
            .dispatch(Component::Wallet, "get_confirmed_current_block", vec![], async {
                self.client.solidity_get("walletsolidity/getnowblock").await
            })
            .await
    }

    pub async fn get_block(&self, block: BlockId) -> Result<Value, Error> {
        match block {
            BlockId::Latest => self.get_current_block().await,
            BlockId::Earliest => self.get_block_by_number(0).await,
            BlockId::Number(number) => self.get_block_by_number(number).await,
            BlockId::Hash(hash) => self.get_block_by_hash(&hash).await,
        }
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Result<Value, Error> {
        let block = self
            .client
            .full_post("wallet/getblockbyid", json!({ "value": hash }))
            .await?;
        non_empty(block, "Block not found")
    }

    pub async fn get_block_by_number(&self, number: u64) -> Result<Value, Error> {
        let block = self
            .client
            .full_post("wallet/getblockbynum", json!({ "num": number }))
            .await?;
        non_empty(block, "Block not found")
    }

    pub async fn get_block_transaction_count(&self, block: BlockId) -> Result<usize, Error> {
        let block = self.get_block(block).await?;
        Ok(block
            .get("transactions")
            .and_then(Value::as_array)
            .map_or(0, Vec::len))
    }

    pub async fn get_transaction_from_block(&self, block: BlockId, index: usize) -> Result<Value, Error> {
        let block = self.get_block(block).await?;
        block
            .get("transactions")
            .and_then(Value::as_array)
            .and_then(|transactions| transactions.get(index))
            .cloned()
            .ok_or_else(|| Error::Remote("Transaction not found in block".into()))
    }

    /// Blocks `start..=end`.
    pub async fn get_block_range(&self, start: u64, end: u64) -> Result<Vec<Value>, Error> {
        if end <= start {
            return Err(Error::validation("Invalid end of range provided"));
        }
        let response = self
            .client
            .full_post(
                "wallet/getblockbylimitnext",
                json!({ "start_num": start, "end_num": end + 1 }),
            )
            .await?;
        Ok(array_field(&response, "block"))
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    pub async fn get_transaction(&self, id: &str) -> Result<Transaction, Error> {
        let transaction = self
            .client
            .full_post("wallet/gettransactionbyid", json!({ "value": id }))
            .await?;
        serde_json::from_value(non_empty(transaction, "Transaction not found")?)
            .map_err(|e| Error::Remote(e.to_string()))
    }

    pub async fn get_confirmed_transaction(&self, id: &str) -> Result<Transaction, Error> {
        let transaction = self
            .client
            .solidity_post("walletsolidity/gettransactionbyid", json!({ "value": id }))
            .await?;
        serde_json::from_value(non_empty(transaction, "Transaction not found")?)
            .map_err(|e| Error::Remote(e.to_string()))
    }

    /// Execution receipt from the solidity node. Empty until confirmed.
    pub async fn get_transaction_info(&self, id: &str) -> Result<TransactionInfo, Error> {
        let info = self
            .client
            .solidity_post("walletsolidity/gettransactioninfobyid", json!({ "value": id }))
            .await?;
        if is_empty(&info) {
            return Ok(TransactionInfo::default());
        }
        serde_json::from_value(info).map_err(|e| Error::Remote(e.to_string()))
    }

    /// Transactions sent to and/or from an address.
    ///
    /// [`Direction::All`] queries both sides concurrently, tags each entry
    /// with a `direction` field and sorts the union newest first.
    pub async fn get_transactions_related(
        &self,
        address: Option<&str>,
        direction: Direction,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Value>, Error> {
        let address = self.resolve_address(address)?;
        if offset > 0 && limit < 1 {
            return Err(Error::validation("Invalid limit provided"));
        }

        if direction != Direction::All {
            return self.related(&address, direction, limit, offset).await;
        }

        let (from, to) = try_join(
            self.related(&address, Direction::From, limit, offset),
            self.related(&address, Direction::To, limit, offset),
        )
        .await?;

        let tag = |direction: Direction| {
            move |mut tx: Value| {
                if let Some(object) = tx.as_object_mut() {
                    object.insert("direction".into(), Value::from(direction.as_str()));
                }
                tx
            }
        };
        let mut merged: Vec<Value> = from
            .into_iter()
            .map(tag(Direction::From))
            .chain(to.into_iter().map(tag(Direction::To)))
            .collect();
        merged.sort_by(|a, b| timestamp(b).cmp(&timestamp(a)));
        Ok(merged)
    }

    async fn related(
        &self,
        address: &str,
        direction: Direction,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Value>, Error> {
        let path = format!("walletextension/gettransactions{direction}this");
        let response = self
            .client
            .solidity_post(
                &path,
                json!({ "account": { "address": address }, "offset": offset, "limit": limit }),
            )
            .await?;
        Ok(array_field(&response, "transaction"))
    }

    pub async fn get_transactions_to_address(&self, address: &str, limit: u64, offset: u64) -> Result<Vec<Value>, Error> {
        self.get_transactions_related(Some(address), Direction::To, limit, offset)
            .await
    }

    pub async fn get_transactions_from_address(&self, address: &str, limit: u64, offset: u64) -> Result<Vec<Value>, Error> {
        self.get_transactions_related(Some(address), Direction::From, limit, offset)
            .await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Account of `address`, or of the default address.
    pub async fn get_account(&self, address: Option<&str>) -> Result<Value, Error> {
        let address = self.resolve_address(address)?;
        self.client
            .dispatch(Component::Wallet, "get_account", vec![json!(address)], async {
                self.client
                    .full_post("wallet/getaccount", json!({ "address": address }))
                    .await
            })
            .await
    }

    /// Balance in matoshi. Unknown accounts have a balance of zero.
    pub async fn get_balance(&self, address: Option<&str>) -> Result<u64, Error> {
        let account = self.get_account(address).await?;
        Ok(account.get("balance").and_then(Value::as_u64).unwrap_or(0))
    }

    pub async fn get_unconfirmed_account(&self, address: Option<&str>) -> Result<Value, Error> {
        let address = self.resolve_address(address)?;
        self.client
            .dispatch(Component::Wallet, "get_unconfirmed_account", vec![json!(address)], async {
                self.client
                    .full_post("wallet/getaccount", json!({ "address": address }))
                    .await
            })
            .await
    }

    pub async fn get_unconfirmed_balance(&self, address: Option<&str>) -> Result<u64, Error> {
        let account = self.get_unconfirmed_account(address).await?;
        Ok(account.get("balance").and_then(Value::as_u64).unwrap_or(0))
    }

    /// Remaining free plus staked bandwidth.
    pub async fn get_bandwidth(&self, address: Option<&str>) -> Result<i64, Error> {
        let address = self.resolve_address(address)?;
        let net = self
            .client
            .full_post("wallet/getaccountnet", json!({ "address": address }))
            .await?;
        let field = |key: &str| net.get(key).and_then(Value::as_i64).unwrap_or(0);
        Ok((field("free_bandwidth_limit") - field("free_bandwidth_used"))
            + (field("bandwidth_limit") - field("bandwidth_used")))
    }

    pub async fn get_account_resources(&self, address: Option<&str>) -> Result<Value, Error> {
        let address = self.resolve_address(address)?;
        self.client
            .full_post("wallet/getaccountresource", json!({ "address": address }))
            .await
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Tokens issued by an account, keyed by decoded name.
    pub async fn get_tokens_issued_by_address(&self, address: Option<&str>) -> Result<Map<String, Value>, Error> {
        let address = self.resolve_address(address)?;
        let response = self
            .client
            .full_post("wallet/getassetissuebyaccount", json!({ "address": address }))
            .await?;
        let mut tokens = Map::new();
        for token in array_field(&response, "asset_issue") {
            let token = parse_token(token);
            let name = token
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            tokens.insert(name, token);
        }
        Ok(tokens)
    }

    pub async fn get_token_from_id(&self, token_id: u64) -> Result<Value, Error> {
        let token = self
            .client
            .full_post("wallet/getassetissuebyid", json!({ "value": token_id }))
            .await?;
        if token.get("name").is_none_or(Value::is_null) {
            return Err(Error::Remote("Token does not exist".into()));
        }
        Ok(parse_token(token))
    }

    /// All tokens when `limit` is 0, otherwise one page.
    pub async fn list_tokens(&self, limit: u64, offset: u64) -> Result<Vec<Value>, Error> {
        if offset > 0 && limit < 1 {
            return Err(Error::validation("Invalid limit provided"));
        }
        let response = if limit == 0 {
            self.client.full_get("wallet/getassetissuelist").await?
        } else {
            self.client
                .full_post(
                    "wallet/getpaginatedassetissuelist",
                    json!({ "offset": offset, "limit": limit }),
                )
                .await?
        };
        Ok(array_field(&response, "assetIssue")
            .into_iter()
            .map(parse_token)
            .collect())
    }

    // ========================================================================
    // Network
    // ========================================================================

    /// Peers as `host:port`.
    pub async fn list_nodes(&self) -> Result<Vec<String>, Error> {
        let response = self.client.full_get("wallet/listnodes").await?;
        Ok(array_field(&response, "nodes")
            .iter()
            .map(|node| {
                let address = &node["address"];
                let host = address["host"].as_str().unwrap_or_default();
                let host = to_utf8(host).unwrap_or_else(|_| host.to_string());
                format!("{host}:{}", address["port"])
            })
            .collect())
    }

    pub async fn list_super_representatives(&self) -> Result<Vec<Value>, Error> {
        let response = self.client.full_get("wallet/listwitnesses").await?;
        Ok(array_field(&response, "witnesses"))
    }

    /// Seconds until the next maintenance period.
    pub async fn time_until_next_vote_cycle(&self) -> Result<i64, Error> {
        let response = self.client.full_get("wallet/getnextmaintenancetime").await?;
        match response.get("num").and_then(Value::as_i64) {
            Some(num) if num != -1 => Ok(num.div_euclid(1000)),
            _ => Err(Error::Remote(
                "Failed to get time until next vote cycle".into(),
            )),
        }
    }

    pub async fn get_chain_parameters(&self) -> Result<Vec<Value>, Error> {
        let response = self
            .client
            .full_post("wallet/getchainparameters", json!({}))
            .await?;
        Ok(array_field(&response, "chain_parameter"))
    }

    pub async fn get_node_info(&self) -> Result<Value, Error> {
        self.client
            .dispatch(Component::Wallet, "get_node_info", vec![], async {
                self.client.full_post("wallet/getnodeinfo", json!({})).await
            })
            .await
    }

    // ========================================================================
    // Contracts
    // ========================================================================

    /// Contract metadata. Results are cached per address.
    pub async fn get_contract(&self, address: &str) -> Result<Value, Error> {
        if !is_address(address) {
            return Err(Error::validation("Invalid contract address provided"));
        }
        let address = to_hex(address)?;
        if let Some(contract) = self.client.cached_contract(&address) {
            return Ok(contract);
        }

        let provider = self.client.full_node();
        let contract = provider
            .request(ProviderRequest::get("wallet/getcontract").query("value", &address))
            .await?;
        if contract.get("Error").is_some() || is_empty(&contract) {
            return Err(Error::Remote("Contract does not exist".into()));
        }
        self.client.cache_contract(&address, contract.clone());
        Ok(contract)
    }

    // ========================================================================
    // Proposals and exchanges
    // ========================================================================

    pub async fn get_proposal(&self, proposal_id: u64) -> Result<Value, Error> {
        self.client
            .full_post("wallet/getproposalbyid", json!({ "id": proposal_id }))
            .await
    }

    pub async fn list_proposals(&self) -> Result<Vec<Value>, Error> {
        let response = self.client.full_post("wallet/listproposals", json!({})).await?;
        Ok(array_field(&response, "proposals"))
    }

    pub async fn get_exchange_by_id(&self, exchange_id: u64) -> Result<Value, Error> {
        self.client
            .full_post("wallet/getexchangebyid", json!({ "id": exchange_id }))
            .await
    }

    pub async fn list_exchanges(&self) -> Result<Vec<Value>, Error> {
        let response = self.client.full_post("wallet/listexchanges", json!({})).await?;
        Ok(array_field(&response, "exchanges"))
    }

    pub async fn list_exchanges_paginated(&self, limit: u64, offset: u64) -> Result<Vec<Value>, Error> {
        let response = self
            .client
            .full_post(
                "wallet/listexchangespaginated",
                json!({ "limit": limit, "offset": offset }),
            )
            .await?;
        Ok(array_field(&response, "exchanges"))
    }
}

// ============================================================================
// Response helpers
// ============================================================================

pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn non_empty(value: Value, message: &str) -> Result<Value, Error> {
    if is_empty(&value) {
        return Err(Error::Remote(message.to_string()));
    }
    Ok(value)
}

fn array_field(response: &Value, key: &str) -> Vec<Value> {
    response
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn timestamp(tx: &Value) -> i64 {
    tx.pointer("/raw_data/timestamp")
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Decode the hex text fields of a token.
fn parse_token(mut token: Value) -> Value {
    if let Some(object) = token.as_object_mut() {
        for key in ["name", "abbr", "description", "url"] {
            if let Some(Value::String(field)) = object.get_mut(key) {
                if let Ok(decoded) = to_utf8(field) {
                    *field = decoded;
                }
            }
        }
    }
    token
}
