//! Unsigned transaction construction.
//!
//! Every method validates its inputs locally, converts addresses to hex and
//! asks the full node to assemble the transaction. Nothing is signed or
//! broadcast here; see [`Wallet::sign`](crate::Wallet::sign) and
//! [`Wallet::send_raw_transaction`](crate::Wallet::send_raw_transaction).
//!
//! # Example
//!
//! ```rust,no_run
//! # use mcash_kit::*;
//! # async fn example() -> Result<(), mcash_kit::Error> {
//! let mcash = Mcash::full_host("https://api.mcash.network")
//!     .private_key("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
//!     .build()?;
//!
//! let builder = mcash.transaction_builder();
//! let unsigned = builder
//!     .send_mcash("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE", 1_000, TransferOptions::default())
//!     .await?;
//! let frozen = builder
//!     .freeze_balance(
//!         5_000_000,
//!         FreezeOptions { resource: Resource::Energy, ..Default::default() },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::abi::{AbiEntry, encode_params, parse_abi};
use crate::error::{Error, RpcError};
use crate::types::address::{is_address, to_hex};
use crate::types::{Permission, Transaction, TriggerResponse};
use crate::utils::{from_utf8, now_millis, to_utf8};
use crate::validator::{Check, validate};

use super::mcash::Mcash;

/// Upper bound on `fee_limit`, in matoshi.
pub const MAX_FEE_LIMIT: u64 = 100_000_000_000;
/// Default `fee_limit` for deployments and triggers.
pub const DEFAULT_FEE_LIMIT: u64 = 1_000_000_000;
/// Upper bound (and default) of `origin_energy_limit`.
pub const MAX_ORIGIN_ENERGY_LIMIT: u64 = 10_000_000;

// ============================================================================
// Options
// ============================================================================

/// Resource obtained by freezing balance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Resource {
    #[default]
    Bandwidth,
    Energy,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Bandwidth => "BANDWIDTH",
            Resource::Energy => "ENERGY",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BANDWIDTH" => Ok(Resource::Bandwidth),
            "ENERGY" => Ok(Resource::Energy),
            _ => Err(Error::validation(
                "Invalid resource provided: Expected \"BANDWIDTH\" or \"ENERGY\"",
            )),
        }
    }
}

/// Sender and memo of a transfer.
#[derive(Clone, Debug, Default)]
pub struct TransferOptions {
    /// Sender address. Defaults to the client's default address.
    pub from: Option<String>,
    /// UTF-8 note attached to the transfer.
    pub memo: Option<String>,
}

/// Options for [`TransactionBuilder::freeze_balance`].
#[derive(Clone, Debug)]
pub struct FreezeOptions {
    /// Days the balance stays frozen.
    pub duration: u64,
    pub resource: Resource,
    pub owner: Option<String>,
    /// Delegate the resource to another account.
    pub receiver: Option<String>,
}

impl Default for FreezeOptions {
    fn default() -> Self {
        Self {
            duration: 3,
            resource: Resource::Bandwidth,
            owner: None,
            receiver: None,
        }
    }
}

/// Options for [`TransactionBuilder::unfreeze_balance`].
#[derive(Clone, Debug, Default)]
pub struct UnfreezeOptions {
    pub resource: Resource,
    pub owner: Option<String>,
    pub receiver: Option<String>,
}

/// Options for [`TransactionBuilder::create_smart_contract`].
#[derive(Clone, Debug)]
pub struct DeployOptions {
    /// ABI as an array or a JSON string.
    pub abi: Value,
    /// Hex bytecode.
    pub bytecode: String,
    pub fee_limit: u64,
    pub call_value: u64,
    /// Share of execution energy paid by callers, 0..=100.
    pub user_fee_percentage: u64,
    pub origin_energy_limit: u64,
    pub token_value: Option<u64>,
    pub token_id: Option<u64>,
    /// Constructor arguments.
    pub parameters: Vec<Value>,
    pub name: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            abi: Value::Null,
            bytecode: String::new(),
            fee_limit: DEFAULT_FEE_LIMIT,
            call_value: 0,
            user_fee_percentage: 100,
            origin_energy_limit: MAX_ORIGIN_ENERGY_LIMIT,
            token_value: None,
            token_id: None,
            parameters: Vec::new(),
            name: String::new(),
        }
    }
}

/// Value and fee settings of a contract trigger.
#[derive(Clone, Debug)]
pub struct TriggerOptions {
    pub fee_limit: u64,
    pub call_value: u64,
    pub token_value: Option<u64>,
    pub token_id: Option<u64>,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self {
            fee_limit: DEFAULT_FEE_LIMIT,
            call_value: 0,
            token_value: None,
            token_id: None,
        }
    }
}

/// One typed argument of a contract trigger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerParam {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl TriggerParam {
    pub fn new(kind: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Options for [`TransactionBuilder::create_token`].
#[derive(Clone, Debug)]
pub struct CreateTokenOptions {
    pub name: String,
    pub abbreviation: String,
    pub description: String,
    pub url: String,
    pub total_supply: i64,
    /// MCASH paid for `token_ratio` tokens.
    pub mcash_ratio: i64,
    pub token_ratio: i64,
    /// Sale start in milliseconds. Defaults to now.
    pub sale_start: Option<i64>,
    pub sale_end: Option<i64>,
    pub free_bandwidth: i64,
    pub free_bandwidth_limit: i64,
    pub frozen_amount: i64,
    pub frozen_duration: i64,
    pub vote_score: Option<i64>,
    pub precision: Option<i64>,
}

impl Default for CreateTokenOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            abbreviation: String::new(),
            description: String::new(),
            url: String::new(),
            total_supply: 0,
            mcash_ratio: 1,
            token_ratio: 1,
            sale_start: None,
            sale_end: None,
            free_bandwidth: 0,
            free_bandwidth_limit: 0,
            frozen_amount: 0,
            frozen_duration: 0,
            vote_score: None,
            precision: None,
        }
    }
}

/// Options for [`TransactionBuilder::update_token`].
#[derive(Clone, Debug, Default)]
pub struct UpdateTokenOptions {
    pub description: String,
    pub url: String,
    pub free_bandwidth: i64,
    pub free_bandwidth_limit: i64,
}

/// New permission groups for [`TransactionBuilder::update_account_permissions`].
#[derive(Clone, Debug, Default)]
pub struct AccountPermissions {
    pub owner: Option<Permission>,
    pub witness: Option<Permission>,
    pub actives: Vec<Permission>,
}

// ============================================================================
// TransactionBuilder
// ============================================================================

/// Builds unsigned transactions through the full node.
///
/// Created with [`Mcash::transaction_builder`]. Address parameters accept
/// either form; `None` falls back to the client's default address.
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    client: Mcash,
}

impl TransactionBuilder {
    pub(crate) fn new(client: Mcash) -> Self {
        Self { client }
    }

    fn or_default(&self, address: Option<&str>) -> Value {
        self.client.address_or_default(address)
    }

    async fn build(&self, path: &str, body: Value) -> Result<Transaction, Error> {
        let response = self.client.full_post(path, body).await?;
        into_transaction(check_result(response)?)
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Transfer MCASH (in matoshi).
    pub async fn send_mcash(&self, to: &str, amount: u64, options: TransferOptions) -> Result<Transaction, Error> {
        let from = self.or_default(options.from.as_deref());
        let memo = options.memo.unwrap_or_default();
        validate(&[
            Check::address("recipient", to),
            Check::address("origin", from.clone()),
            Check::not_equal("recipient", "origin").msg("Cannot transfer MCASH to the same account"),
            Check::integer("amount", amount).gt(0),
            Check::string("memo", memo.as_str()),
        ])?;

        let mut body = json!({
            "to_address": to_hex(to)?,
            "owner_address": hex_of(&from)?,
            "amount": amount,
        });
        if !memo.is_empty() {
            body["memo"] = Value::from(from_utf8(&memo));
        }
        self.build("wallet/createtransaction", body).await
    }

    /// Transfer a token.
    pub async fn send_token(
        &self,
        to: &str,
        amount: u64,
        token_id: &str,
        options: TransferOptions,
    ) -> Result<Transaction, Error> {
        let from = self.or_default(options.from.as_deref());
        let memo = options.memo.unwrap_or_default();
        validate(&[
            Check::address("recipient", to),
            Check::address("origin", from.clone()),
            Check::not_equal("recipient", "origin").msg("Cannot transfer tokens to the same account"),
            Check::integer("amount", amount).gt(0),
            Check::token_id("token Id", token_id),
            Check::string("memo", memo.as_str()),
        ])?;

        let mut body = json!({
            "to_address": to_hex(to)?,
            "owner_address": hex_of(&from)?,
            "asset_id": token_id,
            "amount": amount,
        });
        if !memo.is_empty() {
            body["memo"] = Value::from(from_utf8(&memo));
        }
        self.build("wallet/transferasset", body).await
    }

    /// Buy tokens from their issuer during the sale.
    pub async fn purchase_token(
        &self,
        issuer: &str,
        token_id: &str,
        amount: u64,
        buyer: Option<&str>,
    ) -> Result<Transaction, Error> {
        let buyer = self.or_default(buyer);
        validate(&[
            Check::address("buyer", buyer.clone()),
            Check::address("issuer", issuer),
            Check::not_equal("buyer", "issuer").msg("Cannot purchase tokens from same account"),
            Check::integer("amount", amount).gt(0),
            Check::token_id("token ID", token_id),
        ])?;
        let asset_id: u64 = token_id
            .parse()
            .map_err(|_| Error::validation("Invalid token ID provided"))?;

        self.build(
            "wallet/participateassetissue",
            json!({
                "to_address": to_hex(issuer)?,
                "owner_address": hex_of(&buyer)?,
                "asset_id": asset_id,
                "amount": amount,
            }),
        )
        .await
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Freeze balance for bandwidth or energy.
    pub async fn freeze_balance(&self, amount: u64, options: FreezeOptions) -> Result<Transaction, Error> {
        let owner = self.or_default(options.owner.as_deref());
        validate(&[
            Check::address("origin", owner.clone()),
            Check::address("receiver", options.receiver.as_deref()).optional(),
            Check::integer("amount", amount).gt(0),
            Check::integer("duration", options.duration).gte(0),
        ])?;

        let owner = hex_of(&owner)?;
        let mut body = json!({
            "owner_address": owner,
            "frozen_balance": amount,
            "frozen_duration": options.duration,
            "resource": options.resource.as_str(),
        });
        if let Some(receiver) = receiver_if_other(options.receiver.as_deref(), &owner)? {
            body["receiver_address"] = Value::from(receiver);
        }
        self.build("wallet/freezebalance", body).await
    }

    /// Unfreeze balance whose duration has passed.
    pub async fn unfreeze_balance(&self, options: UnfreezeOptions) -> Result<Transaction, Error> {
        let owner = self.or_default(options.owner.as_deref());
        validate(&[
            Check::address("origin", owner.clone()),
            Check::address("receiver", options.receiver.as_deref()).optional(),
        ])?;

        let owner = hex_of(&owner)?;
        let mut body = json!({
            "owner_address": owner,
            "resource": options.resource.as_str(),
        });
        if let Some(receiver) = receiver_if_other(options.receiver.as_deref(), &owner)? {
            body["receiver_address"] = Value::from(receiver);
        }
        self.build("wallet/unfreezebalance", body).await
    }

    /// Unfreeze the frozen supply of an issued token.
    pub async fn unfreeze_asset(&self, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[Check::address("owner address", owner.clone())])?;
        self.build("wallet/unfreezeasset", json!({ "owner_address": hex_of(&owner)? }))
            .await
    }

    /// Stake balance for `duration` days.
    pub async fn stake(&self, amount: u64, duration: u64, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("origin", owner.clone()),
            Check::integer("amount", amount).gt(0),
            Check::integer("duration", duration).gte(0),
        ])?;
        self.build(
            "wallet/stake",
            json!({
                "owner_address": hex_of(&owner)?,
                "stake_amount": amount,
                "stake_duration": duration,
            }),
        )
        .await
    }

    pub async fn unstake(&self, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[Check::address("origin", owner.clone())])?;
        self.build("wallet/unstake", json!({ "owner_address": hex_of(&owner)? }))
            .await
    }

    /// Claim accumulated block rewards.
    pub async fn withdraw_block_rewards(&self, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[Check::address("origin", owner.clone())])?;
        self.build("wallet/withdrawbalance", json!({ "owner_address": hex_of(&owner)? }))
            .await
    }

    // ========================================================================
    // Accounts and witnesses
    // ========================================================================

    pub async fn create_witness(&self, witness: &str, url: &str, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("owner", owner.clone()),
            Check::address("witness", witness),
            Check::url("url", url).msg("Invalid url provided"),
        ])?;
        self.build(
            "wallet/createwitness",
            json!({
                "owner_address": hex_of(&owner)?,
                "witness_address": to_hex(witness)?,
                "url": from_utf8(url),
            }),
        )
        .await
    }

    /// Activate a new account, paid for by `owner`.
    pub async fn create_account(&self, account: &str, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("ownerAddress", owner.clone()),
            Check::address("accountAddress", account),
        ])?;
        self.build(
            "wallet/createaccount",
            json!({
                "owner_address": hex_of(&owner)?,
                "account_address": to_hex(account)?,
            }),
        )
        .await
    }

    /// Vote for a witness.
    pub async fn vote(&self, vote_address: &str, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("ownerAddress", owner.clone()),
            Check::address("voteAddress", vote_address),
        ])?;
        self.build(
            "wallet/votewitnessaccount",
            json!({
                "owner_address": hex_of(&owner)?,
                "vote_address": to_hex(vote_address)?,
            }),
        )
        .await
    }

    pub async fn update_account(&self, name: &str, owner: Option<&str>) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::not_empty_string("Name", name),
            Check::address("origin", owner.clone()),
        ])?;
        self.build(
            "wallet/updateaccount",
            json!({
                "account_name": from_utf8(name),
                "owner_address": hex_of(&owner)?,
            }),
        )
        .await
    }

    /// Replace the owner, witness and active permission groups of an account.
    pub async fn update_account_permissions(
        &self,
        owner: Option<&str>,
        permissions: AccountPermissions,
    ) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        let owner = match owner.as_str() {
            Some(address) if is_address(address) => to_hex(address)?,
            _ => return Err(Error::validation("Invalid ownerAddress provided")),
        };
        if !permissions
            .owner
            .as_ref()
            .is_none_or(|p| is_valid_permission(p, 0))
        {
            return Err(Error::validation("Invalid ownerPermissions provided"));
        }
        if !permissions
            .witness
            .as_ref()
            .is_none_or(|p| is_valid_permission(p, 1))
        {
            return Err(Error::validation("Invalid witnessPermissions provided"));
        }
        if !permissions.actives.iter().all(|p| is_valid_permission(p, 2)) {
            return Err(Error::validation("Invalid activesPermissions provided"));
        }

        let mut body = Map::new();
        body.insert("owner_address".into(), Value::from(owner));
        if let Some(permission) = &permissions.owner {
            body.insert("owner".into(), to_json(permission)?);
        }
        if let Some(permission) = &permissions.witness {
            body.insert("witness".into(), to_json(permission)?);
        }
        match permissions.actives.as_slice() {
            [] => {}
            [single] => {
                body.insert("actives".into(), to_json(single)?);
            }
            many => {
                body.insert("actives".into(), to_json(&many)?);
            }
        }
        self.build("wallet/accountpermissionupdate", Value::Object(body))
            .await
    }

    // ========================================================================
    // Smart contracts
    // ========================================================================

    /// Deploy a contract. The returned transaction carries the new
    /// `contract_address`.
    pub async fn create_smart_contract(&self, options: DeployOptions, issuer: Option<&str>) -> Result<Transaction, Error> {
        let issuer = self.or_default(issuer);
        let abi = match &options.abi {
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .map_err(|_| Error::validation("Invalid options.abi provided"))?,
            other => other.clone(),
        };
        if !abi.is_array() {
            return Err(Error::validation("Invalid options.abi provided"));
        }
        let entries = parse_abi(&abi)?;
        let payable = entries
            .iter()
            .any(|entry| entry.is_constructor() && entry.is_payable());

        validate(&[
            Check::hex("bytecode", options.bytecode.as_str()),
            Check::integer("feeLimit", options.fee_limit)
                .gt(0)
                .lte(MAX_FEE_LIMIT as i128),
            Check::integer("callValue", options.call_value).gte(0),
            Check::integer("userFeePercentage", options.user_fee_percentage)
                .gte(0)
                .lte(100),
            Check::integer("originEnergyLimit", options.origin_energy_limit)
                .gte(0)
                .lte(MAX_ORIGIN_ENERGY_LIMIT as i128),
            Check::address("issuer", issuer.clone()),
            Check::integer("tokenValue", options.token_value)
                .gte(0)
                .optional(),
            Check::integer("tokenId", options.token_id).gte(0).optional(),
        ])?;

        let token_value = options.token_value.unwrap_or(0);
        if payable && options.call_value == 0 && token_value == 0 {
            return Err(Error::validation(
                "When contract is payable, options.callValue or options.tokenValue must be a positive integer",
            ));
        }
        if !payable && (options.call_value > 0 || token_value > 0) {
            return Err(Error::validation(
                "When contract is not payable, options.callValue and options.tokenValue must be 0",
            ));
        }

        let parameter = match entries.iter().find(|entry| entry.is_constructor()) {
            Some(constructor) => encode_constructor(constructor, &options.parameters)?,
            None => String::new(),
        };

        let mut body = json!({
            "owner_address": hex_of(&issuer)?,
            "fee_limit": options.fee_limit,
            "call_value": options.call_value,
            "consume_user_resource_percent": options.user_fee_percentage,
            "origin_energy_limit": options.origin_energy_limit,
            "abi": abi.to_string(),
            "bytecode": options.bytecode,
            "parameter": parameter,
            "name": options.name,
        });
        if let Some(token_value) = options.token_value {
            body["call_token_value"] = Value::from(token_value);
        }
        if let Some(token_id) = options.token_id {
            body["token_id"] = Value::from(token_id);
        }
        self.build("wallet/deploycontract", body).await
    }

    /// Build a contract call. For `view`/`pure` functions the node also
    /// executes it and fills `constant_result`.
    pub async fn trigger_smart_contract(
        &self,
        contract: &str,
        function_selector: &str,
        options: TriggerOptions,
        parameters: &[TriggerParam],
        issuer: Option<&str>,
    ) -> Result<TriggerResponse, Error> {
        let issuer = self.or_default(issuer);
        validate(&[
            Check::integer("feeLimit", options.fee_limit)
                .gt(0)
                .lte(MAX_FEE_LIMIT as i128),
            Check::integer("callValue", options.call_value).gte(0),
            Check::address("contract", contract),
            Check::address("issuer", issuer.clone()),
            Check::integer("tokenValue", options.token_value)
                .gte(0)
                .optional(),
            Check::integer("tokenId", options.token_id).gte(0).optional(),
            Check::not_empty_string("function selector", function_selector),
        ])?;

        let selector: String = function_selector
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let parameter = encode_trigger_params(parameters)?;

        let mut body = json!({
            "contract_address": to_hex(contract)?,
            "owner_address": hex_of(&issuer)?,
            "function_selector": selector,
            "fee_limit": options.fee_limit,
            "call_value": options.call_value,
            "parameter": parameter,
        });
        if let Some(token_value) = options.token_value {
            body["call_token_value"] = Value::from(token_value);
        }
        if let Some(token_id) = options.token_id {
            body["token_id"] = Value::from(token_id);
        }

        let response = self
            .client
            .full_post("wallet/triggersmartcontract", body)
            .await?;
        serde_json::from_value(check_result(response)?)
            .map_err(|e| Error::Rpc(RpcError::InvalidResponse(e.to_string())))
    }

    /// Change the caller energy share of a contract.
    pub async fn update_setting(
        &self,
        contract: &str,
        user_fee_percentage: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("owner", owner.clone()),
            Check::address("contract", contract),
            Check::integer("userFeePercentage", user_fee_percentage)
                .gte(0)
                .lte(100),
        ])?;
        self.build(
            "wallet/updatesetting",
            json!({
                "owner_address": hex_of(&owner)?,
                "contract_address": to_hex(contract)?,
                "consume_user_resource_percent": user_fee_percentage,
            }),
        )
        .await
    }

    pub async fn update_energy_limit(
        &self,
        contract: &str,
        origin_energy_limit: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("owner", owner.clone()),
            Check::address("contract", contract),
            Check::integer("originEnergyLimit", origin_energy_limit)
                .gte(0)
                .lte(MAX_ORIGIN_ENERGY_LIMIT as i128),
        ])?;
        self.build(
            "wallet/updateenergylimit",
            json!({
                "owner_address": hex_of(&owner)?,
                "contract_address": to_hex(contract)?,
                "origin_energy_limit": origin_energy_limit,
            }),
        )
        .await
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Issue a new token.
    pub async fn create_token(&self, options: CreateTokenOptions, issuer: Option<&str>) -> Result<Transaction, Error> {
        let issuer = self.or_default(issuer);
        let now = now_millis();
        let sale_start = options.sale_start.unwrap_or(now);
        validate(&[
            Check::positive_integer("Supply amount", options.total_supply),
            Check::positive_integer("MCASH ratio", options.mcash_ratio),
            Check::positive_integer("Token ratio", options.token_ratio),
            Check::not_empty_string("token abbreviation", options.abbreviation.as_str()),
            Check::not_empty_string("token name", options.name.as_str()),
            Check::not_empty_string("token description", options.description.as_str()),
            Check::url("token url", options.url.as_str()),
            Check::address("issuer", issuer.clone()),
            Check::integer("sale start timestamp", sale_start).gte(now as i128),
            Check::integer("sale end timestamp", options.sale_end).gt(sale_start as i128),
            Check::integer("Free bandwidth amount", options.free_bandwidth).gte(0),
            Check::integer("Free bandwidth limit", options.free_bandwidth_limit).gte(0),
            Check::integer("Frozen supply", options.frozen_amount).gte(0),
            Check::integer("Frozen duration", options.frozen_duration).gte(0),
        ])?;
        if options.vote_score.is_some_and(|score| score <= 0) {
            return Err(Error::validation(
                "voteScore must be a positive integer greater than 0",
            ));
        }
        if options
            .precision
            .is_some_and(|precision| !(0..=8).contains(&precision))
        {
            return Err(Error::validation(
                "precision must be a positive integer >= 0 and <= 8",
            ));
        }

        let mut body = json!({
            "owner_address": hex_of(&issuer)?,
            "name": from_utf8(&options.name),
            "abbr": from_utf8(&options.abbreviation),
            "description": from_utf8(&options.description),
            "url": from_utf8(&options.url),
            "total_supply": options.total_supply,
            "mcash_num": options.mcash_ratio,
            "num": options.token_ratio,
            "start_time": sale_start,
            "end_time": options.sale_end,
            "free_asset_bandwidth_limit": options.free_bandwidth,
            "public_free_asset_bandwidth_limit": options.free_bandwidth_limit,
            "frozen_supply": {
                "frozen_amount": options.frozen_amount,
                "frozen_days": options.frozen_duration,
            },
        });
        if let Some(precision) = options.precision.filter(|p| *p > 0) {
            body["precision"] = Value::from(precision);
        }
        if let Some(vote_score) = options.vote_score {
            body["vote_score"] = Value::from(vote_score);
        }
        self.build("wallet/createassetissue", body).await
    }

    /// Update the description, url and free bandwidth of an issued token.
    pub async fn update_token(&self, options: UpdateTokenOptions, issuer: Option<&str>) -> Result<Transaction, Error> {
        let issuer = self.or_default(issuer);
        validate(&[
            Check::not_empty_string("token description", options.description.as_str()),
            Check::url("token url", options.url.as_str()),
            Check::address("issuer", issuer.clone()),
            Check::positive_integer("Free bandwidth amount", options.free_bandwidth),
            Check::positive_integer("Free bandwidth limit", options.free_bandwidth_limit),
        ])?;
        self.build(
            "wallet/updateasset",
            json!({
                "owner_address": hex_of(&issuer)?,
                "description": from_utf8(&options.description),
                "url": from_utf8(&options.url),
                "new_limit": options.free_bandwidth,
                "new_public_limit": options.free_bandwidth_limit,
            }),
        )
        .await
    }

    // ========================================================================
    // Proposals
    // ========================================================================

    /// Propose chain parameter changes. `parameters` is one `{key, value}`
    /// object or an array of them.
    pub async fn create_proposal(&self, parameters: Value, issuer: Option<&str>) -> Result<Transaction, Error> {
        let issuer = self.or_default(issuer);
        validate(&[Check::address("issuer", issuer.clone())])?;

        let invalid = || Error::validation("Invalid proposal parameters provided");
        let parameters = match parameters {
            Value::Object(_) => vec![parameters],
            Value::Array(items) if items.iter().all(Value::is_object) => items,
            _ => return Err(invalid()),
        };
        self.build(
            "wallet/proposalcreate",
            json!({
                "owner_address": hex_of(&issuer)?,
                "parameters": parameters,
            }),
        )
        .await
    }

    pub async fn delete_proposal(&self, proposal_id: u64, issuer: Option<&str>) -> Result<Transaction, Error> {
        let issuer = self.or_default(issuer);
        validate(&[
            Check::address("issuer", issuer.clone()),
            Check::integer("proposalId", proposal_id).gte(0),
        ])?;
        self.build(
            "wallet/proposaldelete",
            json!({
                "owner_address": hex_of(&issuer)?,
                "proposal_id": proposal_id,
            }),
        )
        .await
    }

    pub async fn vote_proposal(&self, proposal_id: u64, approve: bool, voter: Option<&str>) -> Result<Transaction, Error> {
        let voter = self.or_default(voter);
        validate(&[
            Check::address("voter", voter.clone()),
            Check::integer("proposalId", proposal_id).gte(0),
            Check::boolean("has approval", approve),
        ])?;
        self.build(
            "wallet/proposalapprove",
            json!({
                "owner_address": hex_of(&voter)?,
                "proposal_id": proposal_id,
                "is_add_approval": approve,
            }),
        )
        .await
    }

    // ========================================================================
    // Exchanges
    // ========================================================================

    /// Create a token/MCASH exchange pair.
    pub async fn create_mcash_exchange(
        &self,
        token_id: u64,
        token_balance: u64,
        mcash_balance: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("owner", owner.clone()),
            Check::integer("token id", token_id).gte(0),
            Check::positive_integer("token balance", token_balance),
            Check::positive_integer("mcash balance", mcash_balance),
        ])?;
        self.build(
            "wallet/exchangecreate",
            json!({
                "owner_address": hex_of(&owner)?,
                "first_token_id": token_id,
                "first_token_balance": token_balance,
                "second_token_id": 0,
                "second_token_balance": mcash_balance,
            }),
        )
        .await
    }

    /// Create a token/token exchange pair.
    pub async fn create_token_exchange(
        &self,
        first_token_id: u64,
        first_token_balance: u64,
        second_token_id: u64,
        second_token_balance: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("owner", owner.clone()),
            Check::integer("first token id", first_token_id).gte(0),
            Check::integer("second token id", second_token_id).gte(0),
            Check::positive_integer("first token balance", first_token_balance),
            Check::positive_integer("second token balance", second_token_balance),
        ])?;
        self.build(
            "wallet/exchangecreate",
            json!({
                "owner_address": hex_of(&owner)?,
                "first_token_id": first_token_id,
                "first_token_balance": first_token_balance,
                "second_token_id": second_token_id,
                "second_token_balance": second_token_balance,
            }),
        )
        .await
    }

    /// Add liquidity to an exchange.
    pub async fn inject_exchange_tokens(
        &self,
        exchange_id: u64,
        token_id: u64,
        token_amount: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        self.move_exchange_tokens("wallet/exchangeinject", exchange_id, token_id, token_amount, owner)
            .await
    }

    /// Remove liquidity from an exchange.
    pub async fn withdraw_exchange_tokens(
        &self,
        exchange_id: u64,
        token_id: u64,
        token_amount: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        self.move_exchange_tokens("wallet/exchangewithdraw", exchange_id, token_id, token_amount, owner)
            .await
    }

    async fn move_exchange_tokens(
        &self,
        path: &str,
        exchange_id: u64,
        token_id: u64,
        token_amount: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("owner", owner.clone()),
            Check::integer("tokenId", token_id).gte(0),
            Check::integer("tokenAmount", token_amount).gte(1),
            Check::integer("exchangeId", exchange_id).gte(0),
        ])?;
        self.build(
            path,
            json!({
                "owner_address": hex_of(&owner)?,
                "exchange_id": exchange_id,
                "token_id": token_id,
                "quant": token_amount,
            }),
        )
        .await
    }

    /// Sell `amount_sold` of `token_id` expecting at least `amount_expected`
    /// of the other side.
    pub async fn trade_exchange_tokens(
        &self,
        exchange_id: u64,
        token_id: u64,
        amount_sold: u64,
        amount_expected: u64,
        owner: Option<&str>,
    ) -> Result<Transaction, Error> {
        let owner = self.or_default(owner);
        validate(&[
            Check::address("owner", owner.clone()),
            Check::integer("token name", token_id).gte(0),
            Check::integer("tokenAmountSold", amount_sold).gte(1),
            Check::integer("tokenAmountExpected", amount_expected).gte(1),
            Check::integer("exchangeId", exchange_id).gte(0),
        ])?;
        self.build(
            "wallet/exchangetransaction",
            json!({
                "owner_address": hex_of(&owner)?,
                "exchange_id": exchange_id,
                "token_id": token_id,
                "quant": amount_sold,
                "expected": amount_expected,
            }),
        )
        .await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Reject node-reported failures. `Error` is a plain message; a
/// `result.message` is hex-encoded UTF-8.
pub(crate) fn check_result(response: Value) -> Result<Value, Error> {
    if let Some(error) = response.get("Error") {
        let message = error
            .as_str()
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(Error::Remote(message));
    }
    if let Some(message) = response.pointer("/result/message").and_then(Value::as_str) {
        return Err(Error::Remote(
            to_utf8(message).unwrap_or_else(|_| message.to_string()),
        ));
    }
    Ok(response)
}

fn into_transaction(value: Value) -> Result<Transaction, Error> {
    serde_json::from_value(value).map_err(|e| Error::Rpc(RpcError::InvalidResponse(e.to_string())))
}

/// Hex form of an address that already passed validation.
fn hex_of(address: &Value) -> Result<String, Error> {
    match address.as_str() {
        Some(address) => to_hex(address),
        None => Err(Error::validation("Invalid address provided")),
    }
}

fn receiver_if_other(receiver: Option<&str>, owner_hex: &str) -> Result<Option<String>, Error> {
    match receiver {
        Some(receiver) => {
            let receiver = to_hex(receiver)?;
            Ok((receiver != owner_hex).then_some(receiver))
        }
        None => Ok(None),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::validation(e.to_string()))
}

fn is_valid_permission(permission: &Permission, permission_type: u8) -> bool {
    permission.permission_type == permission_type
        && !permission.permission_name.is_empty()
        && permission.threshold >= 1
        && permission.keys.iter().all(|key| {
            is_address(&key.address)
                && (1..=permission.threshold).contains(&key.weight)
                && (permission_type != 2 || permission.operations.is_some())
        })
}

/// Encode constructor arguments without the `0x` prefix.
fn encode_constructor(constructor: &AbiEntry, parameters: &[Value]) -> Result<String, Error> {
    if parameters.len() != constructor.inputs.len() {
        return Err(Error::validation(format!(
            "constructor needs {} but {} provided",
            constructor.inputs.len(),
            parameters.len()
        )));
    }
    let mut types = Vec::with_capacity(parameters.len());
    for input in &constructor.inputs {
        if input.kind.is_empty() {
            return Err(Error::validation(format!(
                "Invalid parameter type provided: {}",
                input.kind
            )));
        }
        types.push(input.canonical_type());
    }
    let encoded = encode_params(&types, parameters)?;
    Ok(encoded.trim_start_matches("0x").to_string())
}

/// Encode trigger arguments without the `0x` prefix. No arguments encode
/// as the empty string.
pub(crate) fn encode_trigger_params(parameters: &[TriggerParam]) -> Result<String, Error> {
    if parameters.is_empty() {
        return Ok(String::new());
    }
    let mut types = Vec::with_capacity(parameters.len());
    let mut values = Vec::with_capacity(parameters.len());
    for param in parameters {
        if param.kind.is_empty() {
            return Err(Error::validation(format!(
                "Invalid parameter type provided: {}",
                param.kind
            )));
        }
        types.push(param.kind.as_str());
        values.push(param.value.clone());
    }
    let encoded = encode_params(&types, &values)?;
    Ok(encoded.trim_start_matches("0x").to_string())
}
