//! `MemoryNode`: an in-process node, solidity node and event server.
//!
//! It builds transactions the way the node does (id = sha256 of the raw
//! data), checks signatures on broadcast, applies transfers and contract
//! deployments, and serves transaction info and events from memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mcash_kit::client::RecoverableSignature;
use mcash_kit::*;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

pub const ALICE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const BOB_KEY: &str = "1c78d4d86dc31acb08a9eb132b9306bd1c86ea426083e0e0b32308606d212a98";

/// Log through `RUST_LOG` when set. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn address_of(key: &str) -> Address {
    PrivateKey::from_hex(key).unwrap().address()
}

#[derive(Debug, Default)]
struct Chain {
    height: u64,
    balances: HashMap<String, u64>,
    transactions: HashMap<String, Value>,
    infos: HashMap<String, Value>,
    contracts: HashMap<String, Value>,
    /// Return data for constant calls, keyed by function selector.
    constants: HashMap<String, String>,
    /// Return data for state-changing calls, keyed by function selector.
    results: HashMap<String, String>,
    events: HashMap<String, Vec<Value>>,
    /// Number of info lookups that come back empty before the info shows.
    info_delay: usize,
    requests: Vec<ProviderRequest>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryNode {
    chain: Arc<Mutex<Chain>>,
}

impl MemoryNode {
    pub fn new() -> Self {
        init_tracing();
        let node = Self::default();
        node.chain.lock().unwrap().height = 100;
        node
    }

    pub fn client(&self, private_key: Option<&str>) -> Mcash {
        let mut builder = McashBuilder::with_provider(self.clone())
            .event_provider(self.clone())
            .poll_config(PollConfig {
                attempts: 5,
                interval: std::time::Duration::from_millis(10),
            })
            .listener_interval(std::time::Duration::from_millis(50));
        if let Some(key) = private_key {
            builder = builder.private_key(key);
        }
        builder.build().unwrap()
    }

    pub fn fund(&self, address: &Address, amount: u64) {
        self.chain.lock().unwrap().balances.insert(address.to_hex(), amount);
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.chain
            .lock()
            .unwrap()
            .balances
            .get(&address.to_hex())
            .copied()
            .unwrap_or(0)
    }

    pub fn set_constant(&self, selector: &str, output: String) {
        self.chain.lock().unwrap().constants.insert(selector.to_string(), output);
    }

    pub fn set_result(&self, selector: &str, output: String) {
        self.chain.lock().unwrap().results.insert(selector.to_string(), output);
    }

    pub fn delay_info(&self, lookups: usize) {
        self.chain.lock().unwrap().info_delay = lookups;
    }

    pub fn emit(&self, contract: &Address, event: Value) {
        self.chain
            .lock()
            .unwrap()
            .events
            .entry(contract.to_base58())
            .or_default()
            .push(event);
    }

    pub fn transaction(&self, id: &str) -> Option<Value> {
        self.chain.lock().unwrap().transactions.get(id).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.chain
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }

    fn handle(&self, request: &ProviderRequest) -> Value {
        let mut chain = self.chain.lock().unwrap();
        chain.requests.push(request.clone());
        let body = request.body.clone().unwrap_or(Value::Null);
        let path = request.path.as_str();

        if let Some(route) = path.strip_prefix("event/contract/") {
            let contract = route.split('/').next().unwrap_or_default();
            return Value::Array(chain.events.get(contract).cloned().unwrap_or_default());
        }

        match path {
            "wallet/getnowblock" | "walletsolidity/getnowblock" => json!({
                "blockID": format!("{:064x}", chain.height),
                "block_header": {"raw_data": {"number": chain.height}}
            }),
            "healthcheck" => json!({"status": "ok"}),
            "wallet/getaccount" => {
                let address = body["address"].as_str().unwrap_or_default();
                match chain.balances.get(address) {
                    Some(balance) => json!({"address": address, "balance": balance}),
                    None => json!({}),
                }
            }
            "wallet/createtransaction" => build(&mut chain, "TransferContract", body),
            "wallet/deploycontract" => {
                let mut tx = build(&mut chain, "CreateSmartContract", body);
                let id = tx["txID"].as_str().unwrap_or_default().to_string();
                tx["contract_address"] = json!(format!("32{}", &id[..40]));
                tx
            }
            "wallet/triggersmartcontract" => {
                let selector = body["function_selector"].as_str().unwrap_or_default().to_string();
                let constant = chain.constants.get(&selector).cloned();
                let tx = build(&mut chain, "TriggerSmartContract", body);
                match constant {
                    Some(output) => json!({
                        "result": {"result": true},
                        "constant_result": [output],
                        "transaction": tx
                    }),
                    None => json!({"result": {"result": true}, "transaction": tx}),
                }
            }
            "wallet/broadcasttransaction" => broadcast(&mut chain, body),
            "wallet/gettransactionbyid" => {
                let id = body["value"].as_str().unwrap_or_default();
                chain.transactions.get(id).cloned().unwrap_or_else(|| json!({}))
            }
            "walletsolidity/gettransactioninfobyid" => {
                if chain.info_delay > 0 {
                    chain.info_delay -= 1;
                    return json!({});
                }
                let id = body["value"].as_str().unwrap_or_default();
                chain.infos.get(id).cloned().unwrap_or_else(|| json!({}))
            }
            "wallet/getcontract" => {
                let address = request
                    .query
                    .iter()
                    .find(|(key, _)| key == "value")
                    .map(|(_, value)| value.as_str())
                    .unwrap_or_default();
                chain.contracts.get(address).cloned().unwrap_or_else(|| json!({}))
            }
            _ => json!({"Error": format!("unsupported path {path}")}),
        }
    }
}

fn build(chain: &mut Chain, kind: &str, parameters: Value) -> Value {
    chain.height += 1;
    let raw_data = json!({
        "contract": [{"type": kind, "parameter": {"value": parameters}}],
        "timestamp": chain.height,
        "expiration": chain.height + 60
    });
    let id = hex::encode(Sha256::digest(raw_data.to_string().as_bytes()));
    json!({"txID": id, "raw_data": raw_data})
}

fn broadcast(chain: &mut Chain, tx: Value) -> Value {
    let id = tx["txID"].as_str().unwrap_or_default().to_string();
    let contract = tx["raw_data"]["contract"][0].clone();
    let value = &contract["parameter"]["value"];
    let owner = value["owner_address"].as_str().unwrap_or_default().to_string();

    let digest = hex::decode(&id).unwrap_or_default();
    let signed_by_owner = tx["signature"].as_array().is_some_and(|signatures| {
        signatures.iter().any(|signature| {
            signature
                .as_str()
                .and_then(|s| RecoverableSignature::from_hex(s).ok())
                .and_then(|s| s.recover(&digest).ok())
                .is_some_and(|address| address.to_hex() == owner)
        })
    });
    if !signed_by_owner {
        return json!({
            "result": false,
            "code": "SIGERROR",
            "message": hex::encode("Validate signature error")
        });
    }

    let mut info = json!({"id": id, "blockNumber": chain.height});
    match contract["type"].as_str().unwrap_or_default() {
        "TransferContract" => {
            let amount = value["amount"].as_u64().unwrap_or(0);
            let from = chain.balances.get(&owner).copied().unwrap_or(0);
            if from < amount {
                return json!({
                    "result": false,
                    "code": "CONTRACT_VALIDATE_ERROR",
                    "message": hex::encode("balance is not sufficient")
                });
            }
            chain.balances.insert(owner.clone(), from - amount);
            let to = value["to_address"].as_str().unwrap_or_default().to_string();
            *chain.balances.entry(to).or_default() += amount;
        }
        "CreateSmartContract" => {
            let address = format!("32{}", &id[..40]);
            let abi: Value = value["abi"]
                .as_str()
                .and_then(|abi| serde_json::from_str(abi).ok())
                .unwrap_or_else(|| json!([]));
            chain.contracts.insert(
                address.clone(),
                json!({
                    "contract_address": address,
                    "origin_address": owner,
                    "bytecode": value["bytecode"],
                    "abi": {"entrys": abi}
                }),
            );
            info["contract_address"] = json!(address);
        }
        "TriggerSmartContract" => {
            let selector = value["function_selector"].as_str().unwrap_or_default();
            let output = chain.results.get(selector).cloned().unwrap_or_default();
            info["contractResult"] = json!([output]);
        }
        _ => {}
    }

    chain.transactions.insert(id.clone(), tx);
    chain.infos.insert(id, info);
    json!({"result": true})
}

impl Provider for MemoryNode {
    fn host(&self) -> &str {
        "memory://node"
    }

    fn request(&self, request: ProviderRequest) -> ProviderFuture<'_> {
        let response = self.handle(&request);
        Box::pin(async move { Ok(response) })
    }
}
