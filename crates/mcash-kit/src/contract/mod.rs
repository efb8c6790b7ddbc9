//! Smart contract handles.
//!
//! A [`Contract`] owns a parsed ABI and a registry of its methods, keyed by
//! name, canonical selector and 4-byte signature. Methods are looked up by
//! any of those keys and invoked through [`Contract::method`]:
//!
//! ```rust,no_run
//! # use mcash_kit::{CallOptions, Mcash};
//! # use serde_json::json;
//! # async fn example(client: Mcash) -> Result<(), mcash_kit::Error> {
//! let abi = json!([{
//!     "type": "function", "name": "balanceOf", "stateMutability": "view",
//!     "inputs": [{"name": "owner", "type": "address"}],
//!     "outputs": [{"name": "balance", "type": "uint256"}]
//! }]);
//! let token = client.contract(&abi, Some("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE"))?;
//! let balance = token
//!     .method("balanceOf", vec![json!("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE")])?
//!     .call(CallOptions::default())
//!     .await?;
//! println!("{balance}");
//! # Ok(())
//! # }
//! ```

mod method;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

pub use method::{
    CallOptions, Method, MethodCall, REVERT_MESSAGE, SendOptions, SendOutcome, WatchHandle, WatchOptions,
};

use crate::abi::{AbiEntry, DecodedParams, parse_abi};
use crate::client::{DeployOptions, EventPoller, EventQuery, Mcash, SignOptions};
use crate::error::{Error, RpcError};
use crate::types::EventRecord;
use crate::types::address::{is_address, to_hex};
use crate::utils::{strip_0x, to_utf8};

/// Decoded call data.
#[derive(Clone, Debug)]
pub struct DecodedInput {
    /// Name of the matched method.
    pub name: String,
    pub params: DecodedParams,
}

/// Filters for contract event reads and listeners.
#[derive(Clone, Debug, Default)]
pub struct ContractEventOptions {
    pub query: EventQuery,
    /// Only keep records from this node (`fullNode` or `solidityNode`).
    pub resource_node: Option<String>,
}

/// A contract bound to a client.
#[derive(Debug)]
pub struct Contract {
    client: Mcash,
    address: Option<String>,
    abi: Vec<AbiEntry>,
    bytecode: Option<String>,
    deployed: bool,
    methods: Vec<Method>,
    registry: HashMap<String, usize>,
    /// Shared with the running listener so both see one watermark.
    poller: Arc<Mutex<EventPoller>>,
    listener: Option<WatchHandle>,
}

impl Contract {
    /// Created with [`Mcash::contract`]. An invalid address leaves the
    /// contract unbound.
    pub(crate) fn new(client: Mcash, abi: &Value, address: Option<&str>) -> Result<Self, Error> {
        let entries = parse_abi(abi)?;
        let address = address.filter(|address| is_address(address)).map(to_hex).transpose()?;
        let mut contract = Self {
            client,
            deployed: address.is_some(),
            address,
            abi: Vec::new(),
            bytecode: None,
            methods: Vec::new(),
            registry: HashMap::new(),
            poller: Arc::new(Mutex::new(EventPoller::new())),
            listener: None,
        };
        contract.set_abi(entries);
        Ok(contract)
    }

    /// Contract address in hex, once known.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn is_deployed(&self) -> bool {
        self.deployed
    }

    pub fn bytecode(&self) -> Option<&str> {
        self.bytecode.as_deref()
    }

    pub fn abi(&self) -> &[AbiEntry] {
        &self.abi
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub(crate) fn client(&self) -> &Mcash {
        &self.client
    }

    /// Replace the ABI and rebuild the method registry.
    pub fn load_abi(&mut self, abi: &Value) -> Result<(), Error> {
        let entries = parse_abi(abi)?;
        self.set_abi(entries);
        Ok(())
    }

    fn set_abi(&mut self, entries: Vec<AbiEntry>) {
        self.methods.clear();
        self.registry.clear();
        for entry in &entries {
            // Constructors are not callable and untyped entries are noise.
            if entry.entry_type.is_none() || entry.is_constructor() {
                continue;
            }
            let method = Method::new(entry.clone());
            let index = self.methods.len();
            // Later overloads shadow earlier ones under the bare name.
            self.registry.insert(method.name().to_string(), index);
            self.registry.insert(method.function_selector().to_string(), index);
            self.registry.insert(method.signature().to_string(), index);
            self.methods.push(method);
        }
        self.abi = entries;
    }

    /// Look a method up by name, selector or signature.
    pub fn get_method(&self, key: &str) -> Option<&Method> {
        self.registry.get(key).map(|index| &self.methods[*index])
    }

    pub fn has_method(&self, key: &str) -> bool {
        self.registry.contains_key(key)
    }

    /// Bind arguments to a method.
    pub fn method(&self, key: &str, args: Vec<Value>) -> Result<MethodCall<'_>, Error> {
        let method = self
            .get_method(key)
            .ok_or_else(|| Error::validation(format!("Contract method {key} not found")))?;
        Ok(MethodCall::new(self, method, args))
    }

    /// Find the method for call data and decode its arguments.
    pub fn decode_input(&self, data: &str) -> Result<DecodedInput, Error> {
        let data = strip_0x(data);
        let signature = data.get(..8).unwrap_or(data);
        let method = self
            .get_method(signature)
            .ok_or_else(|| Error::validation(format!("Contract method {signature} not found")))?;
        let params = method.decode_input(data.get(8..).unwrap_or_default())?;
        Ok(DecodedInput {
            name: method.name().to_string(),
            params,
        })
    }

    // ========================================================================
    // Deployment
    // ========================================================================

    /// Deploy with this contract's ABI and bind to the new address.
    pub async fn deploy(&mut self, mut options: DeployOptions, private_key: Option<&str>) -> Result<(), Error> {
        if options.abi.is_null() {
            options.abi = serde_json::to_value(&self.abi).map_err(RpcError::from)?;
        }
        let issuer = match private_key {
            Some(key) => Some(crate::client::PrivateKey::from_hex(key)?.address().to_hex()),
            None => None,
        };
        let wallet = self.client.wallet();
        let transaction = self
            .client
            .transaction_builder()
            .create_smart_contract(options, issuer.as_deref())
            .await?;
        let signed = wallet
            .sign(
                transaction,
                SignOptions {
                    private_key: private_key.map(str::to_string),
                    ..Default::default()
                },
            )
            .await?;
        let broadcast = wallet.send_raw_transaction(signed.clone()).await?;
        if let Some(code) = broadcast.code {
            let message = broadcast
                .message
                .as_deref()
                .map(|message| to_utf8(message).unwrap_or_else(|_| message.to_string()))
                .unwrap_or_default();
            return Err(Error::Broadcast { code, message });
        }

        let address = signed
            .contract_address
            .ok_or_else(|| Error::validation("Invalid contract address provided"))?;
        tracing::info!(tx_id = %signed.tx_id, address = %address, "contract deployed");
        self.at(&address).await
    }

    /// Bind to a deployed contract, loading its ABI and bytecode from the
    /// node.
    pub async fn at(&mut self, address: &str) -> Result<(), Error> {
        let contract = match self.client.wallet().get_contract(address).await {
            Ok(contract) => contract,
            Err(err) if err.is_not_found() => {
                return Err(Error::state("Contract has not been deployed on the network"));
            }
            Err(err) => return Err(err),
        };
        let Some(contract_address) = contract.get("contract_address").and_then(Value::as_str) else {
            return Err(Error::Remote(format!(
                "Unknown error: {}",
                serde_json::to_string_pretty(&contract).unwrap_or_default()
            )));
        };

        self.address = Some(to_hex(contract_address)?);
        self.bytecode = contract
            .get("bytecode")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.deployed = true;
        let abi = contract
            .get("abi")
            .and_then(|abi| abi.get("entrys"))
            .cloned()
            .unwrap_or(Value::Null);
        self.load_abi(&abi)
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Events this contract emitted since the last read.
    pub async fn get_events(&mut self, options: &ContractEventOptions) -> Result<Vec<EventRecord>, Error> {
        let address = self.address.clone().unwrap_or_default();
        let batch = self
            .client
            .event()
            .get_events_by_contract_address(&address, &options.query)
            .await?;
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        poller.set_resource_node(options.resource_node.clone());
        Ok(poller.filter(batch))
    }

    /// Poll for new events and pass each to `callback`. Replaces any
    /// running listener. Poll failures are logged and polling continues.
    pub async fn start_event_listener<F>(&mut self, options: ContractEventOptions, callback: F) -> Result<(), Error>
    where
        F: Fn(EventRecord) + Send + Sync + 'static,
    {
        self.stop_event_listener();
        if self.client.event_server().is_none() {
            return Err(Error::state("Event server is not configured"));
        }
        let Some(address) = self.address.clone() else {
            return Err(Error::state("Contract is not configured with an address"));
        };

        self.get_events(&options).await?;
        let handle = method::spawn_listener(
            self.client.event(),
            address.clone(),
            options.query,
            Arc::clone(&self.poller),
            self.client.listener_interval(),
            move |record| match record {
                Ok(record) => callback(record),
                Err(err) => tracing::warn!(address = %address, error = %err, "Failed to get event list"),
            },
        );
        self.listener = Some(handle);
        Ok(())
    }

    pub fn stop_event_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|listener| !listener.is_stopped())
    }
}
