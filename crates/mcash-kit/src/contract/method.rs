//! Contract methods and their calls.
//!
//! A [`Method`] wraps one ABI entry together with its canonical selector and
//! 4-byte signature. Binding arguments to it through [`Contract::method`]
//! yields a [`MethodCall`], which can be run as a constant call, sent as a
//! signed transaction, or (for events) watched.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::watch;

use crate::abi::{AbiEntry, AbiParam, DecodedParams, StateMutability, decode_params, function_signature, method_id};
use crate::client::{
    DEFAULT_FEE_LIMIT, EventPoller, EventQuery, EventServer, PrivateKey, SignOptions, TriggerOptions, TriggerParam,
};
use crate::error::Error;
use crate::types::{EventRecord, Transaction, TransactionInfo};
use crate::utils::{now_millis, strip_0x, to_utf8};

use super::Contract;

/// Prefix of every revert error raised by [`MethodCall::call`].
pub const REVERT_MESSAGE: &str = "The call has been reverted or has thrown an error.";

/// One callable ABI entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Method {
    entry: AbiEntry,
    name: String,
    function_selector: String,
    signature: String,
}

impl Method {
    pub(crate) fn new(entry: AbiEntry) -> Self {
        let name = entry
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| entry.entry_type.as_ref().map(|kind| kind.as_str().to_string()))
            .unwrap_or_default();
        let function_selector = function_signature(&name, &entry.inputs);
        let signature = method_id(&function_selector);
        Self {
            entry,
            name,
            function_selector,
            signature,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical form, e.g. `transfer(address,uint256)`.
    pub fn function_selector(&self) -> &str {
        &self.function_selector
    }

    /// First 4 bytes of the selector hash as 8 hex characters.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn entry(&self) -> &AbiEntry {
        &self.entry
    }

    pub fn inputs(&self) -> &[AbiParam] {
        &self.entry.inputs
    }

    pub fn outputs(&self) -> &[AbiParam] {
        &self.entry.outputs
    }

    /// Decode call data that follows the 4-byte signature.
    pub fn decode_input(&self, data: &str) -> Result<DecodedParams, Error> {
        let names = param_names(&self.entry.inputs);
        let decoded = decode_params(
            names.as_deref(),
            &self.entry.input_types(),
            &format!("0x{}", strip_0x(data)),
            false,
        )?;
        Ok(decoded)
    }

    /// Decode a return value. A single output is returned bare.
    fn decode_output(&self, output: &str) -> Result<Value, Error> {
        let decoded = decode_params(
            self.entry.output_names().as_deref(),
            &self.entry.output_types(),
            &format!("0x{}", strip_0x(output)),
            false,
        )?;
        if decoded.len() == 1 {
            return Ok(decoded.get(0).map(|value| value.to_json()).unwrap_or(Value::Null));
        }
        Ok(decoded.to_json())
    }
}

fn param_names(params: &[AbiParam]) -> Option<Vec<String>> {
    if params.iter().any(|param| !param.name.is_empty()) {
        Some(params.iter().map(|param| param.name.clone()).collect())
    } else {
        None
    }
}

// ============================================================================
// Options
// ============================================================================

/// Options for [`MethodCall::call`].
#[derive(Clone, Debug)]
pub struct CallOptions {
    /// Caller address. Defaults to the client's default address.
    pub from: Option<String>,
    pub fee_limit: u64,
    pub call_value: u64,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            from: None,
            fee_limit: DEFAULT_FEE_LIMIT,
            call_value: 0,
        }
    }
}

/// Options for [`MethodCall::send`].
#[derive(Clone, Debug)]
pub struct SendOptions {
    /// Hex signing key. Defaults to the client's default key.
    pub private_key: Option<String>,
    pub fee_limit: u64,
    /// Ignored unless the method is payable.
    pub call_value: u64,
    pub token_value: Option<u64>,
    pub token_id: Option<u64>,
    /// Wait for the transaction info and decode the result.
    pub should_poll_response: bool,
    /// With polling, return the transaction info instead of the decoded
    /// output.
    pub raw_response: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            private_key: None,
            fee_limit: DEFAULT_FEE_LIMIT,
            call_value: 0,
            token_value: None,
            token_id: None,
            should_poll_response: false,
            raw_response: false,
        }
    }
}

/// What [`MethodCall::send`] produced.
#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    /// Broadcast without polling; holds the transaction id.
    Submitted(String),
    /// Decoded contract output.
    Output(Value),
    /// Transaction info, when `raw_response` was requested.
    Info(TransactionInfo),
}

impl SendOutcome {
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            SendOutcome::Submitted(id) => Some(id),
            SendOutcome::Info(info) => Some(&info.id),
            SendOutcome::Output(_) => None,
        }
    }
}

/// Options for [`MethodCall::watch`].
#[derive(Clone, Debug, Default)]
pub struct WatchOptions {
    /// Result field filters forwarded to the event server.
    pub filters: Option<Value>,
    /// `fullNode` or `solidityNode`. Full node events are unconfirmed.
    pub resource_node: Option<String>,
}

// ============================================================================
// Watch handle
// ============================================================================

/// Stops a running event listener when told to or when dropped.
#[derive(Debug)]
pub struct WatchHandle {
    stop: watch::Sender<bool>,
}

impl WatchHandle {
    /// Stop polling. No callback runs after the current one returns.
    pub fn stop(self) {
        let _ = self.stop.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow() || self.stop.is_closed()
    }
}

/// Poll `address` every `interval` and feed new records (or poll failures)
/// to `deliver` until the handle stops.
///
/// `poller` may be shared with other readers; its watermark is the one that
/// decides what counts as new.
pub(crate) fn spawn_listener<F>(
    server: EventServer,
    address: String,
    query: EventQuery,
    poller: Arc<Mutex<EventPoller>>,
    interval: Duration,
    mut deliver: F,
) -> WatchHandle
where
    F: FnMut(Result<EventRecord, Error>) + Send + 'static,
{
    let (stop, mut stopped) = watch::channel(false);
    tokio::spawn(async move {
        loop {
            // Either a stop signal or a dropped handle ends the loop.
            if tokio::time::timeout(interval, stopped.changed()).await.is_ok() {
                break;
            }
            let batch = server.get_events_by_contract_address(&address, &query).await;
            if *stopped.borrow() {
                break;
            }
            match batch {
                Ok(batch) => {
                    let fresh = poller.lock().unwrap_or_else(PoisonError::into_inner).filter(batch);
                    for record in fresh {
                        deliver(Ok(record));
                    }
                }
                Err(err) => deliver(Err(err)),
            }
        }
        tracing::debug!(address = %address, "event listener stopped");
    });
    WatchHandle { stop }
}

// ============================================================================
// MethodCall
// ============================================================================

/// A method with bound arguments.
#[derive(Debug)]
pub struct MethodCall<'a> {
    contract: &'a Contract,
    method: &'a Method,
    args: Vec<Value>,
}

impl<'a> MethodCall<'a> {
    pub(crate) fn new(contract: &'a Contract, method: &'a Method, args: Vec<Value>) -> Self {
        Self {
            contract,
            method,
            args,
        }
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    fn parameters(&self) -> Vec<TriggerParam> {
        self.method
            .inputs()
            .iter()
            .zip(&self.args)
            .map(|(input, value)| TriggerParam::new(input.canonical_type(), value.clone()))
            .collect()
    }

    fn deployed_address(&self) -> Result<&'a str, Error> {
        if self.method.inputs().len() != self.args.len() {
            return Err(Error::validation("Invalid argument count provided"));
        }
        let address = self
            .contract
            .address()
            .ok_or_else(|| Error::validation("Smart contract is missing address"))?;
        if !self.contract.is_deployed() {
            return Err(Error::state(
                "Calling smart contracts requires you to load the contract first",
            ));
        }
        Ok(address)
    }

    /// Run a constant method on the full node without a transaction.
    pub async fn call(&self, options: CallOptions) -> Result<Value, Error> {
        let address = self.deployed_address()?;
        let mutability = self.method.entry.mutability();
        if !mutability.is_constant() {
            return Err(Error::validation(format!(
                "Methods with state mutability \"{mutability}\" must use send()"
            )));
        }

        let client = self.contract.client();
        let from = options
            .from
            .or_else(|| client.default_address().map(|address| address.to_hex()));
        let response = client
            .transaction_builder()
            .trigger_smart_contract(
                address,
                self.method.function_selector(),
                TriggerOptions {
                    fee_limit: options.fee_limit,
                    call_value: options.call_value,
                    ..Default::default()
                },
                &self.parameters(),
                from.as_deref(),
            )
            .await?;

        let output = response
            .constant_result
            .first()
            .ok_or_else(|| Error::Remote("Failed to execute".to_string()))?;
        if let Some(reason) = revert_reason(output) {
            return Err(Error::Revert(reason));
        }
        self.method.decode_output(output)
    }

    /// Build, sign and broadcast a transaction for a state-changing method.
    pub async fn send(&self, options: SendOptions) -> Result<SendOutcome, Error> {
        let address = self.deployed_address()?;
        let mutability = self.method.entry.mutability();
        if mutability.is_constant() {
            return Err(Error::validation(format!(
                "Methods with state mutability \"{mutability}\" must use call()"
            )));
        }
        let call_value = if mutability == StateMutability::Payable {
            options.call_value
        } else {
            0
        };

        let client = self.contract.client();
        let key = match options.private_key.as_deref() {
            Some(hex) => PrivateKey::from_hex(hex)?,
            None => client.default_private_key().ok_or(Error::NoSigner)?,
        };
        let from = key.address().to_hex();

        let response = client
            .transaction_builder()
            .trigger_smart_contract(
                address,
                self.method.function_selector(),
                TriggerOptions {
                    fee_limit: options.fee_limit,
                    call_value,
                    token_value: options.token_value,
                    token_id: options.token_id,
                },
                &self.parameters(),
                Some(&from),
            )
            .await?;
        let transaction = match response.transaction.clone() {
            Some(transaction) if response.result.result => transaction,
            _ => return Err(Error::Remote(format!("Unknown error: {}", pretty(&response)))),
        };

        let wallet = client.wallet();
        let signed = wallet
            .sign(
                transaction,
                SignOptions {
                    private_key: Some(key.to_hex()),
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

        if !options.should_poll_response {
            return Ok(SendOutcome::Submitted(signed.tx_id));
        }
        self.poll_result(signed, options.raw_response).await
    }

    async fn poll_result(&self, transaction: Transaction, raw_response: bool) -> Result<SendOutcome, Error> {
        let client = self.contract.client();
        let config = client.poll_config().clone();

        for attempt in 0..config.attempts {
            if attempt > 0 {
                tokio::time::sleep(config.interval).await;
            }
            let info = client
                .solidity_post(
                    "walletsolidity/gettransactioninfobyid",
                    json!({"value": transaction.tx_id}),
                )
                .await?;
            if info.as_object().is_none_or(|map| map.is_empty()) {
                tracing::trace!(attempt, tx_id = %transaction.tx_id, "transaction info not yet available");
                continue;
            }

            if info.get("result").and_then(Value::as_str) == Some("FAILED") {
                let message = info
                    .get("resMessage")
                    .or_else(|| info.get("res_message"))
                    .and_then(Value::as_str)
                    .map(|message| to_utf8(message).unwrap_or_else(|_| message.to_string()))
                    .unwrap_or_default();
                return Err(Error::Execution {
                    message,
                    transaction: Box::new(transaction),
                    output: Some(info),
                });
            }

            let output = info
                .get("contractResult")
                .or_else(|| info.get("contract_result"))
                .map(|result| result.get(0).and_then(Value::as_str).unwrap_or_default().to_string());
            let Some(output) = output else {
                return Err(Error::Execution {
                    message: format!("Failed to execute: {}", pretty(&info)),
                    transaction: Box::new(transaction),
                    output: Some(info),
                });
            };

            if raw_response {
                let info: TransactionInfo = serde_json::from_value(info)
                    .map_err(|err| Error::Remote(format!("Invalid transaction info: {err}")))?;
                return Ok(SendOutcome::Info(info));
            }
            return self.method.decode_output(&output).map(SendOutcome::Output);
        }

        Err(Error::ResultNotFound {
            transaction: Box::new(transaction),
        })
    }

    /// Poll the event server for this event and invoke `callback` for each
    /// new record, with address arguments rewritten to prefixed hex.
    ///
    /// The first poll only primes the watermark. Poll failures are passed to
    /// the callback and polling continues.
    pub async fn watch<F>(&self, options: WatchOptions, callback: F) -> Result<WatchHandle, Error>
    where
        F: Fn(Result<EventRecord, Error>) + Send + Sync + 'static,
    {
        let address = self
            .contract
            .address()
            .ok_or_else(|| Error::validation("Smart contract is missing address"))?
            .to_string();
        if !self.method.entry.is_event() {
            return Err(Error::validation("Invalid method type for event watching"));
        }
        let client = self.contract.client();
        if client.event_server().is_none() {
            return Err(Error::NoEventServer);
        }

        // Without a resource node both confirmed and unconfirmed events are read.
        let unconfirmed = options
            .resource_node
            .as_deref()
            .map(|node| node.to_ascii_lowercase().contains("full"));
        let query = EventQuery {
            event_name: Some(self.method.name().to_string()),
            block_number: Some("latest".to_string()),
            since: Some(now_millis() - 1000),
            sort: Some("block_timestamp".to_string()),
            filters: options.filters,
            only_unconfirmed: unconfirmed == Some(true),
            only_confirmed: unconfirmed == Some(false),
            ..Default::default()
        };
        let mut poller = EventPoller::new();
        poller.set_resource_node(options.resource_node);

        let server = client.event();
        let primer = server.get_events_by_contract_address(&address, &query).await?;
        poller.filter(primer);

        let inputs = self.method.inputs().to_vec();
        let event = self.method.name().to_string();
        Ok(spawn_listener(
            server,
            address,
            query,
            Arc::new(Mutex::new(poller)),
            client.listener_interval(),
            move |record| match record {
                Ok(record) => callback(Ok(record.with_decoded_addresses(&inputs))),
                Err(err) => {
                    tracing::warn!(event = %event, error = %err, "event watch poll failed");
                    callback(Err(err));
                }
            },
        ))
    }
}

/// Detect a reverted constant call and build its message.
///
/// Empty output is a plain revert. Output of `8 + 64n` hex characters is a
/// selector followed by ABI words; each word is read as text.
fn revert_reason(output: &str) -> Option<String> {
    if output.is_empty() {
        return Some(REVERT_MESSAGE.to_string());
    }
    if output.len() % 64 != 8 {
        return None;
    }
    let body = output.get(8..)?;
    let text: String = (0..body.len())
        .step_by(64)
        .filter_map(|start| body.get(start..start + 64))
        .map(|word| to_utf8(word).unwrap_or_default())
        .collect();
    Some(format!("{REVERT_MESSAGE} Error message: {}", collapse_padding(&text)))
}

/// Turn NUL and form-feed padding into single spaces and drop trailing
/// whitespace.
fn collapse_padding(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_space = false;
    for c in text.chars() {
        let c = if matches!(c, '\0' | '\u{0b}' | '\u{0c}') { ' ' } else { c };
        if c == ' ' {
            if after_space {
                continue;
            }
            after_space = true;
        } else {
            after_space = false;
        }
        out.push(c);
    }
    out.trim_end().to_string()
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
