//! Contract event records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::abi::AbiParam;
use crate::types::address::ADDRESS_PREFIX;

/// A normalised event from the event server.
///
/// Equality is structural over every field; the poller relies on it to drop
/// duplicates within a page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Block height.
    pub block: u64,
    /// Block timestamp in milliseconds.
    pub timestamp: u64,
    /// Emitting contract (base58).
    pub contract: String,
    /// Event name.
    pub name: String,
    /// Transaction id.
    pub transaction: String,
    /// Event arguments as reported by the server.
    pub result: Value,
    /// `fullNode` or `solidityNode`.
    #[serde(rename = "resourceNode", default, skip_serializing_if = "Option::is_none")]
    pub resource_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unconfirmed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl EventRecord {
    /// Map a raw event server record.
    pub fn from_raw(raw: &Value) -> Self {
        let str_field = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let unconfirmed = raw
            .get("_unconfirmed")
            .and_then(Value::as_bool)
            .filter(|u| *u);
        let resource_node = raw
            .get("resource_Node")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                Some(if unconfirmed.is_some() { "fullNode" } else { "solidityNode" }.to_string())
            });

        Self {
            block: raw.get("block_number").and_then(Value::as_u64).unwrap_or(0),
            timestamp: raw
                .get("block_timestamp")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            contract: str_field("contract_address"),
            name: str_field("event_name"),
            transaction: str_field("transaction_id"),
            result: raw.get("result").cloned().unwrap_or(Value::Null),
            resource_node,
            unconfirmed,
            fingerprint: raw
                .get("_fingerprint")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Key the result by input name and rewrite address-typed arguments to
    /// the prefixed hex form.
    pub fn with_decoded_addresses(mut self, inputs: &[AbiParam]) -> Self {
        match &mut self.result {
            Value::Object(map) => {
                for input in inputs.iter().filter(|i| i.kind == "address") {
                    if let Some(Value::String(s)) = map.get_mut(&input.name) {
                        *s = prefixed_hex(s);
                    }
                }
            }
            Value::Array(items) => {
                let mut map = Map::new();
                for (input, item) in inputs.iter().zip(items.iter()) {
                    let value = match (input.kind.as_str(), item) {
                        ("address", Value::String(s)) => Value::String(prefixed_hex(s)),
                        _ => item.clone(),
                    };
                    map.insert(input.name.clone(), value);
                }
                self.result = Value::Object(map);
            }
            _ => {}
        }
        self
    }
}

fn prefixed_hex(s: &str) -> String {
    let body = s.get(2..).unwrap_or_default();
    format!("{ADDRESS_PREFIX}{}", body.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw() {
        let record = EventRecord::from_raw(&json!({
            "block_number": 120,
            "block_timestamp": 1_550_000_000_000u64,
            "contract_address": "MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE",
            "event_name": "Transfer",
            "transaction_id": "ff",
            "result": {"value": "1"},
            "_unconfirmed": true
        }));
        assert_eq!(record.block, 120);
        assert_eq!(record.name, "Transfer");
        assert_eq!(record.resource_node.as_deref(), Some("fullNode"));
        assert_eq!(record.unconfirmed, Some(true));
        assert_eq!(record.fingerprint, None);
    }

    #[test]
    fn test_from_raw_defaults_to_solidity_node() {
        let record = EventRecord::from_raw(&json!({"block_number": 1}));
        assert_eq!(record.resource_node.as_deref(), Some("solidityNode"));
    }

    #[test]
    fn test_with_decoded_addresses() {
        let inputs: Vec<AbiParam> = serde_json::from_value(json!([
            {"name": "from", "type": "address"},
            {"name": "value", "type": "uint256"}
        ]))
        .unwrap();
        let mut record = EventRecord::from_raw(&json!({"block_number": 1}));
        record.result = json!(["0xBF82FD6597CD3200C468220ECD7CF47C1A4CB149", "5"]);
        let record = record.with_decoded_addresses(&inputs);
        assert_eq!(
            record.result,
            json!({"from": "32bf82fd6597cd3200c468220ecd7cf47c1a4cb149", "value": "5"})
        );
    }
}
