//! Transaction types.
//!
//! The node owns the transaction layout; the client reads a few fields
//! (id, owner, signatures) and passes the rest back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A transaction as returned by the node's builder endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id (hex sha256 of the raw data).
    #[serde(rename = "txID", alias = "tx_id", default)]
    pub tx_id: String,
    /// Node-defined raw fields.
    #[serde(default)]
    pub raw_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data_hex: Option<String>,
    /// Hex signatures, one per signer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<String>,
    /// Set on contract deployment transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    /// Any other fields the node attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// A transaction is signed iff it carries at least one signature.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    fn first_contract(&self) -> Option<&Value> {
        self.raw_data.get("contract").and_then(|c| c.get(0))
    }

    /// Owner address declared by the first contract (hex).
    pub fn owner_address(&self) -> Option<&str> {
        self.first_contract()?
            .get("parameter")?
            .get("value")?
            .get("owner_address")?
            .as_str()
    }

    /// Type name of the first contract, e.g. `TransferContract`.
    pub fn contract_type(&self) -> Option<&str> {
        self.first_contract()?.get("type")?.as_str()
    }

    /// Permission id stamped on the first contract (0 when absent).
    pub fn permission_id(&self) -> u32 {
        self.first_contract()
            .and_then(|c| c.get("Permission_id"))
            .and_then(Value::as_u64)
            .map(|id| id as u32)
            .unwrap_or(0)
    }

    /// Stamp a permission id on the first contract.
    pub fn set_permission_id(&mut self, permission_id: u32) {
        if let Some(contract) = self
            .raw_data
            .get_mut("contract")
            .and_then(|c| c.get_mut(0))
            .and_then(Value::as_object_mut)
        {
            contract.insert("Permission_id".to_string(), Value::from(permission_id));
        }
    }
}

/// Status block shared by builder and broadcast responses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatus {
    #[serde(default)]
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Hex-encoded UTF-8 message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response of `wallet/triggersmartcontract` and
/// `wallet/triggerconstantcontract`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub result: ReturnStatus,
    #[serde(default)]
    pub constant_result: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

/// Response of `wallet/broadcasttransaction`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BroadcastResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The transaction that was broadcast, attached on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

/// Execution receipt from `gettransactioninfobyid`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fee: u64,
    #[serde(rename = "blockNumber", default)]
    pub block_number: u64,
    #[serde(rename = "blockTimeStamp", default)]
    pub block_timestamp: u64,
    #[serde(rename = "contractResult", alias = "contract_result", default)]
    pub contract_result: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    /// `"FAILED"` when execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Hex-encoded failure message.
    #[serde(rename = "resMessage", alias = "res_message", default, skip_serializing_if = "Option::is_none")]
    pub res_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionInfo {
    pub fn is_failed(&self) -> bool {
        self.result.as_deref() == Some("FAILED")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transfer() -> Transaction {
        serde_json::from_value(json!({
            "txID": "abcd",
            "raw_data": {
                "contract": [{
                    "type": "TransferContract",
                    "parameter": {"value": {
                        "owner_address": "32bf82fd6597cd3200c468220ecd7cf47c1a4cb149",
                        "amount": 10
                    }}
                }],
                "expiration": 1
            },
            "visible": false
        }))
        .unwrap()
    }

    #[test]
    fn test_transaction_accessors() {
        let tx = transfer();
        assert_eq!(tx.tx_id, "abcd");
        assert!(!tx.is_signed());
        assert_eq!(
            tx.owner_address(),
            Some("32bf82fd6597cd3200c468220ecd7cf47c1a4cb149")
        );
        assert_eq!(tx.contract_type(), Some("TransferContract"));
        assert_eq!(tx.extra.get("visible"), Some(&json!(false)));
    }

    #[test]
    fn test_serializes_node_field_names() {
        let value = serde_json::to_value(transfer()).unwrap();
        assert_eq!(value["txID"], "abcd");
        assert_eq!(value["visible"], false);
        assert!(value.get("signature").is_none());
    }

    #[test]
    fn test_set_permission_id() {
        let mut tx = transfer();
        assert_eq!(tx.permission_id(), 0);
        tx.set_permission_id(2);
        assert_eq!(tx.permission_id(), 2);
        assert_eq!(tx.raw_data["contract"][0]["Permission_id"], json!(2));
    }

    #[test]
    fn test_transaction_info_failed() {
        let info: TransactionInfo = serde_json::from_value(json!({
            "id": "abcd",
            "result": "FAILED",
            "resMessage": "52455645525420",
            "contractResult": [""]
        }))
        .unwrap();
        assert!(info.is_failed());
        assert_eq!(info.contract_result, Some(vec![String::new()]));
    }
}
