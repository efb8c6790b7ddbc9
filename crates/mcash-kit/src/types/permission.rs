//! Account permissions and multi-signature status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ReturnStatus;

/// One key of a permission group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionKey {
    /// Hex address of the key holder.
    pub address: String,
    pub weight: u64,
}

/// A permission group on an account.
///
/// `permission_type` is 0 for owner, 1 for witness and 2 for active
/// permissions. Active permissions also carry an `operations` bitmask.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "type", default)]
    pub permission_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default)]
    pub permission_name: String,
    #[serde(default)]
    pub threshold: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<String>,
    #[serde(default)]
    pub keys: Vec<PermissionKey>,
}

impl Permission {
    /// Whether `address` (hex) is one of the keys.
    pub fn contains(&self, address: &str) -> bool {
        let address = address.to_lowercase();
        self.keys
            .iter()
            .any(|key| key.address.to_lowercase() == address)
    }
}

/// Response of `wallet/getsignweight`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignWeight {
    #[serde(default)]
    pub result: ReturnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
    #[serde(default)]
    pub approved_list: Vec<String>,
    #[serde(default)]
    pub current_weight: u64,
    /// Wrapped transaction (`{"result": .., "transaction": ..}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Value>,
}

impl SignWeight {
    /// Whether `address` (hex) has already approved.
    pub fn has_approved(&self, address: &str) -> bool {
        let address = address.to_lowercase();
        self.approved_list
            .iter()
            .any(|approved| approved.to_lowercase() == address)
    }
}

/// Response of `wallet/getapprovedlist`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovedList {
    #[serde(default)]
    pub result: ReturnStatus,
    #[serde(default)]
    pub approved_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_weight_deserialize() {
        let weight: SignWeight = serde_json::from_value(json!({
            "result": {},
            "permission": {
                "type": 2,
                "id": 2,
                "permission_name": "active",
                "threshold": 2,
                "operations": "7fff1fc0033e0000000000000000000000000000000000000000000000000000",
                "keys": [
                    {"address": "32BF82FD6597CD3200C468220ECD7CF47C1A4CB149", "weight": 1}
                ]
            },
            "approved_list": ["32bf82fd6597cd3200c468220ecd7cf47c1a4cb149"],
            "current_weight": 1
        }))
        .unwrap();

        let permission = weight.permission.as_ref().unwrap();
        assert_eq!(permission.permission_type, 2);
        assert!(permission.contains("32bf82fd6597cd3200c468220ecd7cf47c1a4cb149"));
        assert!(!permission.contains("3200"));
        assert!(weight.has_approved("32BF82FD6597CD3200C468220ECD7CF47C1A4CB149"));
    }
}
