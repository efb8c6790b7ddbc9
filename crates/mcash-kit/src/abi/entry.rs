//! Contract ABI descriptions.

use std::fmt::{self, Display};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{AbiError, Error};

use super::ParamType;

/// Kind of ABI entry. Nodes report these capitalised (`"Function"`), so
/// parsing ignores case.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    Function,
    Constructor,
    Event,
    Fallback,
    Receive,
    Other(String),
}

impl EntryType {
    pub fn as_str(&self) -> &str {
        match self {
            EntryType::Function => "function",
            EntryType::Constructor => "constructor",
            EntryType::Event => "event",
            EntryType::Fallback => "fallback",
            EntryType::Receive => "receive",
            EntryType::Other(s) => s,
        }
    }
}

impl From<&str> for EntryType {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "function" => EntryType::Function,
            "constructor" => EntryType::Constructor,
            "event" => EntryType::Event,
            "fallback" => EntryType::Fallback,
            "receive" => EntryType::Receive,
            _ => EntryType::Other(s.to_string()),
        }
    }
}

impl Serialize for EntryType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntryType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EntryType::from(s.as_str()))
    }
}

/// State mutability of a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl StateMutability {
    /// `pure` and `view` functions are read with a constant call.
    pub fn is_constant(&self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::NonPayable => "nonpayable",
            StateMutability::Payable => "payable",
        }
    }
}

impl Display for StateMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StateMutability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StateMutability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.to_ascii_lowercase().as_str() {
            "pure" => Ok(StateMutability::Pure),
            "view" => Ok(StateMutability::View),
            "nonpayable" => Ok(StateMutability::NonPayable),
            "payable" => Ok(StateMutability::Payable),
            other => Err(serde::de::Error::custom(format!(
                "unknown state mutability '{other}'"
            ))),
        }
    }
}

/// A named, typed parameter of an ABI entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    /// The canonical type string, with `tuple` expanded into its components.
    pub fn canonical_type(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => {
                let members: Vec<String> =
                    self.components.iter().map(AbiParam::canonical_type).collect();
                format!("({}){}", members.join(","), suffix)
            }
            None => self.kind.clone(),
        }
    }

    /// Parse the canonical type.
    pub fn param_type(&self) -> Result<ParamType, AbiError> {
        ParamType::parse(&self.canonical_type())
    }
}

/// One entry of a contract ABI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<AbiParam>,
    #[serde(
        rename = "stateMutability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_mutability: Option<StateMutability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

impl AbiEntry {
    /// The entry's state mutability, falling back to the legacy
    /// `constant`/`payable` flags.
    pub fn mutability(&self) -> StateMutability {
        if let Some(m) = self.state_mutability {
            return m;
        }
        if self.constant == Some(true) {
            StateMutability::View
        } else if self.payable == Some(true) {
            StateMutability::Payable
        } else {
            StateMutability::NonPayable
        }
    }

    /// Whether the entry accepts a call value.
    pub fn is_payable(&self) -> bool {
        self.payable == Some(true) || self.state_mutability == Some(StateMutability::Payable)
    }

    pub fn is_constructor(&self) -> bool {
        self.entry_type == Some(EntryType::Constructor)
    }

    pub fn is_event(&self) -> bool {
        self.entry_type == Some(EntryType::Event)
    }

    /// Canonical input types.
    pub fn input_types(&self) -> Vec<String> {
        self.inputs.iter().map(AbiParam::canonical_type).collect()
    }

    /// Canonical output types.
    pub fn output_types(&self) -> Vec<String> {
        self.outputs.iter().map(AbiParam::canonical_type).collect()
    }

    /// Output names, or `None` when every output is unnamed.
    pub fn output_names(&self) -> Option<Vec<String>> {
        self.outputs
            .iter()
            .any(|o| !o.name.is_empty())
            .then(|| self.outputs.iter().map(|o| o.name.clone()).collect())
    }
}

/// Parse an ABI from JSON.
///
/// Accepts an entry array, a JSON string holding one, or the node's
/// `{"entrys": [...]}` wrapper.
pub fn parse_abi(value: &Value) -> Result<Vec<AbiEntry>, Error> {
    match value {
        Value::String(s) => {
            let parsed: Value = serde_json::from_str(s)
                .map_err(|_| Error::validation("Invalid options.abi provided"))?;
            parse_abi(&parsed)
        }
        Value::Object(map) if map.contains_key("entrys") => parse_abi(&map["entrys"]),
        Value::Array(_) => serde_json::from_value(value.clone())
            .map_err(|e| Error::validation(format!("Invalid options.abi provided: {e}"))),
        Value::Null => Ok(Vec::new()),
        _ => Err(Error::validation("Invalid options.abi provided")),
    }
}
