//! Declarative parameter checks.
//!
//! Builders describe their inputs as a list of [`Check`]s and run them with
//! [`validate`] before touching the network. Checks run in order and the
//! first failure wins, so the order of a list decides which message a caller
//! sees when several inputs are bad at once.
//!
//! ```
//! use mcash_kit::validator::{Check, validate};
//!
//! let err = validate(&[
//!     Check::address("recipient", "nope"),
//!     Check::integer("amount", -5).gt(0),
//! ])
//! .unwrap_err();
//! assert_eq!(err.to_string(), "Invalid recipient address provided");
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Error;
use crate::types::address::{is_address, to_hex};
use crate::utils::is_hex;

/// The rule a [`Check`] applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    Address,
    Integer,
    PositiveInteger,
    String,
    NotEmptyString,
    Url,
    Hex,
    Array,
    Boolean,
    /// `BANDWIDTH` or `ENERGY`.
    Resource,
    TokenId,
    /// Two earlier checks must not carry the same (normalised) value.
    NotEqual,
}

/// One parameter check.
#[derive(Clone, Debug)]
pub struct Check {
    name: String,
    rule: Rule,
    value: Value,
    pair: Option<(String, String)>,
    gt: Option<i128>,
    gte: Option<i128>,
    lt: Option<i128>,
    lte: Option<i128>,
    optional: bool,
    msg: Option<String>,
}

impl Check {
    pub fn new(name: impl Into<String>, rule: Rule, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            rule,
            value: value.into(),
            pair: None,
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            optional: false,
            msg: None,
        }
    }

    pub fn address(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::Address, value)
    }

    pub fn integer(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::Integer, value)
    }

    pub fn positive_integer(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::PositiveInteger, value)
    }

    pub fn string(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::String, value)
    }

    pub fn not_empty_string(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::NotEmptyString, value)
    }

    pub fn url(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::Url, value)
    }

    pub fn hex(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::Hex, value)
    }

    pub fn array(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::Array, value)
    }

    pub fn boolean(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::Boolean, value)
    }

    pub fn resource(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::Resource, value)
    }

    pub fn token_id(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, Rule::TokenId, value)
    }

    /// Fail when the checks named `first` and `second` (run earlier in the
    /// same list) carry equal values. Addresses compare in hex form.
    pub fn not_equal(first: impl Into<String>, second: impl Into<String>) -> Self {
        let mut check = Self::new("", Rule::NotEqual, Value::Null);
        check.pair = Some((first.into(), second.into()));
        check
    }

    pub fn gt(mut self, bound: i128) -> Self {
        self.gt = Some(bound);
        self
    }

    pub fn gte(mut self, bound: i128) -> Self {
        self.gte = Some(bound);
        self
    }

    pub fn lt(mut self, bound: i128) -> Self {
        self.lt = Some(bound);
        self
    }

    pub fn lte(mut self, bound: i128) -> Self {
        self.lte = Some(bound);
        self
    }

    /// Skip the check when the value is absent.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Replace the default failure message.
    pub fn msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    fn is_absent(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::Bool(false) => self.rule != Rule::Boolean,
            _ => false,
        }
    }

    fn in_bounds(&self, n: i128) -> bool {
        self.gt.is_none_or(|b| n > b)
            && self.gte.is_none_or(|b| n >= b)
            && self.lt.is_none_or(|b| n < b)
            && self.lte.is_none_or(|b| n <= b)
    }

    fn failure(&self) -> Error {
        if let Some(msg) = &self.msg {
            return Error::validation(msg.clone());
        }
        match self.rule {
            Rule::Address => Error::validation(format!("Invalid {} address provided", self.name)),
            Rule::PositiveInteger => {
                Error::validation(format!("{} must be a positive integer", self.name))
            }
            Rule::NotEqual => {
                let (first, second) = self.pair.clone().unwrap_or_default();
                Error::validation(format!("{first} can not be equal to {second}"))
            }
            _ => Error::validation(format!("Invalid {} provided", self.name)),
        }
    }
}

/// Run checks in order and report the first failure.
pub fn validate(checks: &[Check]) -> Result<(), Error> {
    let mut normalized: HashMap<&str, Value> = HashMap::new();

    for check in checks {
        if check.optional && check.is_absent() {
            continue;
        }
        normalized.insert(check.name.as_str(), check.value.clone());

        let ok = match check.rule {
            Rule::Address => match check.value.as_str() {
                Some(s) if is_address(s) => {
                    if let Ok(hex) = to_hex(s) {
                        normalized.insert(check.name.as_str(), Value::String(hex));
                    }
                    true
                }
                _ => false,
            },
            Rule::Integer => as_integer(&check.value).is_some_and(|n| check.in_bounds(n)),
            Rule::PositiveInteger => as_integer(&check.value).is_some_and(|n| n > 0),
            Rule::String => check
                .value
                .as_str()
                .is_some_and(|s| check.in_bounds(s.chars().count() as i128)),
            Rule::NotEmptyString | Rule::TokenId => {
                check.value.as_str().is_some_and(|s| !s.is_empty())
            }
            Rule::Url => check.value.as_str().is_some_and(is_valid_url),
            Rule::Hex => check.value.as_str().is_some_and(is_hex),
            Rule::Array => check.value.is_array(),
            Rule::Boolean => check.value.is_boolean(),
            Rule::Resource => matches!(check.value.as_str(), Some("BANDWIDTH" | "ENERGY")),
            Rule::NotEqual => match &check.pair {
                Some((first, second)) => {
                    normalized.get(first.as_str()) != normalized.get(second.as_str())
                }
                None => true,
            },
        };

        if !ok {
            return Err(check.failure());
        }
    }

    Ok(())
}

fn as_integer(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

/// `http`/`https` URL with a host; a TLD is not required.
pub(crate) fn is_valid_url(candidate: &str) -> bool {
    match reqwest::Url::parse(candidate) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
