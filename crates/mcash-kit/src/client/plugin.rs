//! Plugin capability table.
//!
//! A [`Plugin`] states which crate versions it supports and hands the client
//! a list of named overrides, each targeted at one [`Component`]. Registered
//! overrides are consulted by the overridable wallet queries and by
//! [`Mcash::invoke`](crate::Mcash::invoke).
//!
//! ```rust
//! use mcash_kit::{Component, Mcash, Override, Plugin};
//! use serde_json::{Value, json};
//!
//! struct Greeter;
//!
//! impl Plugin for Greeter {
//!     fn requires(&self) -> &str {
//!         ">=0.1"
//!     }
//!
//!     fn overrides(&self, _options: &Value) -> Vec<Override> {
//!         vec![Override::new(Component::Wallet, "greet", |_, _| {
//!             Box::pin(async { Ok(json!("hello")) })
//!         })]
//!     }
//! }
//!
//! # async fn example() -> Result<(), mcash_kit::Error> {
//! let mcash = Mcash::full_host("http://127.0.0.1:8090").build()?;
//! let report = mcash.register_plugin(&Greeter, &Value::Null)?;
//! assert_eq!(report.plugged, vec!["greet".to_string()]);
//! assert_eq!(mcash.invoke(Component::Wallet, "greet", vec![]).await?, json!("hello"));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use semver::{Version, VersionReq};
use serde_json::Value;

use crate::error::{Error, PluginError};

use super::mcash::Mcash;

/// Names a plugin may never override.
const NO_OVERRIDE: &[&str] = &["register", "constructor"];

/// Component a plugin method attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    Wallet,
    TransactionBuilder,
    Event,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Wallet => "wallet",
            Component::TransactionBuilder => "transaction_builder",
            Component::Event => "event",
        };
        f.write_str(name)
    }
}

/// Handler behind a plugin method. It receives a handle to the client and
/// the call arguments.
pub type OverrideFn =
    Arc<dyn Fn(Mcash, Vec<Value>) -> BoxFuture<'static, Result<Value, Error>> + Send + Sync>;

/// One named method offered by a plugin.
#[derive(Clone)]
pub struct Override {
    pub component: Component,
    pub name: String,
    pub handler: OverrideFn,
}

impl Override {
    pub fn new<F>(component: Component, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Mcash, Vec<Value>) -> BoxFuture<'static, Result<Value, Error>> + Send + Sync + 'static,
    {
        Self {
            component,
            name: name.into(),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Override")
            .field("component", &self.component)
            .field("name", &self.name)
            .finish()
    }
}

/// A bundle of overrides with a version requirement.
pub trait Plugin {
    /// Semver requirement on the crate version, e.g. `">=0.3, <0.4"`.
    fn requires(&self) -> &str {
        "*"
    }

    /// The methods to install. `options` is passed through from
    /// [`Mcash::register_plugin`](crate::Mcash::register_plugin).
    fn overrides(&self, options: &Value) -> Vec<Override>;
}

/// Outcome of a registration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PluginReport {
    pub plugged: Vec<String>,
    pub skipped: Vec<String>,
}

/// Installed overrides, keyed by component and method name.
#[derive(Default)]
pub(crate) struct PluginTable {
    entries: HashMap<(Component, String), OverrideFn>,
}

impl PluginTable {
    pub(crate) fn register(
        &mut self,
        plugin: &dyn Plugin,
        options: &Value,
    ) -> Result<PluginReport, PluginError> {
        check_compatible(plugin.requires(), env!("CARGO_PKG_VERSION"))?;

        let mut report = PluginReport::default();
        for item in plugin.overrides(options) {
            if item.name.starts_with('_') || NO_OVERRIDE.contains(&item.name.as_str()) {
                report.skipped.push(item.name);
                continue;
            }
            tracing::debug!(component = %item.component, name = %item.name, "plugin method installed");
            self.entries
                .insert((item.component, item.name.clone()), item.handler);
            report.plugged.push(item.name);
        }
        Ok(report)
    }

    pub(crate) fn get(&self, component: Component, name: &str) -> Option<OverrideFn> {
        self.entries.get(&(component, name.to_string())).cloned()
    }
}

fn check_compatible(requires: &str, version: &str) -> Result<(), PluginError> {
    let req = VersionReq::parse(requires)
        .map_err(|_| PluginError::InvalidRequirement(requires.to_string()))?;
    let current =
        Version::parse(version).map_err(|_| PluginError::InvalidRequirement(version.to_string()))?;
    if !req.matches(&current) {
        return Err(PluginError::Incompatible {
            requires: requires.to_string(),
            version: version.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Sample {
        requires: &'static str,
    }

    impl Plugin for Sample {
        fn requires(&self) -> &str {
            self.requires
        }

        fn overrides(&self, options: &Value) -> Vec<Override> {
            let reply = options.clone();
            vec![
                Override::new(Component::Wallet, "get_account", move |_, _| {
                    let reply = reply.clone();
                    Box::pin(async move { Ok(reply) })
                }),
                Override::new(Component::Wallet, "_internal", |_, _| {
                    Box::pin(async { Ok(Value::Null) })
                }),
                Override::new(Component::Event, "register", |_, _| {
                    Box::pin(async { Ok(Value::Null) })
                }),
            ]
        }
    }

    #[test]
    fn test_register_skips_private_and_blacklisted() {
        let mut table = PluginTable::default();
        let report = table
            .register(&Sample { requires: "*" }, &json!({"balance": 1}))
            .unwrap();
        assert_eq!(report.plugged, vec!["get_account"]);
        assert_eq!(report.skipped, vec!["_internal", "register"]);
        assert!(table.get(Component::Wallet, "get_account").is_some());
        assert!(table.get(Component::Wallet, "_internal").is_none());
        assert!(table.get(Component::TransactionBuilder, "get_account").is_none());
    }

    #[test]
    fn test_register_rejects_incompatible_version() {
        let mut table = PluginTable::default();
        let err = table
            .register(&Sample { requires: "^99" }, &Value::Null)
            .unwrap_err();
        assert!(matches!(err, PluginError::Incompatible { .. }));
        assert!(table.get(Component::Wallet, "get_account").is_none());
    }

    #[test]
    fn test_register_rejects_bad_requirement() {
        let mut table = PluginTable::default();
        let err = table
            .register(&Sample { requires: "not a range" }, &Value::Null)
            .unwrap_err();
        assert_eq!(err, PluginError::InvalidRequirement("not a range".into()));
    }

    #[test]
    fn test_check_compatible() {
        assert!(check_compatible(">=0.3.0", "0.3.0").is_ok());
        assert!(check_compatible("^0.2", "0.3.0").is_err());
        assert!(check_compatible("*", "0.3.0").is_ok());
    }
}
