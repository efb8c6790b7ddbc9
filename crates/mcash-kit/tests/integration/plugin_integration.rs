//! Integration tests for plugin registration and dispatch.

use mcash_kit::*;
use serde_json::{Value, json};

use crate::common::{ALICE_KEY, MemoryNode, address_of};

/// Reports a fixed balance and adds a `greet` method.
struct FixedBalance {
    requires: &'static str,
}

impl Plugin for FixedBalance {
    fn requires(&self) -> &str {
        self.requires
    }

    fn overrides(&self, options: &Value) -> Vec<Override> {
        let balance = options["balance"].clone();
        vec![
            Override::new(Component::Wallet, "get_account", move |_, args| {
                let balance = balance.clone();
                Box::pin(async move { Ok(json!({"address": args[0], "balance": balance})) })
            }),
            Override::new(Component::Wallet, "greet", |client, args| {
                Box::pin(async move {
                    let name = args.first().and_then(Value::as_str).unwrap_or("stranger").to_string();
                    let from = client.default_address().map(|a| a.to_base58()).unwrap_or_default();
                    Ok(json!(format!("hello {name} from {from}")))
                })
            }),
            Override::new(Component::Wallet, "_private", |_, _| Box::pin(async { Ok(Value::Null) })),
            Override::new(Component::Wallet, "register", |_, _| Box::pin(async { Ok(Value::Null) })),
        ]
    }
}

#[tokio::test]
async fn test_plugin_overrides_builtin_query() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));

    let report = client
        .register_plugin(&FixedBalance { requires: ">=0.3" }, &json!({"balance": 42}))
        .unwrap();
    assert_eq!(report.plugged, vec!["get_account", "greet"]);
    assert_eq!(report.skipped, vec!["_private", "register"]);

    assert_eq!(client.wallet().get_balance(None).await.unwrap(), 42);
    assert!(!node.paths().contains(&"wallet/getaccount".to_string()));
}

#[tokio::test]
async fn test_plugin_adds_methods() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));
    client
        .register_plugin(&FixedBalance { requires: "*" }, &json!({}))
        .unwrap();

    let greeting = client
        .invoke(Component::Wallet, "greet", vec![json!("bob")])
        .await
        .unwrap();
    assert_eq!(
        greeting,
        json!(format!("hello bob from {}", address_of(ALICE_KEY).to_base58()))
    );

    let err = client.invoke(Component::Event, "greet", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_incompatible_plugin_is_rejected() {
    let node = MemoryNode::new();
    let client = node.client(None);
    let err = client
        .register_plugin(&FixedBalance { requires: "<0.1" }, &json!({}))
        .unwrap_err();
    assert!(matches!(err, Error::Plugin(_)));

    // Nothing was installed.
    let err = client.invoke(Component::Wallet, "greet", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
