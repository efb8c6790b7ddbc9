//! Integration tests for contract deployment, calls and sends.

use mcash_kit::abi::encode_params;
use mcash_kit::*;
use serde_json::{Value, json};

use crate::common::{ALICE_KEY, BOB_KEY, MemoryNode, address_of};

fn token_abi() -> Value {
    json!([
        {"type": "constructor", "inputs": [{"name": "supply", "type": "uint256"}]},
        {"type": "function", "name": "balanceOf", "stateMutability": "view",
         "inputs": [{"name": "owner", "type": "address"}],
         "outputs": [{"name": "balance", "type": "uint256"}]},
        {"type": "function", "name": "transfer", "stateMutability": "nonpayable",
         "inputs": [{"name": "to", "type": "address"}, {"name": "value", "type": "uint256"}],
         "outputs": [{"name": "ok", "type": "bool"}]},
        {"type": "event", "name": "Transfer",
         "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256"}
         ]}
    ])
}

fn word(value: u64) -> String {
    format!("{value:064x}")
}

async fn deployed_token(node: &MemoryNode) -> Contract {
    let client = node.client(Some(ALICE_KEY));
    let mut token = client.contract(&token_abi(), None).unwrap();
    token
        .deploy(
            DeployOptions {
                bytecode: "6080604052".to_string(),
                parameters: vec![json!(1_000_000)],
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    token
}

// =============================================================================
// Deployment
// =============================================================================

#[tokio::test]
async fn test_deploy_binds_address_and_abi() {
    let node = MemoryNode::new();
    let token = deployed_token(&node).await;

    assert!(token.is_deployed());
    assert_eq!(token.bytecode(), Some("6080604052"));
    let address = token.address().unwrap();
    assert!(Mcash::is_address(address));
    assert!(token.has_method("balanceOf"));
    assert!(token.has_method("transfer(address,uint256)"));
    assert!(token.has_method("a9059cbb"));
}

#[tokio::test]
async fn test_attach_to_deployed_contract() {
    let node = MemoryNode::new();
    let deployed = deployed_token(&node).await;
    let address = deployed.address().unwrap().to_string();

    // A second client knows nothing but the address.
    let client = node.client(Some(BOB_KEY));
    let mut token = client.contract(&json!([]), None).unwrap();
    assert!(!token.has_method("balanceOf"));
    token.at(&address).await.unwrap();
    assert!(token.has_method("balanceOf"));
    assert_eq!(token.address(), Some(address.as_str()));
}

#[tokio::test]
async fn test_attach_to_unknown_contract() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));
    let mut token = client.contract(&token_abi(), None).unwrap();
    let err = token.at(&address_of(BOB_KEY).to_base58()).await.unwrap_err();
    assert_eq!(err.to_string(), "Contract has not been deployed on the network");
}

// =============================================================================
// Calls
// =============================================================================

#[tokio::test]
async fn test_constant_call() {
    let node = MemoryNode::new();
    node.set_constant("balanceOf(address)", word(750));
    let token = deployed_token(&node).await;

    let owner = address_of(ALICE_KEY).to_base58();
    let balance = token
        .method("balanceOf", vec![json!(owner)])
        .unwrap()
        .call(CallOptions::default())
        .await
        .unwrap();
    assert_eq!(balance, json!(750));
}

#[tokio::test]
async fn test_constant_call_revert() {
    let node = MemoryNode::new();
    node.set_constant("balanceOf(address)", String::new());
    let token = deployed_token(&node).await;

    let err = token
        .method("balanceOf", vec![json!(address_of(ALICE_KEY).to_base58())])
        .unwrap()
        .call(CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Revert(_)));
}

#[tokio::test]
async fn test_calls_need_a_bound_contract() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));
    let token = client.contract(&token_abi(), None).unwrap();
    let err = token
        .method("balanceOf", vec![json!(address_of(ALICE_KEY).to_base58())])
        .unwrap()
        .call(CallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Smart contract is missing address");
}

// =============================================================================
// Sends
// =============================================================================

#[tokio::test]
async fn test_send_and_poll_for_result() {
    let node = MemoryNode::new();
    node.set_result("transfer(address,uint256)", word(1));
    let token = deployed_token(&node).await;
    node.delay_info(2);

    let outcome = token
        .method("transfer", vec![json!(address_of(BOB_KEY).to_base58()), json!(25)])
        .unwrap()
        .send(SendOptions {
            should_poll_response: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Output(json!(true)));
}

#[tokio::test]
async fn test_send_without_polling_and_decode_input() {
    let node = MemoryNode::new();
    let token = deployed_token(&node).await;
    let bob = address_of(BOB_KEY);

    let outcome = token
        .method("transfer", vec![json!(bob.to_base58()), json!(25)])
        .unwrap()
        .send(SendOptions::default())
        .await
        .unwrap();
    let id = outcome.transaction_id().unwrap().to_string();

    let sent = node.transaction(&id).unwrap();
    let value = &sent["raw_data"]["contract"][0]["parameter"]["value"];
    let data = format!(
        "{}{}",
        token.get_method("transfer").unwrap().signature(),
        value["parameter"].as_str().unwrap()
    );
    let decoded = token.decode_input(&data).unwrap();
    assert_eq!(decoded.name, "transfer");
    assert_eq!(decoded.params.by_name("to").unwrap().to_json(), json!(bob.to_hex()));
    assert_eq!(decoded.params.by_name("value").unwrap().to_json(), json!(25));

    let expected = encode_params(&["address", "uint256"], &[json!(bob.to_base58()), json!(25)]).unwrap();
    assert_eq!(value["parameter"].as_str().unwrap(), expected.trim_start_matches("0x"));
}

#[tokio::test]
async fn test_send_with_other_signer() {
    let node = MemoryNode::new();
    let token = deployed_token(&node).await;

    let outcome = token
        .method("transfer", vec![json!(address_of(ALICE_KEY).to_base58()), json!(1)])
        .unwrap()
        .send(SendOptions {
            private_key: Some(BOB_KEY.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let sent = node.transaction(outcome.transaction_id().unwrap()).unwrap();
    assert_eq!(
        sent["raw_data"]["contract"][0]["parameter"]["value"]["owner_address"],
        json!(address_of(BOB_KEY).to_hex())
    );
}
