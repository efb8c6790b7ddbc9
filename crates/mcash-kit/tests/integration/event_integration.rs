//! Integration tests for event queries, watches and contract listeners.

use std::time::Duration;

use mcash_kit::*;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::common::{ALICE_KEY, BOB_KEY, MemoryNode, address_of};

fn abi() -> Value {
    json!([
        {"type": "event", "name": "Transfer",
         "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256"}
         ]}
    ])
}

fn contract_address() -> Address {
    address_of(BOB_KEY)
}

fn transfer_event(block: u64) -> Value {
    let alice = address_of(ALICE_KEY).to_hex();
    json!({
        "block_number": block,
        "block_timestamp": block * 3000,
        "contract_address": contract_address().to_base58(),
        "event_name": "Transfer",
        "transaction_id": format!("{block:064x}"),
        "result": {"from": format!("0x{}", &alice[2..]), "to": format!("0x{}", &alice[2..]), "value": "7"},
        "resource_Node": "solidityNode"
    })
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("listener closed")
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_events_by_contract_address() {
    let node = MemoryNode::new();
    node.emit(&contract_address(), transfer_event(101));
    node.emit(&contract_address(), transfer_event(102));

    let events = node
        .client(None)
        .event()
        .get_events_by_contract_address(&contract_address().to_base58(), &EventQuery::default())
        .await
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].block, 101);
    assert_eq!(events[0].name, "Transfer");
    assert_eq!(events[0].timestamp, 303_000);
    assert_eq!(events[1].resource_node.as_deref(), Some("solidityNode"));
}

// =============================================================================
// Watching
// =============================================================================

#[tokio::test]
async fn test_watch_delivers_only_new_events() {
    let node = MemoryNode::new();
    node.emit(&contract_address(), transfer_event(101));
    let client = node.client(None);
    let contract = client.contract(&abi(), Some(&contract_address().to_base58())).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = contract
        .method("Transfer", vec![])
        .unwrap()
        .watch(WatchOptions::default(), move |event| {
            let _ = tx.send(event);
        })
        .await
        .unwrap();

    node.emit(&contract_address(), transfer_event(105));
    let event = next(&mut rx).await.unwrap();
    assert_eq!(event.block, 105);
    assert_eq!(event.result["from"], json!(address_of(ALICE_KEY).to_hex()));
    handle.stop();
}

#[tokio::test]
async fn test_contract_listener_lifecycle() {
    let node = MemoryNode::new();
    node.emit(&contract_address(), transfer_event(101));
    let client = node.client(None);
    let mut contract = client.contract(&abi(), Some(&contract_address().to_base58())).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    contract
        .start_event_listener(ContractEventOptions::default(), move |event| {
            let _ = tx.send(event.block);
        })
        .await
        .unwrap();
    assert!(contract.is_listening());

    node.emit(&contract_address(), transfer_event(110));
    node.emit(&contract_address(), transfer_event(111));
    assert_eq!(next(&mut rx).await, 110);
    assert_eq!(next(&mut rx).await, 111);

    contract.stop_event_listener();
    assert!(!contract.is_listening());
    node.emit(&contract_address(), transfer_event(120));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
}
