//! Integration tests for transfers, signing and queries.

use mcash_kit::utils::from_utf8;
use mcash_kit::*;

use crate::common::{ALICE_KEY, BOB_KEY, MemoryNode, address_of};

// =============================================================================
// Transfers
// =============================================================================

#[tokio::test]
async fn test_transfer_moves_balance() {
    let node = MemoryNode::new();
    let alice = address_of(ALICE_KEY);
    let bob = address_of(BOB_KEY);
    node.fund(&alice, 1_000);

    let client = node.client(Some(ALICE_KEY));
    let result = client
        .wallet()
        .send_transaction(&bob.to_base58(), 400, AccountOptions::default())
        .await
        .unwrap();

    assert!(result.result);
    assert_eq!(node.balance(&alice), 600);
    assert_eq!(client.wallet().get_balance(Some(&bob.to_base58())).await.unwrap(), 400);

    let sent = result.transaction.unwrap();
    let stored = client.wallet().get_transaction(&sent.tx_id).await.unwrap();
    assert_eq!(stored.signature, sent.signature);
    assert_eq!(stored.owner_address(), Some(alice.to_hex().as_str()));
}

#[tokio::test]
async fn test_transfer_rejected_by_node() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));
    let bob = address_of(BOB_KEY);

    let result = client
        .wallet()
        .send_transaction(&bob.to_base58(), 5, AccountOptions::default())
        .await
        .unwrap();

    assert!(!result.result);
    assert_eq!(result.code.as_deref(), Some("CONTRACT_VALIDATE_ERROR"));
    assert!(result.transaction.is_none());
    assert_eq!(node.balance(&bob), 0);
}

#[tokio::test]
async fn test_transfer_signed_with_explicit_key() {
    let node = MemoryNode::new();
    let bob = address_of(BOB_KEY);
    let alice = address_of(ALICE_KEY);
    node.fund(&bob, 50);

    // The default account is Alice, but Bob's key decides the sender.
    let client = node.client(Some(ALICE_KEY));
    let result = client
        .wallet()
        .send_transaction(
            &alice.to_base58(),
            20,
            AccountOptions {
                private_key: Some(BOB_KEY.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(result.result);
    assert_eq!(node.balance(&bob), 30);
    assert_eq!(node.balance(&alice), 20);
}

#[tokio::test]
async fn test_transfer_requires_signer() {
    let node = MemoryNode::new();
    let client = node.client(None);
    let bob = address_of(BOB_KEY);

    let err = client
        .wallet()
        .send_transaction(&bob.to_base58(), 1, AccountOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoSigner));
    assert!(node.paths().is_empty());
}

// =============================================================================
// Signing
// =============================================================================

#[tokio::test]
async fn test_sign_with_wrong_key_is_refused() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));
    let bob = address_of(BOB_KEY);

    let unsigned = client
        .transaction_builder()
        .send_mcash(&bob.to_base58(), 1, TransferOptions::default())
        .await
        .unwrap();
    let err = client
        .wallet()
        .sign(
            unsigned,
            SignOptions {
                private_key: Some(BOB_KEY.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Private key does not match address in transaction");
}

#[tokio::test]
async fn test_unsigned_broadcast_is_refused() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));
    let bob = address_of(BOB_KEY);

    let unsigned = client
        .transaction_builder()
        .send_mcash(&bob.to_base58(), 1, TransferOptions::default())
        .await
        .unwrap();
    let err = client.wallet().send_raw_transaction(unsigned).await.unwrap_err();
    assert!(matches!(err, Error::State(_)));
    assert!(!node.paths().contains(&"wallet/broadcasttransaction".to_string()));
}

#[tokio::test]
async fn test_message_signature_round_trip() {
    let node = MemoryNode::new();
    let client = node.client(Some(ALICE_KEY));
    let wallet = client.wallet();
    let message = from_utf8("hello mcash");

    let signature = wallet.sign_message(&message, SignOptions::default()).await.unwrap();
    assert!(wallet.verify_message(&message, &signature, None, true).await.unwrap());

    let bob = address_of(BOB_KEY).to_base58();
    let err = wallet
        .verify_message(&message, &signature, Some(&bob), true)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Signature does not match");
}

// =============================================================================
// Client
// =============================================================================

#[tokio::test]
async fn test_connection_status() {
    let node = MemoryNode::new();
    let status = node.client(None).is_connected().await;
    assert!(status.full_node);
    assert!(status.solidity_node);
    assert_eq!(status.event_server, Some(true));
}

#[tokio::test]
async fn test_current_block() {
    let node = MemoryNode::new();
    let block = node.client(None).wallet().get_current_block().await.unwrap();
    assert_eq!(block["block_header"]["raw_data"]["number"], 100);
}
