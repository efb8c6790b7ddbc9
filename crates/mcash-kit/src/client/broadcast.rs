//! Signing and broadcasting.
//!
//! These methods extend [`Wallet`]: single and multi-signature transaction
//! signing, message signatures, broadcast, and the one-call helpers that
//! build, sign and broadcast the common transactions.

use serde_json::Value;

use crate::error::{Error, PermissionErrorKind, RpcError};
use crate::types::address::is_address;
use crate::types::{ApprovedList, BroadcastResult, SignWeight, Transaction};
use crate::utils::is_hex;

use super::query::Wallet;
use super::signer::{PrivateKey, sign_message, sign_transaction, verify_signature};
use super::transaction::{FreezeOptions, Resource, TransferOptions, UnfreezeOptions};

/// Options for [`Wallet::sign`] and [`Wallet::sign_message`].
#[derive(Clone, Debug)]
pub struct SignOptions {
    /// Hex signing key. Defaults to the client's default key.
    pub private_key: Option<String>,
    /// Append to an existing signature list instead of refusing.
    pub multisig: bool,
    /// Use the MCASH message header rather than the Ethereum one.
    pub use_mcash_header: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            private_key: None,
            multisig: false,
            use_mcash_header: true,
        }
    }
}

/// Account used by the build, sign and broadcast helpers.
///
/// Each field falls back to the client's default. When a key is available
/// the transaction is built for the key's address and signed with it; an
/// address alone only names the origin.
#[derive(Clone, Debug, Default)]
pub struct AccountOptions {
    pub private_key: Option<String>,
    pub address: Option<String>,
}

/// Origin address and optional signing key resolved from [`AccountOptions`].
struct Account {
    address: String,
    private_key: Option<String>,
}

impl Wallet {
    fn signing_key(&self, private_key: Option<&str>) -> Result<PrivateKey, Error> {
        match private_key {
            Some(hex) => Ok(PrivateKey::from_hex(hex)?),
            None => self.client.default_private_key().ok_or(Error::NoSigner),
        }
    }

    fn account(&self, options: AccountOptions) -> Result<Account, Error> {
        let private_key = options.private_key.or_else(|| {
            self.client
                .default_private_key()
                .map(|key| key.to_hex())
        });
        let address = options.address.or_else(|| {
            self.client
                .default_address()
                .map(|address| address.to_hex())
        });

        match (private_key, address) {
            (Some(key), _) => Ok(Account {
                address: PrivateKey::from_hex(&key)?.address().to_hex(),
                private_key: Some(key),
            }),
            (None, Some(address)) => Ok(Account {
                address,
                private_key: None,
            }),
            (None, None) => Err(Error::NoSigner),
        }
    }

    async fn sign_and_send(&self, transaction: Transaction, account: &Account) -> Result<BroadcastResult, Error> {
        let signed = self
            .sign(
                transaction,
                SignOptions {
                    private_key: account.private_key.clone(),
                    ..Default::default()
                },
            )
            .await?;
        self.send_raw_transaction(signed).await
    }

    // ========================================================================
    // Signing
    // ========================================================================

    /// Sign a transaction.
    ///
    /// Outside multisig mode the transaction must be unsigned and the key
    /// must belong to the declared owner. The signature is appended to the
    /// existing list.
    pub async fn sign(&self, mut transaction: Transaction, options: SignOptions) -> Result<Transaction, Error> {
        let key = self.signing_key(options.private_key.as_deref())?;

        if !options.multisig && transaction.is_signed() {
            return Err(Error::state("Transaction is already signed"));
        }
        if !options.multisig {
            let address = key.address().to_hex().to_lowercase();
            let owner = transaction
                .owner_address()
                .map(str::to_lowercase)
                .unwrap_or_default();
            if address != owner {
                return Err(Error::validation(
                    "Private key does not match address in transaction",
                ));
            }
        }

        sign_transaction(&key, &mut transaction)?;
        tracing::debug!(tx_id = %transaction.tx_id, signatures = transaction.signature.len(), "transaction signed");
        Ok(transaction)
    }

    /// Sign a hex message. Returns the `0x`-prefixed signature.
    pub async fn sign_message(&self, message: &str, options: SignOptions) -> Result<String, Error> {
        if !is_hex(message) {
            return Err(Error::validation("Expected hex message input"));
        }
        let key = self.signing_key(options.private_key.as_deref())?;
        sign_message(message, &key, options.use_mcash_header)
    }

    /// Check a message signature against `address`, or the default address.
    pub async fn verify_message(
        &self,
        message: &str,
        signature: &str,
        address: Option<&str>,
        use_mcash_header: bool,
    ) -> Result<bool, Error> {
        if !is_hex(message) {
            return Err(Error::validation("Expected hex message input"));
        }
        let address = match address {
            Some(address) => address.to_string(),
            None => self
                .client
                .default_address()
                .map(|address| address.to_base58())
                .ok_or_else(|| Error::validation("Invalid address provided"))?,
        };
        if verify_signature(message, &address, signature, use_mcash_header) {
            Ok(true)
        } else {
            Err(Error::validation("Signature does not match"))
        }
    }

    /// Add one signature under `permission_id`.
    ///
    /// The node is asked for the current sign weight first; the key must be
    /// part of the permission and must not have approved already. The
    /// transaction returned by the node replaces the input before signing.
    pub async fn multi_sign(
        &self,
        mut transaction: Transaction,
        private_key: Option<&str>,
        permission_id: u32,
    ) -> Result<Transaction, Error> {
        if !has_contracts(&transaction) {
            return Err(Error::validation("Invalid transaction provided"));
        }
        let key = self.signing_key(private_key)?;
        transaction.set_permission_id(permission_id);

        let weight = self.get_sign_weight(&transaction, Some(permission_id)).await?;
        if weight.result.code.as_deref() == Some("PERMISSION_ERROR") {
            let message = weight.result.message.clone().unwrap_or_default();
            return Err(Error::Permission {
                kind: PermissionErrorKind::classify(&message),
                message,
            });
        }

        let address = key.address();
        let hex = address.to_hex();
        let allowed = weight
            .permission
            .as_ref()
            .is_some_and(|permission| permission.contains(&hex));
        if !allowed {
            return Err(Error::validation(format!(
                "{} has no permission to sign",
                address.to_base58()
            )));
        }
        if weight.has_approved(&hex) {
            return Err(Error::validation(format!(
                "{} already sign transaction",
                address.to_base58()
            )));
        }

        let mut transaction: Transaction = weight
            .transaction
            .as_ref()
            .and_then(|wrapped| wrapped.get("transaction"))
            .cloned()
            .and_then(|inner| serde_json::from_value(inner).ok())
            .ok_or_else(|| Error::validation("Invalid transaction provided"))?;
        transaction.set_permission_id(permission_id);

        sign_transaction(&key, &mut transaction)?;
        tracing::debug!(tx_id = %transaction.tx_id, permission_id, "multi-signature added");
        Ok(transaction)
    }

    /// Current approval weight of a (partially) signed transaction.
    ///
    /// With `None`, a missing permission id is stamped as 0.
    pub async fn get_sign_weight(&self, transaction: &Transaction, permission_id: Option<u32>) -> Result<SignWeight, Error> {
        if !has_contracts(transaction) {
            return Err(Error::validation("Invalid transaction provided"));
        }
        let mut transaction = transaction.clone();
        let permission_id = permission_id.unwrap_or_else(|| transaction.permission_id());
        transaction.set_permission_id(permission_id);

        let response = self
            .client
            .full_post("wallet/getsignweight", to_body(&transaction)?)
            .await?;
        parse(response)
    }

    /// Addresses that have signed the transaction.
    pub async fn get_approved_list(&self, transaction: &Transaction) -> Result<ApprovedList, Error> {
        let response = self
            .client
            .full_post("wallet/getapprovedlist", to_body(transaction)?)
            .await?;
        parse(response)
    }

    // ========================================================================
    // Broadcast
    // ========================================================================

    /// Broadcast a signed transaction. On success the transaction is
    /// attached to the result.
    pub async fn send_raw_transaction(&self, transaction: Transaction) -> Result<BroadcastResult, Error> {
        if !transaction.is_signed() {
            return Err(Error::state("Transaction is not signed"));
        }
        let response = self
            .client
            .full_post("wallet/broadcasttransaction", to_body(&transaction)?)
            .await?;
        let mut result: BroadcastResult = parse(response)?;
        if result.result {
            tracing::info!(tx_id = %transaction.tx_id, "transaction broadcast");
            result.transaction = Some(transaction);
        } else {
            tracing::warn!(
                tx_id = %transaction.tx_id,
                code = result.code.as_deref().unwrap_or_default(),
                "broadcast rejected"
            );
        }
        Ok(result)
    }

    /// Build, sign and broadcast an MCASH transfer.
    pub async fn send_transaction(&self, to: &str, amount: u64, options: AccountOptions) -> Result<BroadcastResult, Error> {
        if !is_address(to) {
            return Err(Error::validation("Invalid recipient provided"));
        }
        if amount == 0 {
            return Err(Error::validation("Invalid amount provided"));
        }
        let account = self.account(options)?;
        let transaction = self
            .client
            .transaction_builder()
            .send_mcash(
                to,
                amount,
                TransferOptions {
                    from: Some(account.address.clone()),
                    memo: None,
                },
            )
            .await?;
        self.sign_and_send(transaction, &account).await
    }

    /// Build, sign and broadcast a token transfer.
    pub async fn send_token(
        &self,
        to: &str,
        amount: u64,
        token_id: &str,
        options: AccountOptions,
    ) -> Result<BroadcastResult, Error> {
        if !is_address(to) {
            return Err(Error::validation("Invalid recipient provided"));
        }
        if amount == 0 {
            return Err(Error::validation("Invalid amount provided"));
        }
        let token_id: u64 = token_id
            .trim()
            .parse()
            .map_err(|_| Error::validation("Invalid token ID provided"))?;
        let account = self.account(options)?;
        let transaction = self
            .client
            .transaction_builder()
            .send_token(
                to,
                amount,
                &token_id.to_string(),
                TransferOptions {
                    from: Some(account.address.clone()),
                    memo: None,
                },
            )
            .await?;
        self.sign_and_send(transaction, &account).await
    }

    /// Build, sign and broadcast a freeze. `duration` is at least 3 days.
    pub async fn freeze_balance(
        &self,
        amount: u64,
        duration: u64,
        resource: Resource,
        receiver: Option<&str>,
        options: AccountOptions,
    ) -> Result<BroadcastResult, Error> {
        if amount == 0 {
            return Err(Error::validation("Invalid amount provided"));
        }
        if duration < 3 {
            return Err(Error::validation(
                "Invalid duration provided, minimum of 3 days",
            ));
        }
        let account = self.account(options)?;
        let transaction = self
            .client
            .transaction_builder()
            .freeze_balance(
                amount,
                FreezeOptions {
                    duration,
                    resource,
                    owner: Some(account.address.clone()),
                    receiver: receiver.map(str::to_string),
                },
            )
            .await?;
        self.sign_and_send(transaction, &account).await
    }

    /// Build, sign and broadcast an unfreeze.
    pub async fn unfreeze_balance(
        &self,
        resource: Resource,
        receiver: Option<&str>,
        options: AccountOptions,
    ) -> Result<BroadcastResult, Error> {
        let account = self.account(options)?;
        let transaction = self
            .client
            .transaction_builder()
            .unfreeze_balance(UnfreezeOptions {
                resource,
                owner: Some(account.address.clone()),
                receiver: receiver.map(str::to_string),
            })
            .await?;
        self.sign_and_send(transaction, &account).await
    }

    /// Build, sign and broadcast a stake. `duration` is at least 3 days.
    pub async fn stake(&self, amount: u64, duration: u64, options: AccountOptions) -> Result<BroadcastResult, Error> {
        if amount == 0 {
            return Err(Error::validation("Invalid amount provided"));
        }
        if duration < 3 {
            return Err(Error::validation(
                "Invalid duration provided, minimum of 3 days",
            ));
        }
        let account = self.account(options)?;
        let transaction = self
            .client
            .transaction_builder()
            .stake(amount, duration, Some(&account.address))
            .await?;
        self.sign_and_send(transaction, &account).await
    }

    pub async fn unstake(&self, options: AccountOptions) -> Result<BroadcastResult, Error> {
        let account = self.account(options)?;
        let transaction = self
            .client
            .transaction_builder()
            .unstake(Some(&account.address))
            .await?;
        self.sign_and_send(transaction, &account).await
    }

    /// Build, sign and broadcast an account rename. Names can be set once.
    pub async fn update_account(&self, name: &str, options: AccountOptions) -> Result<BroadcastResult, Error> {
        if name.is_empty() {
            return Err(Error::validation("Name must be a string"));
        }
        let account = self.account(options)?;
        let transaction = self
            .client
            .transaction_builder()
            .update_account(name, Some(&account.address))
            .await?;
        self.sign_and_send(transaction, &account).await
    }
}

fn has_contracts(transaction: &Transaction) -> bool {
    transaction
        .raw_data
        .get("contract")
        .is_some_and(Value::is_array)
}

fn to_body(transaction: &Transaction) -> Result<Value, Error> {
    serde_json::to_value(transaction).map_err(|e| Error::Rpc(RpcError::Json(e)))
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::Rpc(RpcError::InvalidResponse(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::McashBuilder;
    use crate::test_utils::MockProvider;
    use serde_json::json;

    const PRIVATE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const OTHER_KEY: &str = "1c78d4d86dc31acb08a9eb132b9306bd1c86ea426083e0e0b32308606d212a98";
    const RECIPIENT: &str = "MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE";

    fn key_hex(key: &str) -> String {
        PrivateKey::from_hex(key).unwrap().address().to_hex()
    }

    fn wallet(provider: &MockProvider) -> Wallet {
        McashBuilder::with_provider(provider.clone())
            .private_key(PRIVATE_KEY)
            .build()
            .unwrap()
            .wallet()
    }

    fn unsigned_json(owner: &str) -> Value {
        json!({
            "txID": "ab".repeat(32),
            "raw_data": {"contract": [{
                "type": "TransferContract",
                "parameter": {"value": {"owner_address": owner, "amount": 5}}
            }]}
        })
    }

    fn unsigned(owner: &str) -> Transaction {
        serde_json::from_value(unsigned_json(owner)).unwrap()
    }

    // ========================================================================
    // Signing tests
    // ========================================================================

    #[tokio::test]
    async fn test_sign_appends_signature() {
        let provider = MockProvider::new();
        let wallet = wallet(&provider);
        let signed = wallet
            .sign(unsigned(&key_hex(PRIVATE_KEY)), SignOptions::default())
            .await
            .unwrap();
        assert_eq!(signed.signature.len(), 1);
        assert_eq!(signed.signature[0].len(), 130);

        let err = wallet
            .sign(signed.clone(), SignOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Transaction is already signed");

        let twice = wallet
            .sign(
                signed,
                SignOptions {
                    multisig: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(twice.signature.len(), 2);
    }

    #[tokio::test]
    async fn test_sign_rejects_foreign_owner() {
        let provider = MockProvider::new();
        let err = wallet(&provider)
            .sign(unsigned(&key_hex(OTHER_KEY)), SignOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Private key does not match address in transaction"
        );
    }

    #[tokio::test]
    async fn test_sign_owner_match_is_case_insensitive() {
        let provider = MockProvider::new();
        let owner = key_hex(PRIVATE_KEY).to_uppercase();
        assert!(wallet(&provider)
            .sign(unsigned(&owner), SignOptions::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_sign_and_verify_message() {
        let provider = MockProvider::new();
        let wallet = wallet(&provider);
        let signature = wallet
            .sign_message("0xdeadbeef", SignOptions::default())
            .await
            .unwrap();
        assert!(signature.starts_with("0x"));
        assert!(wallet
            .verify_message("0xdeadbeef", &signature, None, true)
            .await
            .unwrap());

        let err = wallet
            .verify_message("0xdeadbeef", &signature, None, false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Signature does not match");

        let err = wallet
            .sign_message("hello", SignOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected hex message input");
    }

    #[tokio::test]
    async fn test_sign_without_key() {
        let provider = MockProvider::new();
        let wallet = McashBuilder::with_provider(provider.clone())
            .build()
            .unwrap()
            .wallet();
        let err = wallet
            .sign(unsigned(&key_hex(PRIVATE_KEY)), SignOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSigner));
    }

    // ========================================================================
    // Multi-signature tests
    // ========================================================================

    fn sign_weight(keys: &[String], approved: &[String]) -> Value {
        let mut inner = unsigned_json(&key_hex(OTHER_KEY));
        inner["raw_data"]["contract"][0]["Permission_id"] = json!(2);
        json!({
            "result": {},
            "permission": {
                "type": 2,
                "id": 2,
                "permission_name": "active",
                "threshold": 2,
                "operations": "7fff1fc0033e",
                "keys": keys.iter().map(|k| json!({"address": k, "weight": 1})).collect::<Vec<_>>()
            },
            "approved_list": approved,
            "current_weight": approved.len(),
            "transaction": {"result": {"result": true}, "transaction": inner}
        })
    }

    #[tokio::test]
    async fn test_multi_sign_signs_node_transaction() {
        let provider = MockProvider::new();
        provider.respond(
            "wallet/getsignweight",
            sign_weight(&[key_hex(PRIVATE_KEY), key_hex(OTHER_KEY)], &[]),
        );
        let signed = wallet(&provider)
            .multi_sign(unsigned(&key_hex(OTHER_KEY)), None, 2)
            .await
            .unwrap();
        assert_eq!(signed.signature.len(), 1);
        assert_eq!(signed.permission_id(), 2);

        let sent = provider.requests()[0].body.clone().unwrap();
        assert_eq!(sent["raw_data"]["contract"][0]["Permission_id"], 2);
    }

    #[tokio::test]
    async fn test_multi_sign_rejections() {
        let provider = MockProvider::new();
        let wallet = wallet(&provider);
        let address = PrivateKey::from_hex(PRIVATE_KEY)
            .unwrap()
            .address()
            .to_base58();

        provider.respond("wallet/getsignweight", sign_weight(&[key_hex(OTHER_KEY)], &[]));
        let err = wallet
            .multi_sign(unsigned(&key_hex(OTHER_KEY)), None, 2)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), format!("{address} has no permission to sign"));

        provider.respond(
            "wallet/getsignweight",
            sign_weight(&[key_hex(PRIVATE_KEY)], &[key_hex(PRIVATE_KEY)]),
        );
        let err = wallet
            .multi_sign(unsigned(&key_hex(OTHER_KEY)), None, 2)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), format!("{address} already sign transaction"));

        provider.respond(
            "wallet/getsignweight",
            json!({"result": {"code": "PERMISSION_ERROR", "message": "permission isn't exit"}}),
        );
        let err = wallet
            .multi_sign(unsigned(&key_hex(OTHER_KEY)), None, 9)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Permission {
                kind: PermissionErrorKind::PermissionIsntExit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_multi_sign_requires_contracts() {
        let provider = MockProvider::new();
        let tx: Transaction = serde_json::from_value(json!({"txID": "00", "raw_data": {}})).unwrap();
        let err = wallet(&provider).multi_sign(tx, None, 0).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid transaction provided");
        assert!(provider.requests().is_empty());
    }

    // ========================================================================
    // Broadcast tests
    // ========================================================================

    #[tokio::test]
    async fn test_send_raw_transaction_requires_signature() {
        let provider = MockProvider::new();
        let err = wallet(&provider)
            .send_raw_transaction(unsigned(&key_hex(PRIVATE_KEY)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Transaction is not signed");
    }

    #[tokio::test]
    async fn test_send_transaction_pipeline() {
        let provider = MockProvider::new();
        provider.respond("wallet/createtransaction", unsigned_json(&key_hex(PRIVATE_KEY)));
        provider.respond("wallet/broadcasttransaction", json!({"result": true}));

        let result = wallet(&provider)
            .send_transaction(RECIPIENT, 1_000, AccountOptions::default())
            .await
            .unwrap();
        assert!(result.result);
        let transaction = result.transaction.unwrap();
        assert_eq!(transaction.signature.len(), 1);

        let paths: Vec<_> = provider.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["wallet/createtransaction", "wallet/broadcasttransaction"]);
    }

    #[tokio::test]
    async fn test_send_transaction_stops_at_first_failure() {
        let provider = MockProvider::new();
        provider.respond("wallet/createtransaction", unsigned_json(&key_hex(OTHER_KEY)));
        let err = wallet(&provider)
            .send_transaction(RECIPIENT, 1_000, AccountOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Private key does not match address in transaction"
        );
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_helper_argument_errors() {
        let provider = MockProvider::new();
        let wallet = wallet(&provider);

        let err = wallet
            .send_transaction("nope", 1, AccountOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid recipient provided");

        let err = wallet
            .send_token(RECIPIENT, 0, "1000001", AccountOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid amount provided");

        let err = wallet
            .send_token(RECIPIENT, 1, "abc", AccountOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid token ID provided");

        let err = wallet
            .freeze_balance(10, 2, Resource::Energy, None, AccountOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid duration provided, minimum of 3 days"
        );

        let err = wallet
            .update_account("", AccountOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Name must be a string");
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_helpers_need_an_account() {
        let provider = MockProvider::new();
        let wallet = McashBuilder::with_provider(provider.clone())
            .build()
            .unwrap()
            .wallet();
        let err = wallet.unstake(AccountOptions::default()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Function requires either a private key or address to be set"
        );
    }

    #[tokio::test]
    async fn test_unstake_uses_stake_endpoint() {
        let provider = MockProvider::new();
        provider.respond("wallet/unstake", unsigned_json(&key_hex(OTHER_KEY)));
        provider.respond("wallet/broadcasttransaction", json!({"result": true}));
        let result = wallet(&provider)
            .unstake(AccountOptions {
                private_key: Some(OTHER_KEY.into()),
                address: None,
            })
            .await
            .unwrap();
        assert!(result.result);
        let body = provider.requests()[0].body.clone().unwrap();
        assert_eq!(body["owner_address"], key_hex(OTHER_KEY));
    }
}
