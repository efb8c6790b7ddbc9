//! The main MCASH client.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;

use crate::contract::Contract;
use crate::error::Error;
use crate::types::Address;
use crate::types::address::is_address;

use super::event::EventServer;
use super::plugin::{Component, Plugin, PluginReport, PluginTable};
use super::provider::{DEFAULT_TIMEOUT, HttpProvider, Provider, ProviderRequest, RetryConfig};
use super::query::Wallet;
use super::signer::{GeneratedAccount, PrivateKey};
use super::transaction::TransactionBuilder;

/// Result polling for [`MethodCall::send`](crate::MethodCall::send).
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Number of `gettransactioninfobyid` lookups before giving up.
    pub attempts: u32,
    /// Delay between lookups.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_secs(3),
        }
    }
}

/// Snapshot of the configured providers.
#[derive(Clone, Debug)]
pub struct CurrentProviders {
    pub full_node: Arc<dyn Provider>,
    pub solidity_node: Arc<dyn Provider>,
    pub event_server: Option<Arc<dyn Provider>>,
}

/// Reachability of each provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub full_node: bool,
    pub solidity_node: bool,
    /// `None` when no event server is configured.
    pub event_server: Option<bool>,
}

#[derive(Clone, Default)]
struct DefaultAccount {
    private_key: Option<PrivateKey>,
    address: Option<Address>,
}

struct Shared {
    providers: RwLock<CurrentProviders>,
    account: RwLock<DefaultAccount>,
    poll_config: PollConfig,
    listener_interval: Duration,
    contract_cache: Mutex<HashMap<String, Value>>,
    plugins: RwLock<PluginTable>,
}

/// Client for an MCASH full node, solidity node and event server.
///
/// Cloning is cheap: clones share providers, the default account, the
/// contract cache and installed plugins.
///
/// # Example
///
/// ```rust,no_run
/// use mcash_kit::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), mcash_kit::Error> {
///     let mcash = Mcash::full_host("https://api.mcash.network")
///         .private_key("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
///         .build()?;
///
///     let balance = mcash.wallet().get_balance(None).await?;
///     println!("Balance: {}", from_matoshi(balance));
///
///     mcash
///         .wallet()
///         .send_transaction("MRMnDQKREu7JAg8s5qNaVzh2Gkg1MTiYqE", 1_000, AccountOptions::default())
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Mcash {
    shared: Arc<Shared>,
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Mcash {
    /// Create a builder around a full node URL.
    ///
    /// The solidity node defaults to the full node; no event server is set.
    pub fn builder(full_node: impl Into<String>) -> McashBuilder {
        McashBuilder::new(full_node.into())
    }

    /// Create a builder that uses one host for all three services.
    pub fn full_host(host: impl Into<String>) -> McashBuilder {
        let host = host.into();
        McashBuilder::new(host.clone())
            .solidity_node(host.clone())
            .event_server(host)
    }

    /// Create a configured client from environment variables.
    ///
    /// - `MCASH_FULL_HOST`: one host for all services, or
    /// - `MCASH_FULL_NODE`: the full node alone.
    /// - `MCASH_SOLIDITY_NODE`, `MCASH_EVENT_SERVER` (optional): override
    ///   the corresponding service.
    /// - `MCASH_PRIVATE_KEY` (optional): default signing key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if neither `MCASH_FULL_HOST` nor
    /// `MCASH_FULL_NODE` is set, and the usual build errors otherwise.
    pub fn from_env() -> Result<Mcash, Error> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut builder = match (var("MCASH_FULL_HOST"), var("MCASH_FULL_NODE")) {
            (_, Some(full_node)) => Mcash::builder(full_node),
            (Some(host), None) => Mcash::full_host(host),
            (None, None) => {
                return Err(Error::Config(
                    "MCASH_FULL_HOST or MCASH_FULL_NODE must be set".into(),
                ));
            }
        };
        if let Some(host) = var("MCASH_FULL_HOST") {
            builder = builder.solidity_node(host.clone()).event_server(host);
        }
        if let Some(solidity) = var("MCASH_SOLIDITY_NODE") {
            builder = builder.solidity_node(solidity);
        }
        if let Some(event) = var("MCASH_EVENT_SERVER") {
            builder = builder.event_server(event);
        }
        if let Some(key) = var("MCASH_PRIVATE_KEY") {
            builder = builder.private_key(key);
        }
        builder.build()
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Chain queries, signing and broadcasting.
    pub fn wallet(&self) -> Wallet {
        Wallet::new(self.clone())
    }

    /// Unsigned transaction construction.
    pub fn transaction_builder(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.clone())
    }

    /// Event server queries.
    pub fn event(&self) -> EventServer {
        EventServer::new(self.clone())
    }

    /// Create a contract handle from an ABI (array, JSON string or `null`)
    /// and an optional address.
    pub fn contract(&self, abi: &Value, address: Option<&str>) -> Result<Contract, Error> {
        Contract::new(self.clone(), abi, address)
    }

    // ========================================================================
    // Providers
    // ========================================================================

    pub fn full_node(&self) -> Arc<dyn Provider> {
        read(&self.shared.providers).full_node.clone()
    }

    pub fn solidity_node(&self) -> Arc<dyn Provider> {
        read(&self.shared.providers).solidity_node.clone()
    }

    pub fn event_server(&self) -> Option<Arc<dyn Provider>> {
        read(&self.shared.providers).event_server.clone()
    }

    pub fn set_full_node(&self, provider: impl Provider + 'static) {
        write(&self.shared.providers).full_node = Arc::new(provider);
    }

    pub fn set_solidity_node(&self, provider: impl Provider + 'static) {
        write(&self.shared.providers).solidity_node = Arc::new(provider);
    }

    /// Set or clear the event server.
    pub fn set_event_server(&self, provider: Option<Arc<dyn Provider>>) {
        write(&self.shared.providers).event_server = provider;
    }

    pub fn current_providers(&self) -> CurrentProviders {
        read(&self.shared.providers).clone()
    }

    /// Probe each provider's status page.
    pub async fn is_connected(&self) -> ConnectionStatus {
        let providers = self.current_providers();
        let full_node = providers.full_node.is_connected("wallet/getnowblock").await;
        let solidity_node = providers
            .solidity_node
            .is_connected("walletsolidity/getnowblock")
            .await;
        let event_server = match &providers.event_server {
            Some(event) => Some(event.is_connected("healthcheck").await),
            None => None,
        };
        ConnectionStatus {
            full_node,
            solidity_node,
            event_server,
        }
    }

    // ========================================================================
    // Default account
    // ========================================================================

    /// Set the default signing key and derive the default address from it.
    pub fn set_private_key(&self, private_key: &str) -> Result<(), Error> {
        let key = PrivateKey::from_hex(private_key)?;
        let mut account = write(&self.shared.account);
        account.address = Some(key.address());
        account.private_key = Some(key);
        Ok(())
    }

    /// Set the default address. A default key that does not control the new
    /// address is cleared.
    pub fn set_address(&self, address: &str) -> Result<(), Error> {
        if !is_address(address) {
            return Err(Error::validation("Invalid address provided"));
        }
        let address: Address = address.parse()?;
        let mut account = write(&self.shared.account);
        if account
            .private_key
            .as_ref()
            .is_some_and(|key| key.address() != address)
        {
            account.private_key = None;
        }
        account.address = Some(address);
        Ok(())
    }

    /// The default address, in both forms through [`Address`].
    pub fn default_address(&self) -> Option<Address> {
        read(&self.shared.account).address
    }

    pub fn default_private_key(&self) -> Option<PrivateKey> {
        read(&self.shared.account).private_key.clone()
    }

    /// `given`, or the default address in hex, or `null`.
    pub(crate) fn address_or_default(&self, given: Option<&str>) -> Value {
        match given {
            Some(address) => Value::from(address),
            None => self
                .default_address()
                .map(|address| Value::from(address.to_hex()))
                .unwrap_or(Value::Null),
        }
    }

    // ========================================================================
    // Utilities
    // ========================================================================

    /// Keccak-256 of a UTF-8 string as hex.
    pub fn sha3(s: &str, prefix: bool) -> String {
        crate::utils::sha3(s, prefix)
    }

    pub fn to_utf8(hex: &str) -> Result<String, Error> {
        crate::utils::to_utf8(hex)
    }

    pub fn from_utf8(s: &str) -> String {
        crate::utils::from_utf8(s)
    }

    /// Convert MCASH (decimal string) to matoshi.
    pub fn to_matoshi(mcash: &str) -> Result<u64, Error> {
        Ok(crate::types::to_matoshi(mcash)?)
    }

    pub fn from_matoshi(matoshi: u64) -> String {
        crate::types::from_matoshi(matoshi)
    }

    pub fn is_address(candidate: &str) -> bool {
        is_address(candidate)
    }

    /// Generate a new random key pair.
    pub fn create_account() -> GeneratedAccount {
        GeneratedAccount::generate()
    }

    // ========================================================================
    // Plugins
    // ========================================================================

    /// Install a plugin's overrides.
    pub fn register_plugin(&self, plugin: &dyn Plugin, options: &Value) -> Result<PluginReport, Error> {
        Ok(write(&self.shared.plugins).register(plugin, options)?)
    }

    /// Call a plugin method.
    pub async fn invoke(&self, component: Component, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let handler = read(&self.shared.plugins).get(component, name);
        match handler {
            Some(handler) => handler(self.clone(), args).await,
            None => Err(Error::validation(format!(
                "No plugin method {component}.{name} registered"
            ))),
        }
    }

    /// Run a plugin override of `name` if one is installed, `builtin`
    /// otherwise.
    pub(crate) async fn dispatch<F>(
        &self,
        component: Component,
        name: &str,
        args: Vec<Value>,
        builtin: F,
    ) -> Result<Value, Error>
    where
        F: Future<Output = Result<Value, Error>>,
    {
        let handler = read(&self.shared.plugins).get(component, name);
        match handler {
            Some(handler) => handler(self.clone(), args).await,
            None => builtin.await,
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    pub(crate) fn poll_config(&self) -> &PollConfig {
        &self.shared.poll_config
    }

    pub(crate) fn listener_interval(&self) -> Duration {
        self.shared.listener_interval
    }

    pub(crate) fn cached_contract(&self, address: &str) -> Option<Value> {
        self.shared
            .contract_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    pub(crate) fn cache_contract(&self, address: &str, contract: Value) {
        self.shared
            .contract_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_string(), contract);
    }

    pub(crate) async fn full_post(&self, path: &str, body: Value) -> Result<Value, Error> {
        let provider = self.full_node();
        Ok(provider.request(ProviderRequest::post(path, body)).await?)
    }

    pub(crate) async fn full_get(&self, path: &str) -> Result<Value, Error> {
        let provider = self.full_node();
        Ok(provider.request(ProviderRequest::get(path)).await?)
    }

    pub(crate) async fn solidity_post(&self, path: &str, body: Value) -> Result<Value, Error> {
        let provider = self.solidity_node();
        Ok(provider.request(ProviderRequest::post(path, body)).await?)
    }

    pub(crate) async fn solidity_get(&self, path: &str) -> Result<Value, Error> {
        let provider = self.solidity_node();
        Ok(provider.request(ProviderRequest::get(path)).await?)
    }
}

impl std::fmt::Debug for Mcash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers = self.current_providers();
        f.debug_struct("Mcash")
            .field("full_node", &providers.full_node.host())
            .field("solidity_node", &providers.solidity_node.host())
            .field(
                "event_server",
                &providers.event_server.as_ref().map(|p| p.host().to_string()),
            )
            .field("default_address", &self.default_address())
            .finish()
    }
}

// ============================================================================
// McashBuilder
// ============================================================================

enum ProviderSource {
    Url(String),
    Custom(Arc<dyn Provider>),
}

/// Builder for creating a [`Mcash`] client.
///
/// # Example
///
/// ```rust,no_run
/// use mcash_kit::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), mcash_kit::Error> {
/// let mcash = Mcash::builder("https://api.mcash.network")
///     .solidity_node("https://solidity.mcash.network")
///     .event_server("https://events.mcash.network")
///     .poll_config(PollConfig { attempts: 10, interval: Duration::from_secs(1) })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct McashBuilder {
    full_node: ProviderSource,
    solidity_node: Option<ProviderSource>,
    event_server: Option<ProviderSource>,
    private_key: Option<String>,
    address: Option<String>,
    retry_config: RetryConfig,
    timeout: Duration,
    poll_config: PollConfig,
    listener_interval: Duration,
}

impl McashBuilder {
    fn new(full_node: String) -> Self {
        Self {
            full_node: ProviderSource::Url(full_node),
            solidity_node: None,
            event_server: None,
            private_key: None,
            address: None,
            retry_config: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_config: PollConfig::default(),
            listener_interval: Duration::from_secs(3),
        }
    }

    /// Start from a custom full node provider.
    pub fn with_provider(provider: impl Provider + 'static) -> Self {
        let mut builder = Self::new(String::new());
        builder.full_node = ProviderSource::Custom(Arc::new(provider));
        builder
    }

    pub fn solidity_node(mut self, url: impl Into<String>) -> Self {
        self.solidity_node = Some(ProviderSource::Url(url.into()));
        self
    }

    pub fn event_server(mut self, url: impl Into<String>) -> Self {
        self.event_server = Some(ProviderSource::Url(url.into()));
        self
    }

    pub fn solidity_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.solidity_node = Some(ProviderSource::Custom(Arc::new(provider)));
        self
    }

    pub fn event_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.event_server = Some(ProviderSource::Custom(Arc::new(provider)));
        self
    }

    /// Default signing key (hex). Also sets the default address.
    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    /// Default address, for read-only use.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Transport retries. The default performs none.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.poll_config = config;
        self
    }

    /// Interval between event listener polls.
    pub fn listener_interval(mut self, interval: Duration) -> Self {
        self.listener_interval = interval;
        self
    }

    fn provider(
        &self,
        source: &ProviderSource,
        label: &str,
    ) -> Result<Arc<dyn Provider>, Error> {
        match source {
            ProviderSource::Custom(provider) => Ok(provider.clone()),
            ProviderSource::Url(url) => {
                HttpProvider::with_config(url.clone(), self.timeout, self.retry_config.clone())
                    .map(|p| Arc::new(p) as Arc<dyn Provider>)
                    .map_err(|_| Error::Config(format!("Invalid {label} provided")))
            }
        }
    }

    /// Build the client.
    pub fn build(self) -> Result<Mcash, Error> {
        let full_node = self.provider(&self.full_node, "full node")?;
        let solidity_node = match &self.solidity_node {
            Some(source) => self.provider(source, "solidity node")?,
            None => full_node.clone(),
        };
        let event_server = match &self.event_server {
            Some(source) => Some(self.provider(source, "event server")?),
            None => None,
        };

        let mcash = Mcash {
            shared: Arc::new(Shared {
                providers: RwLock::new(CurrentProviders {
                    full_node,
                    solidity_node,
                    event_server,
                }),
                account: RwLock::new(DefaultAccount::default()),
                poll_config: self.poll_config,
                listener_interval: self.listener_interval,
                contract_cache: Mutex::new(HashMap::new()),
                plugins: RwLock::new(PluginTable::default()),
            }),
        };

        if let Some(address) = &self.address {
            mcash.set_address(address)?;
        }
        if let Some(key) = &self.private_key {
            mcash.set_private_key(key)?;
        }
        Ok(mcash)
    }
}
