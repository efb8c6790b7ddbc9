//! Event server queries and the event poller.
//!
//! [`EventServer`] reads contract events from the configured event server.
//! [`EventPoller`] turns successive pages into a stream of new records by
//! dropping duplicates and anything at or below the highest block already
//! seen. Contract listeners and [`MethodCall::watch`](crate::MethodCall::watch)
//! both poll through it.

use serde_json::{Value, json};

use crate::error::Error;
use crate::types::EventRecord;
use crate::types::address::{from_hex, is_address};

use super::mcash::Mcash;
use super::plugin::Component;
use super::provider::ProviderRequest;

/// Largest page the event server accepts.
pub const MAX_EVENT_PAGE_SIZE: u32 = 200;

/// Filters for [`EventServer::get_events_by_contract_address`].
#[derive(Clone, Debug)]
pub struct EventQuery {
    pub event_name: Option<String>,
    /// A block height or `latest`. Requires `event_name`.
    pub block_number: Option<String>,
    /// Page size, clamped to [`MAX_EVENT_PAGE_SIZE`].
    pub size: u32,
    pub page: u32,
    /// Result field filters, sent as JSON.
    pub filters: Option<Value>,
    /// Only events at or after this timestamp (ms).
    pub since: Option<i64>,
    pub only_confirmed: bool,
    pub only_unconfirmed: bool,
    /// e.g. `block_timestamp` or `-block_timestamp`.
    pub sort: Option<String>,
    /// Continue after the page that ended with this fingerprint.
    pub fingerprint: Option<String>,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            event_name: None,
            block_number: None,
            size: 20,
            page: 1,
            filters: None,
            since: None,
            only_confirmed: false,
            only_unconfirmed: false,
            sort: None,
            fingerprint: None,
        }
    }
}

impl EventQuery {
    fn to_json(&self) -> Value {
        json!({
            "event_name": self.event_name,
            "block_number": self.block_number,
            "size": self.size,
            "page": self.page,
            "filters": self.filters,
            "since": self.since,
            "only_confirmed": self.only_confirmed,
            "only_unconfirmed": self.only_unconfirmed,
            "sort": self.sort,
            "fingerprint": self.fingerprint,
        })
    }
}

/// Access to the event server.
///
/// Created with [`Mcash::event`]. Fails with [`Error::NoEventServer`] when
/// none is configured.
#[derive(Clone, Debug)]
pub struct EventServer {
    client: Mcash,
}

impl EventServer {
    pub(crate) fn new(client: Mcash) -> Self {
        Self { client }
    }

    /// Events emitted by a contract, newest first unless `sort` says
    /// otherwise.
    pub async fn get_events_by_contract_address(
        &self,
        address: &str,
        query: &EventQuery,
    ) -> Result<Vec<EventRecord>, Error> {
        let raw = self.get_raw_events_by_contract_address(address, query).await?;
        Ok(raw.iter().map(EventRecord::from_raw).collect())
    }

    /// Like [`get_events_by_contract_address`](Self::get_events_by_contract_address)
    /// but returns the server records unmapped.
    pub async fn get_raw_events_by_contract_address(
        &self,
        address: &str,
        query: &EventQuery,
    ) -> Result<Vec<Value>, Error> {
        let args = vec![Value::from(address), query.to_json()];
        let response = self
            .client
            .dispatch(
                Component::Event,
                "get_events_by_contract_address",
                args,
                self.fetch_contract_events(address, query),
            )
            .await?;
        into_records(response)
    }

    async fn fetch_contract_events(&self, address: &str, query: &EventQuery) -> Result<Value, Error> {
        let provider = self.client.event_server().ok_or(Error::NoEventServer)?;
        if !is_address(address) {
            return Err(Error::validation("Invalid contract address provided"));
        }
        if query.block_number.is_some() && query.event_name.is_none() {
            return Err(Error::validation(
                "Usage of block number filtering requires an event name",
            ));
        }

        let mut route = vec![from_hex(address)?];
        if let Some(name) = &query.event_name {
            route.push(name.clone());
        }
        if let Some(block) = &query.block_number {
            route.push(block.clone());
        }

        let size = if query.size > MAX_EVENT_PAGE_SIZE {
            tracing::warn!(size = query.size, "event page size clamped to {MAX_EVENT_PAGE_SIZE}");
            MAX_EVENT_PAGE_SIZE
        } else {
            query.size
        };

        let mut request = ProviderRequest::get(format!("event/contract/{}", route.join("/")))
            .query("size", size.to_string())
            .query("page", query.page.to_string());
        if let Some(filters) = query
            .filters
            .as_ref()
            .filter(|f| f.as_object().is_some_and(|m| !m.is_empty()))
        {
            request = request.query("filters", filters.to_string());
        }
        if let Some(since) = query.since.filter(|s| *s > 0) {
            request = request
                .query("fromTimestamp", since.to_string())
                .query("since", since.to_string());
        }
        if query.only_confirmed {
            request = request.query("onlyConfirmed", "true");
        } else if query.only_unconfirmed {
            request = request.query("onlyUnconfirmed", "true");
        }
        if let Some(sort) = &query.sort {
            request = request.query("sort", sort.clone());
        }
        if let Some(fingerprint) = &query.fingerprint {
            request = request.query("fingerprint", fingerprint.clone());
        }

        Ok(provider.request(request).await?)
    }

    /// Events emitted by one transaction.
    pub async fn get_events_by_transaction_id(&self, transaction_id: &str) -> Result<Vec<EventRecord>, Error> {
        let raw = self.get_raw_events_by_transaction_id(transaction_id).await?;
        Ok(raw.iter().map(EventRecord::from_raw).collect())
    }

    pub async fn get_raw_events_by_transaction_id(&self, transaction_id: &str) -> Result<Vec<Value>, Error> {
        let response = self
            .client
            .dispatch(
                Component::Event,
                "get_events_by_transaction_id",
                vec![Value::from(transaction_id)],
                async {
                    let provider = self.client.event_server().ok_or(Error::NoEventServer)?;
                    let request = ProviderRequest::get(format!("event/transaction/{transaction_id}"));
                    Ok(provider.request(request).await?)
                },
            )
            .await?;
        into_records(response)
    }
}

fn into_records(response: Value) -> Result<Vec<Value>, Error> {
    match response {
        Value::Array(records) => Ok(records),
        Value::Null => Err(Error::Remote("Unknown error occurred".into())),
        Value::String(message) => Err(Error::Remote(message)),
        other => Err(Error::Remote(other.to_string())),
    }
}

// ============================================================================
// EventPoller
// ============================================================================

/// Filters successive event pages down to records not seen before.
///
/// A record is kept when it matches the resource node filter, has no
/// identical copy earlier in the same page, and its block is above the
/// watermark. The watermark is the highest block of any non-empty page and
/// never decreases. Kept records stay in page order.
#[derive(Clone, Debug, Default)]
pub struct EventPoller {
    last_block: Option<u64>,
    resource_node: Option<String>,
}

impl EventPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only keep records from `fullNode` or `solidityNode` (any case).
    /// Records without a tag always pass.
    pub fn with_resource_node(mut self, resource_node: impl Into<String>) -> Self {
        self.resource_node = Some(resource_node.into());
        self
    }

    pub fn set_resource_node(&mut self, resource_node: Option<String>) {
        self.resource_node = resource_node;
    }

    /// Highest block seen so far.
    pub fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    /// Apply one page and return the new records.
    pub fn filter(&mut self, batch: Vec<EventRecord>) -> Vec<EventRecord> {
        let watermark = self.last_block;
        if let Some(max) = batch.iter().map(|record| record.block).max() {
            let next = watermark.map_or(max, |w| w.max(max));
            if Some(next) != watermark {
                tracing::trace!(from = ?watermark, to = next, "event watermark advanced");
            }
            self.last_block = Some(next);
        }

        let mut kept: Vec<EventRecord> = Vec::new();
        for record in batch {
            if !self.matches_resource_node(&record) {
                continue;
            }
            if kept.contains(&record) {
                continue;
            }
            if watermark.is_some_and(|w| record.block <= w) {
                continue;
            }
            kept.push(record);
        }
        kept
    }

    fn matches_resource_node(&self, record: &EventRecord) -> bool {
        match &self.resource_node {
            Some(wanted) => record
                .resource_node
                .as_deref()
                .is_none_or(|node| node.eq_ignore_ascii_case(wanted)),
            None => true,
        }
    }
}
