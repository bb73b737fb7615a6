//! HTTP client for a ledger node.
//!
//! - `anchor` signs one [`AnchorTransaction`] per batch and broadcasts it via
//!   `POST {node}/transactions/broadcast`. Retries resubmit that same
//!   transaction.
//! - `verify_anchors` posts the hex `{key: value}` map to
//!   `POST {node}/index/hash/verify?encoding=hex`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use auditchain_core::{
    Address, AnchorBatch, AnchorStatus, Keypair, NetworkId, NetworkParams, NetworkRegistry,
};

use crate::client::{AnchorReceipt, AnchorVerification, EntryStatus, LedgerClient};
use crate::error::{LedgerError, Result};
use crate::retry::{with_retry, RetryPolicy};
use crate::transaction::AnchorTransaction;

/// Ledger client talking to one node.
pub struct HttpLedgerClient {
    client: Client,
    node_url: String,
    network: NetworkId,
    registry: NetworkRegistry,
    signer: Keypair,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    verified: bool,
    #[serde(default, alias = "anchors")]
    map: HashMap<String, Option<String>>,
}

#[derive(Debug, Deserialize)]
struct NodeError {
    #[serde(default)]
    message: String,
}

impl HttpLedgerClient {
    /// Create a client for `network`, using its node URL from `registry`.
    pub fn new(
        registry: NetworkRegistry,
        network: NetworkId,
        signer: Keypair,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let node_url = registry
            .get(network)
            .map(|p| p.node_url.trim_end_matches('/').to_string())
            .ok_or_else(|| LedgerError::UnsupportedNetwork(network.to_string()))?;

        Ok(Self {
            client: Client::new(),
            node_url,
            network,
            registry,
            signer,
            retry,
        })
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.node_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let resp = self.client.post(self.url(path)).json(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<NodeError>()
                .await
                .map(|e| e.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| LedgerError::Serialization(format!("node response parse error: {e}")))
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn anchor(&self, batch: &AnchorBatch) -> Result<AnchorReceipt> {
        let tx = AnchorTransaction::signed(&self.signer, self.network, now_millis(), batch)?;
        let tx_id = self.broadcast(&tx).await?;

        tracing::info!(subject = %batch.subject, entries = batch.len(), tx_id = %tx_id, "anchor transaction accepted");

        Ok(AnchorReceipt {
            tx_id,
            entries: batch.len(),
        })
    }

    async fn verify_anchors(&self, batch: &AnchorBatch) -> Result<AnchorVerification> {
        let map = batch.to_hex_map();
        let resp: VerifyResponse = with_retry(&self.retry, "verify_anchors", || {
            self.post_json("/index/hash/verify?encoding=hex", &map)
        })
        .await?;

        let entries = batch
            .entries
            .iter()
            .map(|entry| {
                let committed = match resp.map.get(&entry.key.to_hex()) {
                    Some(tx) => tx.is_some(),
                    None => resp.map.is_empty() && resp.verified,
                };
                EntryStatus {
                    entry: *entry,
                    status: if committed {
                        AnchorStatus::Committed
                    } else {
                        AnchorStatus::Unknown
                    },
                }
            })
            .collect();

        Ok(AnchorVerification { entries })
    }

    fn resolve_network(&self, address: &Address) -> Result<NetworkParams> {
        Ok(self.registry.resolve(address)?.clone())
    }

    async fn broadcast(&self, transaction: &AnchorTransaction) -> Result<String> {
        let resp: BroadcastResponse = with_retry(&self.retry, "broadcast", || {
            self.post_json("/transactions/broadcast", transaction)
        })
        .await?;
        Ok(resp.id)
    }
}
