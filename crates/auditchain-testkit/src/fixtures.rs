//! Test fixtures and helpers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use auditchain_auth::{sign_request, SignedRequest};
use auditchain_core::{Address, Identity, Keypair, NetworkId};
use auditchain_ledger::MemoryLedger;
use auditchain_store::{MemoryStore, Role, StoreError, UserRecord};

/// A user holding its own key.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub keypair: Keypair,
    pub identity: Identity,
}

impl TestUser {
    pub fn from_seed(network: NetworkId, seed: [u8; 32]) -> Self {
        Self::with_keypair(network, Keypair::from_seed(&seed))
    }

    pub fn random(network: NetworkId) -> Self {
        Self::with_keypair(network, Keypair::generate())
    }

    fn with_keypair(network: NetworkId, keypair: Keypair) -> Self {
        let identity = Identity::new(network, keypair.public_key());
        Self { keypair, identity }
    }

    pub fn address(&self) -> &Address {
        &self.identity.address
    }

    /// The authorization record for this user.
    pub fn record(&self, approved: bool) -> UserRecord {
        UserRecord {
            address: self.identity.address.clone(),
            public_key: self.identity.public_key,
            email: format!("{}@example.com", &self.identity.address.as_str()[..8]),
            role: Role::Developer,
            approved,
        }
    }

    /// A request signed now with this user's key.
    pub fn sign(&self, method: &str, path: &str, body: &str) -> SignedRequest {
        self.sign_at(method, path, body, Utc::now())
    }

    pub fn sign_at(&self, method: &str, path: &str, body: &str, date: DateTime<Utc>) -> SignedRequest {
        let mut request = SignedRequest::new(method, path).with_body(body.to_string());
        if !body.is_empty() {
            request.insert_header("content-type", "application/json");
        }
        sign_request(&self.keypair, request, date)
    }
}

/// Service key plus in-memory store and ledger.
pub struct TestFixture {
    pub signer: Keypair,
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            signer: Keypair::from_seed(&[0xA5; 32]),
            store: Arc::new(MemoryStore::new()),
            ledger: Arc::new(MemoryLedger::new()),
        }
    }

    /// Register a user on testnet, approved or not.
    pub async fn user(&self, seed: u8, approved: bool) -> Result<TestUser, StoreError> {
        let user = TestUser::from_seed(NetworkId::TESTNET, [seed; 32]);
        self.store.put_user(user.record(approved)).await?;
        Ok(user)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A JSON log request body.
pub fn log_body(log_type: &str, metadata: Value) -> String {
    json!({
        "logType": log_type,
        "metadata": metadata,
    })
    .to_string()
}
