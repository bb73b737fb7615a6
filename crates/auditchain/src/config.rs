//! Service configuration.
//!
//! Loaded from an optional TOML file, then overridden by `AUDITCHAIN_*`
//! environment variables, then validated. Every section has defaults so an
//! empty file is valid apart from the signing seed.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use auditchain_core::{Keypair, NetworkId, NetworkRegistry};
use auditchain_ledger::RetryPolicy;

use crate::error::{Result, ServiceError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
    pub signing: SigningConfig,
    pub auth: AuthConfig,
    pub anchoring: AnchoringConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Mount every route under this prefix, e.g. `/api`.
    pub route_prefix: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            route_prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file, or `:memory:`.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("auditchain.db"),
        }
    }
}

impl StoreConfig {
    pub fn is_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// A ledger node reached over HTTP.
    #[default]
    Http,
    /// An in-process ledger, for development.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub network_id: NetworkId,
    /// Overrides the node URL of `network_id`.
    pub node_url: Option<String>,
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Http,
            network_id: NetworkId::MAINNET,
            node_url: None,
            request_timeout_ms: 10_000,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 200,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Hex-encoded 32-byte seed of the service key.
    pub seed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Tolerated difference between a signed `date` header and local time.
    pub max_skew_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { max_skew_secs: 300 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchoringConfig {
    pub after_append: bool,
    /// Seconds between sweeps over all chains. 0 disables the sweep.
    pub sweep_interval_secs: u64,
}

impl Default for AnchoringConfig {
    fn default() -> Self {
        Self {
            after_append: true,
            sweep_interval_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub json: bool,
}

impl ServiceConfig {
    /// Load from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Apply `AUDITCHAIN_*` overrides read through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("AUDITCHAIN_BIND") {
            self.server.bind = parse_env("AUDITCHAIN_BIND", &v)?;
        }
        if let Some(v) = var("AUDITCHAIN_DATABASE") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = var("AUDITCHAIN_NETWORK_ID") {
            self.ledger.network_id = parse_env("AUDITCHAIN_NETWORK_ID", &v)?;
        }
        if let Some(v) = var("AUDITCHAIN_SEED") {
            self.signing.seed = Some(v);
        }
        if let Some(v) = var("AUDITCHAIN_NODE_URL") {
            self.ledger.node_url = Some(v);
        }
        if let Some(v) = var("AUDITCHAIN_ANCHOR_SWEEP_SECS") {
            self.anchoring.sweep_interval_secs = parse_env("AUDITCHAIN_ANCHOR_SWEEP_SECS", &v)?;
        }
        if let Some(v) = var("AUDITCHAIN_LOG_JSON") {
            self.log.json = parse_env("AUDITCHAIN_LOG_JSON", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.keypair()?;

        if NetworkRegistry::default().get(self.ledger.network_id).is_none() {
            return Err(ServiceError::Config(format!(
                "unknown network id {}",
                self.ledger.network_id
            )));
        }

        let retry = &self.ledger.retry;
        if retry.max_attempts == 0 {
            return Err(ServiceError::Config("retry.max_attempts must be at least 1".into()));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(ServiceError::Config(
                "retry.max_delay_ms must not be below retry.initial_delay_ms".into(),
            ));
        }
        if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
            return Err(ServiceError::Config("retry.multiplier must be at least 1".into()));
        }
        if self.ledger.request_timeout_ms == 0 {
            return Err(ServiceError::Config("ledger.request_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// The service signing key.
    pub fn keypair(&self) -> Result<Keypair> {
        let seed = self
            .signing
            .seed
            .as_deref()
            .ok_or_else(|| ServiceError::Config("signing.seed is required".into()))?;
        Keypair::from_seed_hex(seed)
            .map_err(|e| ServiceError::Config(format!("signing.seed must be 32 hex bytes: {e}")))
    }

    /// Known networks, with the configured node URL applied.
    pub fn registry(&self) -> NetworkRegistry {
        let registry = NetworkRegistry::default();
        match &self.ledger.node_url {
            Some(url) => registry.with_node_url(self.ledger.network_id, url.clone()),
            None => registry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.ledger.retry;
        RetryPolicy {
            max_attempts: retry.max_attempts,
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            multiplier: retry.multiplier,
            request_timeout: Duration::from_millis(self.ledger.request_timeout_ms),
        }
    }

    pub fn max_skew(&self) -> Duration {
        Duration::from_secs(self.auth.max_skew_secs)
    }

    /// The configuration as TOML, with the seed redacted.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.signing.seed.is_some() {
            shown.signing.seed = Some("<redacted>".into());
        }
        toml::to_string_pretty(&shown).map_err(|e| ServiceError::Config(e.to_string()))
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServiceError::Config(format!("{name}: {e}")))
}
