//! Identities and network-prefixed addresses.
//!
//! An address is never stored by auditchain; it is derived on demand from a
//! public key and the network the key is used on:
//!
//! ```text
//! raw     = 0x01 || network_byte || H20 || C4          (26 bytes)
//! H20     = blake3("auditchain-address-v0:" || public_key)[..20]
//! C4      = blake3(raw[..22])[..4]
//! address = hex(raw)                                   (52 chars)
//! ```
//!
//! The first four characters are therefore a per-network prefix
//! (`014c` for mainnet `L`, `0154` for testnet `T`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Ed25519PublicKey;
use crate::error::CoreError;

/// Address format version byte.
pub const ADDRESS_VERSION: u8 = 0x01;

/// Raw address length in bytes.
pub const ADDRESS_RAW_LEN: usize = 26;

/// Encoded address length in characters.
pub const ADDRESS_LEN: usize = ADDRESS_RAW_LEN * 2;

const ADDRESS_DOMAIN: &[u8] = b"auditchain-address-v0:";

/// Single-byte network identifier (an ASCII letter).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(u8);

impl NetworkId {
    /// Main network.
    pub const MAINNET: Self = Self(b'L');
    /// Test network.
    pub const TESTNET: Self = Self(b'T');

    /// Create from a raw byte. Only ASCII letters are valid network ids.
    pub fn from_byte(byte: u8) -> Option<Self> {
        byte.is_ascii_alphabetic().then_some(Self(byte))
    }

    /// The raw byte.
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// The network id as a char.
    pub fn as_char(self) -> char {
        self.0 as char
    }

    /// The four hex characters every address on this network starts with.
    pub fn address_prefix(self) -> String {
        hex::encode([ADDRESS_VERSION, self.0])
    }
}

impl fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({})", self.as_char())
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for NetworkId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [b] => Self::from_byte(*b).ok_or_else(|| CoreError::UnsupportedNetwork(s.to_string())),
            _ => Err(CoreError::UnsupportedNetwork(s.to_string())),
        }
    }
}

impl Serialize for NetworkId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A validated, checksummed address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Derive the address of a public key on a network.
    pub fn derive(network: NetworkId, public_key: &Ed25519PublicKey) -> Self {
        let mut raw = [0u8; ADDRESS_RAW_LEN];
        raw[0] = ADDRESS_VERSION;
        raw[1] = network.as_byte();

        let mut hasher = blake3::Hasher::new();
        hasher.update(ADDRESS_DOMAIN);
        hasher.update(public_key.as_bytes());
        raw[2..22].copy_from_slice(&hasher.finalize().as_bytes()[..20]);

        let checksum = blake3::hash(&raw[..22]);
        raw[22..].copy_from_slice(&checksum.as_bytes()[..4]);

        Self(hex::encode(raw))
    }

    /// Parse and validate an encoded address.
    ///
    /// Checks length, encoding, version byte, network byte and checksum. It
    /// does not check that the network is one this deployment knows about;
    /// see [`NetworkRegistry::resolve`].
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.len() != ADDRESS_LEN {
            return Err(CoreError::MalformedAddress(format!(
                "expected {} characters, got {}",
                ADDRESS_LEN,
                s.len()
            )));
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(CoreError::MalformedAddress("address must be lowercase hex".into()));
        }

        let raw = hex::decode(s).map_err(|e| CoreError::MalformedAddress(e.to_string()))?;

        if raw[0] != ADDRESS_VERSION {
            return Err(CoreError::MalformedAddress(format!(
                "unknown address version {:#04x}",
                raw[0]
            )));
        }
        if NetworkId::from_byte(raw[1]).is_none() {
            return Err(CoreError::MalformedAddress("invalid network byte".into()));
        }

        let checksum = blake3::hash(&raw[..22]);
        if checksum.as_bytes()[..4] != raw[22..] {
            return Err(CoreError::MalformedAddress("checksum mismatch".into()));
        }

        Ok(Self(s.to_string()))
    }

    /// The network this address belongs to.
    pub fn network_id(&self) -> NetworkId {
        // Validated on construction: bytes 2..4 of the string are the network byte.
        let byte = u8::from_str_radix(&self.0[2..4], 16).unwrap_or_default();
        NetworkId(byte)
    }

    /// The encoded address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}..)", &self.0[..16])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// A verified identity: the network, its public key and the derived address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub address: Address,
    pub public_key: Ed25519PublicKey,
    pub network_id: NetworkId,
}

impl Identity {
    /// Build an identity from a network and public key.
    pub fn new(network_id: NetworkId, public_key: Ed25519PublicKey) -> Self {
        Self {
            address: Address::derive(network_id, &public_key),
            public_key,
            network_id,
        }
    }
}

/// Parameters of a ledger network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub id: NetworkId,
    pub name: String,
    pub node_url: String,
}

/// The set of networks this deployment accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRegistry {
    networks: Vec<NetworkParams>,
}

impl NetworkRegistry {
    /// Create a registry from explicit parameters.
    pub fn new(networks: Vec<NetworkParams>) -> Self {
        Self { networks }
    }

    /// Look up a network by id.
    pub fn get(&self, id: NetworkId) -> Option<&NetworkParams> {
        self.networks.iter().find(|n| n.id == id)
    }

    /// Resolve the network an address belongs to.
    pub fn resolve(&self, address: &Address) -> Result<&NetworkParams, CoreError> {
        let id = address.network_id();
        self.get(id)
            .ok_or_else(|| CoreError::UnsupportedNetwork(id.to_string()))
    }

    /// Replace the node URL of a known network.
    pub fn with_node_url(mut self, id: NetworkId, node_url: impl Into<String>) -> Self {
        let node_url = node_url.into();
        if let Some(params) = self.networks.iter_mut().find(|n| n.id == id) {
            params.node_url = node_url;
        }
        self
    }

    /// All known networks.
    pub fn networks(&self) -> &[NetworkParams] {
        &self.networks
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::new(vec![
            NetworkParams {
                id: NetworkId::MAINNET,
                name: "mainnet".into(),
                node_url: "https://nodes.lto.network".into(),
            },
            NetworkParams {
                id: NetworkId::TESTNET,
                name: "testnet".into(),
                node_url: "https://testnet.lto.network".into(),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_address_derivation_deterministic() {
        let kp = Keypair::from_seed(&[7; 32]);
        let a1 = Address::derive(NetworkId::MAINNET, &kp.public_key());
        let a2 = Address::derive(NetworkId::MAINNET, &kp.public_key());
        assert_eq!(a1, a2);
        assert_eq!(a1.as_str().len(), ADDRESS_LEN);
        assert!(a1.as_str().starts_with("014c"));
    }

    #[test]
    fn test_address_differs_per_network() {
        let kp = Keypair::generate();
        let main = Address::derive(NetworkId::MAINNET, &kp.public_key());
        let test = Address::derive(NetworkId::TESTNET, &kp.public_key());
        assert_ne!(main, test);
        assert!(test.as_str().starts_with(&NetworkId::TESTNET.address_prefix()));
        assert_eq!(test.network_id(), NetworkId::TESTNET);
    }

    #[test]
    fn test_parse_roundtrip() {
        let kp = Keypair::generate();
        let address = Address::derive(NetworkId::TESTNET, &kp.public_key());
        let parsed = Address::parse(address.as_str()).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let kp = Keypair::generate();
        let address = Address::derive(NetworkId::MAINNET, &kp.public_key());
        let mut s = address.as_str().to_string();
        let last = s.pop().unwrap();
        s.push(if last == '0' { '1' } else { '0' });
        assert!(matches!(
            Address::parse(&s),
            Err(CoreError::MalformedAddress(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_length_and_case() {
        assert!(Address::parse("014c").is_err());
        let kp = Keypair::generate();
        let upper = Address::derive(NetworkId::MAINNET, &kp.public_key())
            .as_str()
            .to_uppercase();
        assert!(Address::parse(&upper).is_err());
    }

    #[test]
    fn test_registry_resolves_known_networks() {
        let registry = NetworkRegistry::default();
        let kp = Keypair::generate();

        let main = Address::derive(NetworkId::MAINNET, &kp.public_key());
        assert_eq!(registry.resolve(&main).unwrap().name, "mainnet");

        let other = Address::derive(NetworkId::from_byte(b'W').unwrap(), &kp.public_key());
        assert!(matches!(
            registry.resolve(&other),
            Err(CoreError::UnsupportedNetwork(n)) if n == "W"
        ));
    }

    #[test]
    fn test_network_id_parse() {
        assert_eq!("L".parse::<NetworkId>().unwrap(), NetworkId::MAINNET);
        assert!("LT".parse::<NetworkId>().is_err());
        assert!("1".parse::<NetworkId>().is_err());
    }

    #[test]
    fn test_identity_serializes_camel_case() {
        let kp = Keypair::from_seed(&[1; 32]);
        let identity = Identity::new(NetworkId::MAINNET, kp.public_key());
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["networkId"], "L");
        assert_eq!(json["address"], identity.address.as_str());
        assert_eq!(json["publicKey"], kp.public_key().to_hex());
    }
}
