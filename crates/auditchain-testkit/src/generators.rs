//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use auditchain_core::{Address, Blake3Hash, EventChain, Keypair, LogInfo, LogType, NetworkId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}

/// One of the known networks.
pub fn network_id() -> impl Strategy<Value = NetworkId> {
    prop_oneof![Just(NetworkId::MAINNET), Just(NetworkId::TESTNET)]
}

/// An address on a known network.
pub fn address() -> impl Strategy<Value = Address> {
    (network_id(), keypair()).prop_map(|(network, kp)| Address::derive(network, &kp.public_key()))
}

/// Generate a reasonable timestamp (milliseconds).
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800_000
}

/// A JSON scalar: string, integer or bool.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-zA-Z0-9 ._-]{0,24}".prop_map(Value::String),
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
    ]
}

/// A flat payload map.
pub fn payload() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-zA-Z][a-zA-Z0-9_]{0,11}", scalar(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

pub fn log_type() -> impl Strategy<Value = LogType> {
    prop::sample::select(LogType::ALL.to_vec())
}

/// A log request with a supported type and arbitrary metadata.
pub fn log_info() -> impl Strategy<Value = LogInfo> {
    (
        log_type(),
        "[a-z0-9]{1,12}",
        prop::option::of(payload()),
        prop::option::of(payload()),
        prop::option::of("[ -~]{0,40}"),
    )
        .prop_map(|(log_type, user_id, metadata, changes, details)| LogInfo {
            log_type: log_type.as_str().to_string(),
            user_id,
            timestamp: Some("2024-12-29T12:00:00Z".to_string()),
            metadata,
            changes,
            details,
        })
}

/// Parameters for building a chain.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub signer: Keypair,
    pub subject: Address,
    pub events: Vec<(Map<String, Value>, i64)>,
}

impl Arbitrary for ChainParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            keypair(),
            address(),
            prop::collection::vec((payload(), timestamp()), 0..12),
        )
            .prop_map(|(signer, subject, events)| ChainParams {
                signer,
                subject,
                events,
            })
            .boxed()
    }
}

/// Build a chain by appending every event in order.
pub fn chain_from_params(params: &ChainParams) -> EventChain {
    let mut chain = EventChain::new(params.subject.clone());
    for (payload, timestamp) in &params.events {
        chain
            .append(&params.signer, payload.clone(), *timestamp)
            .expect("generated payloads are encodable");
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditchain_core::AnchorBatch;

    proptest! {
        #[test]
        fn generated_chains_verify(params: ChainParams) {
            let chain = chain_from_params(&params);
            prop_assert_eq!(chain.len(), params.events.len());
            prop_assert!(chain.verify().is_ok());
        }

        #[test]
        fn suffix_after_any_event_links_to_it(params: ChainParams, pick in any::<prop::sample::Index>()) {
            let chain = chain_from_params(&params);
            prop_assume!(!chain.is_empty());

            let i = pick.index(chain.len());
            let cursor = chain.events()[i].content_hash;
            let suffix = chain.starting_after(Some(&cursor)).unwrap();
            prop_assert_eq!(suffix.len(), chain.len() - i - 1);

            let batch = AnchorBatch::from_events(params.subject.clone(), suffix);
            if let Some(first) = batch.entries.first() {
                prop_assert_eq!(first.value, cursor);
            }
        }

        #[test]
        fn supported_log_types_always_classify(info in log_info()) {
            let event = info.classify().unwrap();
            let payload = event.to_payload().unwrap();
            prop_assert!(payload.contains_key("@context"));
            prop_assert_eq!(&payload["userId"], &Value::String(info.user_id.clone()));
        }
    }
}
