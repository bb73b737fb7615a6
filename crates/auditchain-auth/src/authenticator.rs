//! Request authentication.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use auditchain_core::{Address, Identity, NetworkRegistry};
use auditchain_store::AuthorizationLookup;

use crate::error::{AuthError, Result};
use crate::request::SignedRequest;
use crate::signature::{
    body_digest, signing_string, SignatureHeader, DIGEST_HEADER, REQUEST_TARGET, SIGNATURE_HEADER,
};

/// Default tolerated difference between the `date` header and local time.
pub const DEFAULT_MAX_SKEW: Duration = Duration::from_secs(300);

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/(01[0-9a-f]{50})(?:/|$)").expect("address pattern is a valid regex")
    })
}

/// Extract the subject address from a request path.
///
/// The first path segment that looks like an address is used.
pub fn extract_address(path: &str) -> Result<Address> {
    let candidate = address_pattern()
        .captures(path)
        .and_then(|c| c.get(1))
        .ok_or_else(|| AuthError::MalformedIdentity(format!("no address in path {path}")))?;

    Address::parse(candidate.as_str()).map_err(|e| AuthError::MalformedIdentity(e.to_string()))
}

/// Verifies request signatures and consults the authorization lookup.
pub struct RequestAuthenticator<L> {
    lookup: Arc<L>,
    registry: NetworkRegistry,
    max_skew: Duration,
}

impl<L> Clone for RequestAuthenticator<L> {
    fn clone(&self) -> Self {
        Self {
            lookup: self.lookup.clone(),
            registry: self.registry.clone(),
            max_skew: self.max_skew,
        }
    }
}

impl<L: AuthorizationLookup> RequestAuthenticator<L> {
    pub fn new(lookup: Arc<L>, registry: NetworkRegistry) -> Self {
        Self {
            lookup,
            registry,
            max_skew: DEFAULT_MAX_SKEW,
        }
    }

    /// Set the tolerated clock skew for signed `date` headers.
    pub fn with_max_skew(mut self, max_skew: Duration) -> Self {
        self.max_skew = max_skew;
        self
    }

    /// Authenticate a request against the current time.
    pub async fn authenticate(&self, request: &SignedRequest) -> Result<Identity> {
        self.authenticate_at(request, Utc::now()).await
    }

    /// Authenticate a request, judging the `date` header against `now`.
    pub async fn authenticate_at(
        &self,
        request: &SignedRequest,
        now: DateTime<Utc>,
    ) -> Result<Identity> {
        let result = self.check(request, now).await;
        if let Err(e) = &result {
            tracing::warn!(method = %request.method, path = %request.path, error = %e, "request authentication failed");
        }
        result
    }

    async fn check(&self, request: &SignedRequest, now: DateTime<Utc>) -> Result<Identity> {
        let address = extract_address(&request.path)?;

        let network = self
            .registry
            .resolve(&address)
            .map_err(|_| AuthError::UnsupportedNetwork(address.network_id().to_string()))?
            .id;

        let header = request
            .header(SIGNATURE_HEADER)
            .ok_or_else(|| AuthError::InvalidSignature("missing signature header".into()))?;
        let header = SignatureHeader::parse(header)?;

        self.check_covered_headers(request, &header, now)?;

        let identity = Identity::new(network, header.key_id);
        if identity.address != address {
            return Err(AuthError::InvalidSignature(
                "keyId does not match the path address".into(),
            ));
        }

        let message = signing_string(request, &header.headers)?;
        identity
            .public_key
            .verify(message.as_bytes(), &header.signature)
            .map_err(|_| AuthError::InvalidSignature("signature mismatch".into()))?;

        let user = self
            .lookup
            .lookup(&address)
            .await?
            .ok_or_else(|| AuthError::NotAuthorized("user not registered".into()))?;
        if !user.approved {
            return Err(AuthError::NotAuthorized("user not approved".into()));
        }
        if user.public_key != identity.public_key {
            return Err(AuthError::NotAuthorized(
                "key differs from the registered key".into(),
            ));
        }

        tracing::debug!(subject = %address, "request authenticated");
        Ok(identity)
    }

    fn check_covered_headers(
        &self,
        request: &SignedRequest,
        header: &SignatureHeader,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !header.covers(REQUEST_TARGET) {
            return Err(AuthError::InvalidSignature(
                "(request-target) must be signed".into(),
            ));
        }

        if !request.body.is_empty() || header.covers(DIGEST_HEADER) {
            if !header.covers(DIGEST_HEADER) {
                return Err(AuthError::InvalidSignature(
                    "request body is not covered by a signed digest".into(),
                ));
            }
            let digest = request
                .header(DIGEST_HEADER)
                .ok_or_else(|| AuthError::InvalidSignature("missing digest header".into()))?;
            if digest.trim() != body_digest(&request.body) {
                return Err(AuthError::InvalidSignature("digest does not match body".into()));
            }
        }

        if header.covers("date") {
            let date = request
                .header("date")
                .ok_or_else(|| AuthError::InvalidSignature("missing date header".into()))?;
            let date = DateTime::parse_from_rfc2822(date.trim())
                .map_err(|e| AuthError::InvalidSignature(format!("unparsable date: {e}")))?;
            let skew = (now - date.with_timezone(&Utc)).num_seconds().unsigned_abs();
            if skew > self.max_skew.as_secs() {
                return Err(AuthError::InvalidSignature(format!(
                    "date is {skew}s away from server time"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign_request;
    use auditchain_core::{Keypair, NetworkId};
    use auditchain_store::{MemoryStore, Role, UserRecord};

    struct Setup {
        keypair: Keypair,
        address: Address,
        store: Arc<MemoryStore>,
        auth: RequestAuthenticator<MemoryStore>,
    }

    async fn setup(approved: bool) -> Setup {
        let keypair = Keypair::from_seed(&[0x33; 32]);
        let address = Address::derive(NetworkId::TESTNET, &keypair.public_key());
        let store = Arc::new(MemoryStore::new());
        store
            .put_user(UserRecord {
                address: address.clone(),
                public_key: keypair.public_key(),
                email: "dev@example.com".into(),
                role: Role::Developer,
                approved,
            })
            .await
            .unwrap();
        let auth = RequestAuthenticator::new(store.clone(), NetworkRegistry::default());
        Setup {
            keypair,
            address,
            store,
            auth,
        }
    }

    fn log_request(s: &Setup, body: &str) -> SignedRequest {
        let request = SignedRequest::new("POST", format!("/events/{}/log", s.address))
            .with_header("content-type", "application/json")
            .with_body(body.to_string());
        sign_request(&s.keypair, request, Utc::now())
    }

    #[test]
    fn test_extract_address() {
        let kp = Keypair::generate();
        let address = Address::derive(NetworkId::MAINNET, &kp.public_key());

        assert_eq!(extract_address(&format!("/events/{address}/logs")).unwrap(), address);
        assert_eq!(extract_address(&format!("/events/{address}")).unwrap(), address);
        assert!(matches!(
            extract_address("/events/log"),
            Err(AuthError::MalformedIdentity(_))
        ));

        let mut corrupt = address.to_string();
        corrupt.replace_range(10..11, if &corrupt[10..11] == "a" { "b" } else { "a" });
        assert!(matches!(
            extract_address(&format!("/events/{corrupt}/logs")),
            Err(AuthError::MalformedIdentity(_))
        ));
    }

    #[test]
    fn test_address_pattern_matches_whole_segments() {
        let re = address_pattern();
        let hex = format!("01{}", "ab".repeat(25));
        assert!(re.is_match(&format!("/events/{hex}")));
        assert!(re.is_match(&format!("/api/events/{hex}/anchor")));
        // Too long, uppercase, or glued to more characters.
        assert!(!re.is_match(&format!("/events/{hex}ff")));
        assert!(!re.is_match(&format!("/events/{}", hex.to_uppercase())));
        assert!(!re.is_match(&format!("/events/x{hex}")));
    }

    #[tokio::test]
    async fn test_valid_request_yields_identity() {
        let s = setup(true).await;
        let identity = s.auth.authenticate(&log_request(&s, r#"{"logType":"LOGIN"}"#)).await.unwrap();
        assert_eq!(identity.address, s.address);
        assert_eq!(identity.public_key, s.keypair.public_key());
        assert_eq!(identity.network_id, NetworkId::TESTNET);
    }

    #[tokio::test]
    async fn test_altered_body_rejected() {
        let s = setup(true).await;
        let mut request = log_request(&s, r#"{"logType":"LOGIN"}"#);
        request.body = r#"{"logType":"LOGOUT"}"#.into();
        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_altered_digest_and_body_rejected() {
        let s = setup(true).await;
        let mut request = log_request(&s, "{}");
        request.body = "[]".into();
        request.insert_header("digest", body_digest(b"[]"));
        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_other_path_rejected() {
        let s = setup(true).await;
        let mut request = log_request(&s, "{}");
        request.path = format!("/events/{}/logs", s.address);
        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_signature_rejected() {
        let s = setup(true).await;
        let mut request = log_request(&s, "{}");
        request.headers.remove("signature");
        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_foreign_key_rejected() {
        let s = setup(true).await;
        let intruder = Keypair::generate();
        let request = SignedRequest::new("GET", format!("/events/{}/logs", s.address));
        let request = sign_request(&intruder, request, Utc::now());
        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_date_rejected() {
        let s = setup(true).await;
        let request = SignedRequest::new("GET", format!("/events/{}/logs", s.address));
        let signed_at = Utc::now() - chrono::Duration::minutes(30);
        let request = sign_request(&s.keypair, request, signed_at);
        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::InvalidSignature(_))
        ));

        let lenient = s.auth.clone().with_max_skew(Duration::from_secs(3600));
        lenient.authenticate(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_unregistered_address_not_authorized() {
        let s = setup(true).await;
        let stranger = Keypair::generate();
        let address = Address::derive(NetworkId::TESTNET, &stranger.public_key());
        let request = SignedRequest::new("GET", format!("/events/{address}/logs"));
        let request = sign_request(&stranger, request, Utc::now());

        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::NotAuthorized(_))
        ));
        assert!(s.store.lookup(&address).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unapproved_user_not_authorized() {
        let s = setup(false).await;
        assert!(matches!(
            s.auth.authenticate(&log_request(&s, "{}")).await,
            Err(AuthError::NotAuthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_network_rejected() {
        let s = setup(true).await;
        let kp = Keypair::generate();
        let address = Address::derive(NetworkId::from_byte(b'W').unwrap(), &kp.public_key());
        let request = sign_request(
            &kp,
            SignedRequest::new("GET", format!("/events/{address}/logs")),
            Utc::now(),
        );
        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::UnsupportedNetwork(n)) if n == "W"
        ));
    }

    #[tokio::test]
    async fn test_request_target_must_be_signed() {
        let s = setup(true).await;
        let mut request = SignedRequest::new("GET", format!("/events/{}/logs", s.address))
            .with_header("date", Utc::now().to_rfc2822());
        let headers = vec!["date".to_string()];
        let message = signing_string(&request, &headers).unwrap();
        let header = SignatureHeader {
            key_id: s.keypair.public_key(),
            algorithm: "ed25519".into(),
            headers,
            signature: s.keypair.sign(message.as_bytes()),
        };
        request.insert_header("signature", header.to_header_value());

        assert!(matches!(
            s.auth.authenticate(&request).await,
            Err(AuthError::InvalidSignature(_))
        ));
    }
}
