//! The `signature` header, the signed string, and request signing.

use chrono::{DateTime, Utc};

use auditchain_core::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};

use crate::error::{AuthError, Result};
use crate::request::SignedRequest;

/// Pseudo-header covering method and path.
pub const REQUEST_TARGET: &str = "(request-target)";

/// The only supported signature algorithm.
pub const ALGORITHM: &str = "ed25519";

/// Name of the header carrying the signature.
pub const SIGNATURE_HEADER: &str = "signature";

/// Name of the header carrying the body digest.
pub const DIGEST_HEADER: &str = "digest";

/// Headers covered by [`sign_request`].
pub const DEFAULT_SIGNED_HEADERS: [&str; 3] = [REQUEST_TARGET, "date", DIGEST_HEADER];

/// Parsed `signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub key_id: Ed25519PublicKey,
    pub algorithm: String,
    /// Lowercase names of the signed headers, in signing order.
    pub headers: Vec<String>,
    pub signature: Ed25519Signature,
}

impl SignatureHeader {
    /// Parse `keyId="..",algorithm="..",headers="..",signature=".."`.
    ///
    /// `algorithm` defaults to ed25519 and `headers` to `(request-target)`
    /// when omitted.
    pub fn parse(value: &str) -> Result<Self> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers = None;
        let mut signature = None;

        for param in value.split(',') {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (name, raw) = param
                .split_once('=')
                .ok_or_else(|| invalid(format!("malformed parameter: {param}")))?;
            let raw = raw.trim();
            let val = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(raw);

            match name.trim() {
                "keyId" => key_id = Some(val.to_string()),
                "algorithm" => algorithm = Some(val.to_ascii_lowercase()),
                "headers" => {
                    headers = Some(
                        val.split_whitespace()
                            .map(str::to_ascii_lowercase)
                            .collect::<Vec<_>>(),
                    )
                }
                "signature" => signature = Some(val.to_string()),
                _ => {}
            }
        }

        let key_id = key_id.ok_or_else(|| invalid("missing keyId"))?;
        let key_id = Ed25519PublicKey::from_hex(&key_id)
            .map_err(|e| invalid(format!("keyId is not a public key: {e}")))?;

        let algorithm = algorithm.unwrap_or_else(|| ALGORITHM.to_string());
        if algorithm != ALGORITHM {
            return Err(invalid(format!("unsupported algorithm: {algorithm}")));
        }

        let headers = headers.unwrap_or_else(|| vec![REQUEST_TARGET.to_string()]);
        if headers.is_empty() {
            return Err(invalid("empty headers list"));
        }

        let signature = signature.ok_or_else(|| invalid("missing signature"))?;
        let signature = Ed25519Signature::from_hex(&signature)
            .map_err(|e| invalid(format!("unparsable signature: {e}")))?;

        Ok(Self {
            key_id,
            algorithm,
            headers,
            signature,
        })
    }

    /// Render as a header value.
    pub fn to_header_value(&self) -> String {
        format!(
            "keyId=\"{}\",algorithm=\"{}\",headers=\"{}\",signature=\"{}\"",
            self.key_id.to_hex(),
            self.algorithm,
            self.headers.join(" "),
            self.signature.to_hex()
        )
    }

    /// Whether a header (lowercase) is covered by the signature.
    pub fn covers(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

fn invalid(reason: impl Into<String>) -> AuthError {
    AuthError::InvalidSignature(reason.into())
}

/// `BLAKE3=<hex>` digest of a body.
pub fn body_digest(body: &[u8]) -> String {
    format!("BLAKE3={}", Blake3Hash::hash(body).to_hex())
}

/// The string a request signature covers.
///
/// One `name: value` line per listed header, joined by `\n`.
pub fn signing_string(request: &SignedRequest, headers: &[String]) -> Result<String> {
    let mut lines = Vec::with_capacity(headers.len());

    for name in headers {
        if name == REQUEST_TARGET {
            lines.push(format!(
                "{}: {} {}",
                REQUEST_TARGET,
                request.method.to_ascii_lowercase(),
                request.path
            ));
        } else {
            let value = request
                .header(name)
                .ok_or_else(|| invalid(format!("signed header {name} is missing")))?;
            lines.push(format!("{}: {}", name, value.trim()));
        }
    }

    Ok(lines.join("\n"))
}

/// Sign a request in place of its holder: sets `date`, `digest` and
/// `signature`.
pub fn sign_request(
    keypair: &Keypair,
    mut request: SignedRequest,
    date: DateTime<Utc>,
) -> SignedRequest {
    request.insert_header("date", date.to_rfc2822());
    request.insert_header(DIGEST_HEADER, body_digest(&request.body));

    let headers: Vec<String> = DEFAULT_SIGNED_HEADERS.iter().map(|h| h.to_string()).collect();
    // Every listed header was just inserted.
    let message = signing_string(&request, &headers).unwrap_or_default();

    let header = SignatureHeader {
        key_id: keypair.public_key(),
        algorithm: ALGORITHM.to_string(),
        headers,
        signature: keypair.sign(message.as_bytes()),
    };
    request.insert_header(SIGNATURE_HEADER, header.to_header_value());
    request
}
