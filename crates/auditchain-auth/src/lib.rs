//! # auditchain auth
//!
//! Authenticates requests by signature instead of session tokens. A request
//! names its subject in the path (`/events/<address>/...`) and carries a
//! `signature` header made with the subject's key. The authenticator checks
//! that the key derives the path address, that the signature covers the
//! method, path and body digest, and that the address belongs to an
//! approved, registered user.
//!
//! ## Signature header
//!
//! ```text
//! signature: keyId="<hex pubkey>",algorithm="ed25519",
//!            headers="(request-target) date digest",signature="<hex sig>"
//! ```
//!
//! The signed string has one `name: value` line per listed header.
//! `(request-target)` is `<lowercase method> <path>` and must be listed.

pub mod authenticator;
pub mod error;
pub mod request;
pub mod signature;

pub use authenticator::{extract_address, RequestAuthenticator, DEFAULT_MAX_SKEW};
pub use error::{AuthError, Result};
pub use request::SignedRequest;
pub use signature::{body_digest, sign_request, signing_string, SignatureHeader};
