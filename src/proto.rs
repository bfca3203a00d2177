//! The value types exchanged during webauthn ceremonies. Everything here
//! is a tree of owned values created during a verification call; the only
//! type that outlives a call is [`AttestedCredentialData`], which the
//! caller persists after a successful registration.

use openssl::memcmp;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::base64_data::Base64UrlSafeData;

/// A credential id as issued by the authenticator. Opaque bytes.
pub type CredentialID = Vec<u8>;

/// A 16 byte identifier for the authenticator model.
pub type Aaguid = [u8; 16];

/// A challenge issued by the relying party for a single ceremony. The
/// value is sampled from the operating system CSPRNG and must be treated
/// as single-use: issue, persist against the session, compare, discard.
///
/// Comparison is constant-time.
#[derive(Clone, Serialize, Deserialize)]
pub struct Challenge(Base64UrlSafeData);

impl Challenge {
    /// Wrap previously generated challenge bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Challenge(Base64UrlSafeData(bytes))
    }
}

impl From<Vec<u8>> for Challenge {
    fn from(bytes: Vec<u8>) -> Self {
        Challenge::new(bytes)
    }
}

impl AsRef<[u8]> for Challenge {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl PartialEq for Challenge {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.as_ref(), other.as_ref());
        a.len() == b.len() && memcmp::eq(a, b)
    }
}

impl Eq for Challenge {}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized web origin: scheme, host and optional port, with no
/// trailing path. Compared by string equality against the origin the
/// client reports in clientDataJSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin(String);

impl Origin {
    /// Wrap an already-normalized origin string.
    pub fn new(origin: impl Into<String>) -> Self {
        Origin(origin.into())
    }

    /// The origin as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Origin {
    fn from(s: &str) -> Self {
        Origin(s.to_string())
    }
}

impl PartialEq<str> for Origin {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Immutable relying party configuration.
///
/// The `id` is the domain credentials are scoped to, the `origin` is the
/// full origin your site is served from. These should rarely if ever
/// change - changing them invalidates every credential already issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingParty {
    /// The relying party id, i.e. the effective domain. `https://x:443/y -> x`
    pub id: String,
    /// A human readable name for the service.
    pub name: String,
    /// The origin clients must report.
    pub origin: Origin,
}

impl RelyingParty {
    /// Assemble a relying party from its parts.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        origin: Origin,
    ) -> Self {
        RelyingParty {
            id: id.into(),
            name: name.into(),
            origin,
        }
    }
}

/// An account as the relying party sees it. The core never interprets
/// these fields; they exist so callers can round-trip them to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// An opaque stable handle for the account. Not a username.
    pub id: Base64UrlSafeData,
    /// The account name, generally a username or email.
    pub name: String,
    /// The name rendered in authenticator prompts.
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// The client's report of token binding state for the TLS connection the
/// ceremony travelled over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TokenBinding {
    /// The client does not support token binding.
    #[serde(rename = "not-supported")]
    Unsupported,
    /// Supported, but not negotiated on this connection.
    Supported,
    /// Negotiated; `id` is the base64url token binding id.
    Present {
        /// The token binding id for the connection.
        id: String,
    },
}

/// The decoded clientDataJSON. Unknown fields are ignored since clients
/// add their own (crossOrigin, hashAlgorithm, extension echoes, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedClientData {
    /// "webauthn.create" or "webauthn.get".
    #[serde(rename = "type")]
    pub type_: String,
    /// The echoed challenge, decoded from base64url.
    pub challenge: Base64UrlSafeData,
    /// The origin the client believes it spoke to.
    pub origin: String,
    /// Token binding state, if the client reported any.
    #[serde(rename = "tokenBinding")]
    pub token_binding: Option<TokenBinding>,
}

/// The attested credential data block carried inside authenticator data
/// during registration. This is the value a relying party persists: the
/// credential id for lookup, and the credential public key (raw COSE
/// bytes, exactly as the authenticator emitted them) for later assertion
/// verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestedCredentialData {
    /// The authenticator model identifier. All zero for U2F devices.
    pub aaguid: Aaguid,
    /// The id of the created credential.
    pub credential_id: Base64UrlSafeData,
    /// The credential public key as a raw COSE_Key item.
    pub credential_public_key: Base64UrlSafeData,
}

/// The parsed authenticator data blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    /// SHA-256 of the relying party id the authenticator scoped this
    /// operation to.
    pub rp_id_hash: Vec<u8>,
    /// The signature counter as sent. Parsed, never judged here: compare
    /// it against your stored value to detect cloned authenticators.
    pub counter: u32,
    /// The user presence (UP) flag.
    pub user_present: bool,
    /// The user verification (UV) flag.
    pub user_verified: bool,
    /// Attested credential data, present iff the AT flag was set.
    pub acd: Option<AttestedCredentialData>,
    /// The raw CBOR extension map trailing the fixed layout, present iff
    /// the ED flag was set.
    pub extensions: Option<Vec<u8>>,
}
