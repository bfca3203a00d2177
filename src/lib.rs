//! Webauthn verification for Rust relying parties.
//!
//! Webauthn is a standard allowing communication between servers,
//! browsers and authenticators to allow strong, passwordless,
//! cryptographic authentication to be performed. This crate implements
//! the server side verification core: given the artifacts a browser
//! forwards from an authenticator, it decides whether a newly registered
//! credential is authentic and bound to your site, and whether a later
//! assertion was produced by that credential.
//!
//! The crate is deliberately stateless. You bring the session storage,
//! the credential database, the trust anchors and the transport; the two
//! entry points [`register_credential`] and [`verify`] are pure given
//! their inputs and may be called from any thread.
//!
//! ```
//! use webauthn_verify::prelude::*;
//!
//! let rp = default_relying_party("example.com");
//! let challenge = generate_challenge(32);
//! // Persist the challenge against the session, send it to the client,
//! // then feed the response bytes to register_credential / verify.
//! assert_eq!(challenge.as_ref().len(), 32);
//! assert_eq!(rp.id, "example.com");
//! ```

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

mod attestation;
mod base64_data;
mod constants;
mod core;
mod crypto;
mod error;
mod internals;
mod proto;

/// Protocol value types.
pub mod types {
    pub use crate::attestation::{AttestationFormat, AttestationStatement};
    pub use crate::base64_data::Base64UrlSafeData;
    pub use crate::crypto::{
        COSEAlgorithm, COSEEC2Key, COSEKey, COSEKeyType, COSEOKPKey, COSERSAKey, CertificateStore,
        ECDSACurve, EDDSACurve,
    };
    pub use crate::proto::{
        Aaguid, AttestedCredentialData, AuthenticatorData, Challenge, CollectedClientData,
        CredentialID, Origin, RelyingParty, TokenBinding, User,
    };
}

/// Everything a relying party typically needs in scope.
pub mod prelude {
    pub use crate::core::{default_relying_party, generate_challenge, register_credential, verify};
    pub use crate::error::{WebauthnError, WebauthnResult};
    pub use crate::types::*;
}

pub use crate::constants::CHALLENGE_SIZE_BYTES;
pub use crate::core::{default_relying_party, generate_challenge, register_credential, verify};
pub use crate::crypto::compute_sha256;
pub use crate::error::{WebauthnError, WebauthnResult};
