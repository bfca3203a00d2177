//! Possible failure modes of webauthn verification. The set is flat and
//! closed: verification functions are total, returning one of these kinds
//! rather than panicking, and inner parser errors bubble up unchanged.

use thiserror::Error;

/// Shorthand result type used across the crate.
pub type WebauthnResult<T> = Result<T, WebauthnError>;

/// A single error kind for every way a registration or assertion can be
/// rejected. Callers map these onto their own transport-level responses;
/// the messages carry static context only, never raw attacker bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebauthnError {
    /// The clientDataJSON bytes were not a well-formed UTF-8 JSON object
    /// of the expected shape.
    #[error("client data JSON decode failed: {0}")]
    JSONDecodeError(String),

    /// A CBOR envelope (attestation object, statement, COSE key) did not
    /// decode. The first field names the structure being decoded.
    #[error("CBOR decode failed in {0}: {1}")]
    CBORDecodeError(&'static str, String),

    /// clientData.type was not the literal expected for this ceremony.
    #[error("client data type does not match the ceremony")]
    InvalidType,

    /// The challenge echoed by the client differs from the issued one.
    #[error("challenge does not match the expected challenge")]
    MismatchedChallenge,

    /// The client's reported origin differs from the relying party origin.
    #[error("origin does not match the relying party origin")]
    MismatchedOrigin,

    /// Token binding was reported (or expected) on one side only.
    #[error("token binding presence does not match expectation")]
    UnexpectedPresenceOfTokenBinding,

    /// Both sides carry a token binding id, but the ids differ.
    #[error("token binding id mismatch")]
    MismatchedTokenBinding,

    /// The authenticator data blob failed to parse, or attested credential
    /// data was required but absent.
    #[error("malformed authenticator data")]
    MalformedAuthenticatorData,

    /// rpIdHash is not the SHA-256 of the relying party id.
    #[error("rpIdHash does not match the relying party id")]
    MismatchedRPID,

    /// The user-present flag was not asserted.
    #[error("user presence not asserted by the authenticator")]
    UserNotPresent,

    /// User verification was required but the UV flag was not asserted.
    #[error("user verification required but not asserted")]
    UserUnverified,

    /// A COSE public key failed to decode or describes an invalid key.
    #[error("malformed COSE public key")]
    MalformedPublicKey,

    /// A signature was structurally invalid for its algorithm.
    #[error("malformed signature")]
    MalformedSignature,

    /// A signature failed cryptographic verification.
    #[error("signature verification failed")]
    SignatureFailure,

    /// The attestation statement format is not one this crate verifies.
    #[error("unsupported attestation format: {0}")]
    UnsupportedAttestationFormat(String),

    /// An attestation certificate failed to parse, did not meet the
    /// format's certificate requirements, or did not chain to a trust
    /// anchor in the supplied certificate store.
    #[error("attestation certificate untrusted or invalid")]
    UntrustedCertificate,

    /// The SafetyNet response nonce does not commit to this ceremony.
    #[error("safetynet nonce check failed")]
    NonceCheckFailure,

    /// The SafetyNet response was structurally or semantically invalid.
    #[error("invalid android safetynet attestation")]
    InvalidAndroidAttestation,

    /// The TPM attestation structures were inconsistent or invalid.
    #[error("invalid TPM attestation")]
    InvalidTPMAttestation,
}
