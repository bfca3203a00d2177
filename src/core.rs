//! The stateless verification entry points. Each function here is pure
//! given its inputs and the certificate store reference: no shared state,
//! no background work, no I/O. Calls may run on any thread concurrently.
//!
//! The flow for a registration is:
//! * check the collected client data against the expected ceremony values
//! * decode the attestation object and parse the authenticator data
//! * check the authenticator data against the relying party
//! * run the statement format's verification procedure
//! * hand the attested credential data back for the caller to persist
//!
//! An assertion replaces the attestation steps with a signature check
//! over `authData || SHA256(clientDataJSON)` under the stored key.

use rand::RngCore;
use std::convert::TryFrom;

use crate::attestation::{
    verify_android_safetynet_attestation, verify_fidou2f_attestation, verify_packed_attestation,
    verify_tpm_attestation, AttestationObject, AttestationStatement,
};
use crate::constants::{CLIENT_DATA_TYPE_CREATE, CLIENT_DATA_TYPE_GET};
use crate::crypto::{compute_sha256, ct_equal, CertificateStore, COSEKey};
use crate::error::*;
use crate::internals::parse_authenticator_data;
use crate::proto::{
    AttestedCredentialData, AuthenticatorData, Challenge, CollectedClientData, Origin,
    RelyingParty, TokenBinding,
};

/// Which ceremony a clientDataJSON blob is claimed to belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ceremony {
    Create,
    Get,
}

impl Ceremony {
    fn type_literal(self) -> &'static str {
        match self {
            Ceremony::Create => CLIENT_DATA_TYPE_CREATE,
            Ceremony::Get => CLIENT_DATA_TYPE_GET,
        }
    }
}

/// Generate a fresh challenge of `len` bytes from the operating system
/// CSPRNG. This is the single impure operation in the crate; it may block
/// briefly on first use on some platforms.
pub fn generate_challenge(len: usize) -> Challenge {
    let mut rng = rand::thread_rng();
    let mut chal = vec![0; len];
    rng.fill_bytes(&mut chal);
    Challenge::new(chal)
}

/// A relying party whose origin is `https://` followed by its id, which
/// is the common deployment. Construct [`RelyingParty`] directly when
/// your origin carries a port or your rp name differs.
pub fn default_relying_party(rp_id: &str) -> RelyingParty {
    RelyingParty {
        id: rp_id.to_string(),
        name: rp_id.to_string(),
        origin: Origin::new(format!("https://{}", rp_id)),
    }
}

/// Check the collected client data against everything the relying party
/// knows out of band. Each check fails with its own error so callers can
/// tell an origin problem from a replayed challenge.
pub(crate) fn verify_client_data(
    ceremony: Ceremony,
    expected_challenge: &Challenge,
    client_data_json: &[u8],
    rp: &RelyingParty,
    expected_token_binding: Option<&str>,
) -> WebauthnResult<CollectedClientData> {
    // Let C, the client data claimed as collected during the ceremony, be
    // the result of running an implementation-specific JSON parser on the
    // UTF-8 decoded bytes.
    let client_data: CollectedClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| WebauthnError::JSONDecodeError(e.to_string()))?;

    // Verify that the value of C.type matches the ceremony in progress.
    if client_data.type_ != ceremony.type_literal() {
        return Err(WebauthnError::InvalidType);
    }

    // Verify that the value of C.challenge matches the challenge that was
    // issued. The client echoes attacker-observable data here, so the
    // comparison is constant time.
    if !ct_equal(client_data.challenge.as_ref(), expected_challenge.as_ref()) {
        return Err(WebauthnError::MismatchedChallenge);
    }

    // Verify that the value of C.origin matches the Relying Party's origin.
    if client_data.origin != rp.origin.as_str() {
        debug!(
            client_origin = %client_data.origin,
            rp_origin = %rp.origin,
            "origin mismatch"
        );
        return Err(WebauthnError::MismatchedOrigin);
    }

    // Verify that the value of C.tokenBinding.status matches the state of
    // Token Binding for the TLS connection the ceremony travelled over,
    // and that the ids agree when both sides have one.
    match (&client_data.token_binding, expected_token_binding) {
        (Some(TokenBinding::Present { id }), Some(expected)) => {
            if !ct_equal(id.as_bytes(), expected.as_bytes()) {
                return Err(WebauthnError::MismatchedTokenBinding);
            }
        }
        (Some(TokenBinding::Present { .. }), None) => {
            return Err(WebauthnError::UnexpectedPresenceOfTokenBinding);
        }
        (_, Some(_)) => {
            // We negotiated token binding but the client did not report it.
            return Err(WebauthnError::UnexpectedPresenceOfTokenBinding);
        }
        _ => {}
    }

    Ok(client_data)
}

/// Check a parsed authenticator data blob against the relying party and
/// the caller's user-verification requirement.
pub(crate) fn verify_authenticator_data(
    ad: &AuthenticatorData,
    rp: &RelyingParty,
    require_user_verification: bool,
) -> WebauthnResult<()> {
    // Verify that the rpIdHash in authData is the SHA-256 hash of the RP
    // ID expected by the Relying Party.
    //
    // Remember that the RP ID is NOT the same as the RP name or origin -
    // it is the effective domain credentials are scoped to.
    if ad.rp_id_hash != compute_sha256(rp.id.as_bytes()) {
        return Err(WebauthnError::MismatchedRPID);
    }

    // Verify that the User Present bit of the flags in authData is set.
    if !ad.user_present {
        return Err(WebauthnError::UserNotPresent);
    }

    // If user verification is required for this ceremony, verify that the
    // User Verified bit of the flags in authData is set.
    if require_user_verification && !ad.user_verified {
        return Err(WebauthnError::UserUnverified);
    }

    Ok(())
}

/// Verify a registration response.
///
/// `client_data_json` and `attestation_object` are the raw bytes produced
/// by `navigator.credentials.create()`. On success the attested
/// credential data is returned for the caller to persist; whether the
/// attestation root is *acceptable* (self attestation, a particular
/// vendor CA) remains the caller's policy decision.
///
/// The certificate store is only consulted by formats that carry a chain
/// to an external service (android-safetynet today).
#[allow(clippy::too_many_arguments)]
pub fn register_credential(
    cert_store: &CertificateStore,
    expected_challenge: &Challenge,
    rp: &RelyingParty,
    expected_token_binding: Option<&str>,
    require_user_verification: bool,
    client_data_json: &[u8],
    attestation_object: &[u8],
) -> WebauthnResult<AttestedCredentialData> {
    // https://www.w3.org/TR/webauthn/#registering-a-new-credential
    verify_client_data(
        Ceremony::Create,
        expected_challenge,
        client_data_json,
        rp,
        expected_token_binding,
    )?;

    // Compute the hash of response.clientDataJSON using SHA-256. This is
    // an input to every statement format's signature.
    let client_data_hash = compute_sha256(client_data_json);

    // Perform CBOR decoding on the attestationObject to obtain the
    // attestation statement format fmt, the authenticator data authData,
    // and the attestation statement attStmt.
    let att_obj = AttestationObject::try_from(attestation_object)?;

    verify_authenticator_data(&att_obj.auth_data, rp, require_user_verification)?;

    // Registration must convey a new credential.
    let acd = att_obj
        .auth_data
        .acd
        .as_ref()
        .ok_or(WebauthnError::MalformedAuthenticatorData)?;

    debug!(fmt = ?att_obj.fmt, "verifying attestation statement");

    // Verify that attStmt is a correct attestation statement, conveying a
    // valid attestation signature, by using the format's verification
    // procedure given attStmt, authData and the client data hash.
    match &att_obj.att_stmt {
        AttestationStatement::FidoU2F { att_cert, sig } => verify_fidou2f_attestation(
            att_cert,
            sig,
            acd,
            &att_obj.auth_data.rp_id_hash,
            &client_data_hash,
        )?,
        AttestationStatement::Packed { alg, sig, x5c } => verify_packed_attestation(
            *alg,
            sig,
            x5c.as_deref(),
            acd,
            &att_obj.auth_data_bytes,
            &client_data_hash,
        )?,
        AttestationStatement::Tpm {
            ver,
            alg,
            x5c,
            sig,
            cert_info,
            pub_area,
        } => verify_tpm_attestation(
            ver,
            *alg,
            x5c,
            sig,
            cert_info,
            pub_area,
            acd,
            &att_obj.auth_data_bytes,
            &client_data_hash,
        )?,
        AttestationStatement::AndroidSafetyNet { ver: _, response } => {
            verify_android_safetynet_attestation(
                response,
                cert_store,
                &att_obj.auth_data_bytes,
                &client_data_hash,
            )?
        }
        AttestationStatement::None => {
            // Nothing to verify; the format is reported through the
            // absence of any trust path and judged by caller policy.
        }
    }

    Ok(acd.clone())
}

/// Verify an authentication assertion.
///
/// `credential_public_key` is the raw COSE key captured at registration.
/// On success the parsed authenticator data is returned so the caller can
/// read the signature counter and enforce monotonicity against its stored
/// value; the core does not track counters.
#[allow(clippy::too_many_arguments)]
pub fn verify(
    expected_challenge: &Challenge,
    rp: &RelyingParty,
    expected_token_binding: Option<&str>,
    require_user_verification: bool,
    client_data_json: &[u8],
    authenticator_data: &[u8],
    signature: &[u8],
    credential_public_key: &[u8],
) -> WebauthnResult<AuthenticatorData> {
    // https://www.w3.org/TR/webauthn/#verifying-assertion
    verify_client_data(
        Ceremony::Get,
        expected_challenge,
        client_data_json,
        rp,
        expected_token_binding,
    )?;

    let ad = parse_authenticator_data(authenticator_data)?;

    verify_authenticator_data(&ad, rp, require_user_verification)?;

    // Using the credential public key looked up by the caller, verify
    // that sig is a valid signature over the binary concatenation of
    // authData and SHA-256(clientDataJSON).
    //
    // Note: this step is compatible with signatures generated by FIDO U2F
    // authenticators.
    let cose_key = COSEKey::try_from(credential_public_key)?;

    let client_data_hash = compute_sha256(client_data_json);

    let verification_data: Vec<u8> = authenticator_data
        .iter()
        .chain(client_data_hash.iter())
        .copied()
        .collect();

    let verified = cose_key.verify_signature(signature, &verification_data)?;
    if !verified {
        return Err(WebauthnError::SignatureFailure);
    }

    Ok(ad)
}
