//! Attestation object decoding and the verification procedures for the
//! attestation statement formats this crate accepts.

use openssl::x509;
use std::convert::TryFrom;

use crate::constants::SAFETYNET_ATTEST_HOSTNAME;
use crate::crypto::{
    assert_packed_attest_req, assert_tpm_attest_req, cert_is_secp256r1, compute_sha1,
    compute_sha256, validate_fido_gen_ce_aaguid, verify_signature, CertificateStore,
    COSEAlgorithm, COSEKey, COSEKeyType, ECDSACurve,
};
use crate::error::*;
use crate::internals::{
    parse_authenticator_data, Tpm2bName, TpmAlgId, TpmSt, TpmsAttest, TpmtPublic, TpmtSignature,
    TpmuAttest, TpmuPublicId, TpmuPublicParms,
};
use crate::proto::{AttestedCredentialData, AuthenticatorData};

/// The attestation statement formats this crate verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AttestationFormat {
    /// <https://www.w3.org/TR/webauthn/#sctn-packed-attestation>
    Packed,
    /// <https://www.w3.org/TR/webauthn/#sctn-tpm-attestation>
    Tpm,
    /// <https://www.w3.org/TR/webauthn/#sctn-android-safetynet-attestation>
    AndroidSafetyNet,
    /// <https://www.w3.org/TR/webauthn/#sctn-fido-u2f-attestation>
    FidoU2F,
    /// <https://www.w3.org/TR/webauthn/#sctn-none-attestation>
    None,
}

impl TryFrom<&str> for AttestationFormat {
    type Error = WebauthnError;

    fn try_from(a: &str) -> Result<AttestationFormat, Self::Error> {
        match a {
            "packed" => Ok(AttestationFormat::Packed),
            "tpm" => Ok(AttestationFormat::Tpm),
            "android-safetynet" => Ok(AttestationFormat::AndroidSafetyNet),
            "fido-u2f" => Ok(AttestationFormat::FidoU2F),
            "none" => Ok(AttestationFormat::None),
            // android-key and apple are known identifiers we deliberately
            // do not verify; they surface the same way as unknown formats.
            other => Err(WebauthnError::UnsupportedAttestationFormat(
                other.to_string(),
            )),
        }
    }
}

/// A decoded attestation statement. The sum is closed: a new format means
/// a new variant with its own verification procedure, never a subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    /// Packed attestation, self or certificate based.
    Packed {
        /// The algorithm of the attestation signature.
        alg: COSEAlgorithm,
        /// The attestation signature.
        sig: Vec<u8>,
        /// The attestation certificate chain, DER encoded, leaf first.
        /// Absent for self attestation.
        x5c: Option<Vec<Vec<u8>>>,
    },
    /// TPM 2.0 attestation.
    Tpm {
        /// The TPM specification version. Must be "2.0".
        ver: String,
        /// The algorithm of the signature over certInfo.
        alg: COSEAlgorithm,
        /// The AIK certificate chain, DER encoded, leaf first.
        x5c: Vec<Vec<u8>>,
        /// The attestation signature over certInfo.
        sig: Vec<u8>,
        /// The raw TPMS_ATTEST structure.
        cert_info: Vec<u8>,
        /// The raw TPMT_PUBLIC structure.
        pub_area: Vec<u8>,
    },
    /// Android SafetyNet attestation.
    AndroidSafetyNet {
        /// The SafetyNet API version.
        ver: String,
        /// The JWS compact serialization returned by the API.
        response: Vec<u8>,
    },
    /// FIDO U2F attestation.
    FidoU2F {
        /// The single attestation certificate, DER encoded.
        att_cert: Vec<u8>,
        /// The attestation signature.
        sig: Vec<u8>,
    },
    /// No attestation was conveyed.
    None,
}

fn stmt_get<'a>(
    map: &'a std::collections::BTreeMap<serde_cbor::Value, serde_cbor::Value>,
    key: &'static str,
) -> WebauthnResult<&'a serde_cbor::Value> {
    map.get(&serde_cbor::Value::Text(key.to_string()))
        .ok_or_else(|| {
            WebauthnError::CBORDecodeError("attStmt", format!("missing field {}", key))
        })
}

fn stmt_alg(
    map: &std::collections::BTreeMap<serde_cbor::Value, serde_cbor::Value>,
) -> WebauthnResult<COSEAlgorithm> {
    stmt_get(map, "alg")
        .and_then(|v| cbor_try_i128!(v))
        .map_err(|_| WebauthnError::CBORDecodeError("attStmt", "invalid alg".to_string()))
        .and_then(|v| {
            COSEAlgorithm::try_from(v).map_err(|_| {
                WebauthnError::CBORDecodeError("attStmt", "unknown alg".to_string())
            })
        })
}

fn stmt_x5c(x5c: &serde_cbor::Value) -> WebauthnResult<Vec<Vec<u8>>> {
    // x5c: [ attestnCert: bytes, * (caCert: bytes) ]
    let arr = cbor_try_array!(x5c)
        .map_err(|_| WebauthnError::CBORDecodeError("attStmt", "x5c not an array".to_string()))?;
    arr.iter()
        .map(|v| {
            cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                WebauthnError::CBORDecodeError("attStmt", "x5c entry not bytes".to_string())
            })
        })
        .collect()
}

impl AttestationStatement {
    fn decode(fmt: AttestationFormat, stmt: &serde_cbor::Value) -> WebauthnResult<Self> {
        let map = cbor_try_map!(stmt)
            .map_err(|_| WebauthnError::CBORDecodeError("attStmt", "not a map".to_string()))?;

        match fmt {
            AttestationFormat::Packed => {
                // ECDAA was deprecated before reaching the field; a
                // statement carrying it is not something we verify.
                if map
                    .get(&serde_cbor::Value::Text("ecdaaKeyId".to_string()))
                    .is_some()
                {
                    return Err(WebauthnError::UnsupportedAttestationFormat(
                        "packed (ecdaa)".to_string(),
                    ));
                }

                let alg = stmt_alg(map)?;
                let sig = stmt_get(map, "sig").and_then(|v| {
                    cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "sig not bytes".to_string())
                    })
                })?;
                let x5c = match map.get(&serde_cbor::Value::Text("x5c".to_string())) {
                    Some(v) => Some(stmt_x5c(v)?),
                    None => None,
                };
                Ok(AttestationStatement::Packed { alg, sig, x5c })
            }
            AttestationFormat::Tpm => {
                let ver = stmt_get(map, "ver").and_then(|v| {
                    cbor_try_string!(v).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "ver not text".to_string())
                    })
                })?;
                let alg = stmt_alg(map)?;
                let sig = stmt_get(map, "sig").and_then(|v| {
                    cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "sig not bytes".to_string())
                    })
                })?;
                let x5c = stmt_get(map, "x5c").and_then(stmt_x5c)?;
                let cert_info = stmt_get(map, "certInfo").and_then(|v| {
                    cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "certInfo not bytes".to_string())
                    })
                })?;
                let pub_area = stmt_get(map, "pubArea").and_then(|v| {
                    cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "pubArea not bytes".to_string())
                    })
                })?;
                Ok(AttestationStatement::Tpm {
                    ver,
                    alg,
                    x5c,
                    sig,
                    cert_info,
                    pub_area,
                })
            }
            AttestationFormat::AndroidSafetyNet => {
                let ver = stmt_get(map, "ver").and_then(|v| {
                    cbor_try_string!(v).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "ver not text".to_string())
                    })
                })?;
                let response = stmt_get(map, "response").and_then(|v| {
                    cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "response not bytes".to_string())
                    })
                })?;
                Ok(AttestationStatement::AndroidSafetyNet { ver, response })
            }
            AttestationFormat::FidoU2F => {
                let sig = stmt_get(map, "sig").and_then(|v| {
                    cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                        WebauthnError::CBORDecodeError("attStmt", "sig not bytes".to_string())
                    })
                })?;
                // Check that x5c has exactly one element and let att_cert
                // be that element.
                let x5c = stmt_get(map, "x5c").and_then(stmt_x5c)?;
                if x5c.len() != 1 {
                    return Err(WebauthnError::CBORDecodeError(
                        "attStmt",
                        "fido-u2f x5c must hold exactly one certificate".to_string(),
                    ));
                }
                let att_cert = x5c.into_iter().next().unwrap_or_default();
                Ok(AttestationStatement::FidoU2F { att_cert, sig })
            }
            AttestationFormat::None => Ok(AttestationStatement::None),
        }
    }
}

/// The decoded attestation object: format, statement, and the
/// authenticator data both parsed and as the raw bytes signatures were
/// computed over.
#[derive(Debug, Clone)]
pub(crate) struct AttestationObject {
    pub fmt: AttestationFormat,
    pub auth_data: AuthenticatorData,
    pub auth_data_bytes: Vec<u8>,
    pub att_stmt: AttestationStatement,
}

impl TryFrom<&[u8]> for AttestationObject {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<AttestationObject, Self::Error> {
        let value: serde_cbor::Value = serde_cbor::from_slice(data)
            .map_err(|e| WebauthnError::CBORDecodeError("attestationObject", e.to_string()))?;
        let map = cbor_try_map!(&value).map_err(|_| {
            WebauthnError::CBORDecodeError("attestationObject", "not a map".to_string())
        })?;

        let fmt_str = map
            .get(&serde_cbor::Value::Text("fmt".to_string()))
            .ok_or_else(|| {
                WebauthnError::CBORDecodeError("attestationObject", "missing fmt".to_string())
            })
            .and_then(|v| {
                cbor_try_string!(v).map_err(|_| {
                    WebauthnError::CBORDecodeError("attestationObject", "fmt not text".to_string())
                })
            })?;

        let auth_data_bytes = map
            .get(&serde_cbor::Value::Text("authData".to_string()))
            .ok_or_else(|| {
                WebauthnError::CBORDecodeError("attestationObject", "missing authData".to_string())
            })
            .and_then(|v| {
                cbor_try_bytes!(v).map(|b| b.clone()).map_err(|_| {
                    WebauthnError::CBORDecodeError(
                        "attestationObject",
                        "authData not bytes".to_string(),
                    )
                })
            })?;

        let att_stmt_value = map
            .get(&serde_cbor::Value::Text("attStmt".to_string()))
            .ok_or_else(|| {
                WebauthnError::CBORDecodeError("attestationObject", "missing attStmt".to_string())
            })?;

        let auth_data = parse_authenticator_data(&auth_data_bytes)?;

        let fmt = AttestationFormat::try_from(fmt_str.as_str())?;
        let att_stmt = AttestationStatement::decode(fmt, att_stmt_value)?;

        Ok(AttestationObject {
            fmt,
            auth_data,
            auth_data_bytes,
            att_stmt,
        })
    }
}

// https://www.w3.org/TR/webauthn/#fido-u2f-attestation
pub(crate) fn verify_fidou2f_attestation(
    att_cert: &[u8],
    sig: &[u8],
    acd: &AttestedCredentialData,
    rp_id_hash: &[u8],
    client_data_hash: &[u8],
) -> WebauthnResult<()> {
    let cert = x509::X509::from_der(att_cert).map_err(|_| WebauthnError::UntrustedCertificate)?;

    // If certificate public key is not an Elliptic Curve (EC) public key
    // over the P-256 curve, terminate this algorithm and return an
    // appropriate error.
    if !cert_is_secp256r1(&cert)? {
        return Err(WebauthnError::UntrustedCertificate);
    }

    // Convert the COSE_KEY formatted credentialPublicKey to Raw ANSI X9.62
    // public key format.
    let credential_public_key = COSEKey::try_from(acd.credential_public_key.as_ref())?;
    let public_key_u2f = credential_public_key.get_alg_key_ecc_x962_raw()?;

    // Let verificationData be the concatenation of
    //   0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F
    let r: [u8; 1] = [0x00];
    let verification_data: Vec<u8> = r
        .iter()
        .chain(rp_id_hash.iter())
        .chain(client_data_hash.iter())
        .chain(acd.credential_id.as_ref().iter())
        .chain(public_key_u2f.iter())
        .copied()
        .collect();

    // Verify the sig using verificationData and the certificate public key.
    let verified = verify_signature(COSEAlgorithm::ES256, &cert, sig, &verification_data)?;
    if !verified {
        error!("fido-u2f attestation signature verification failed");
        return Err(WebauthnError::SignatureFailure);
    }

    Ok(())
}

// https://www.w3.org/TR/webauthn/#sctn-packed-attestation
pub(crate) fn verify_packed_attestation(
    alg: COSEAlgorithm,
    sig: &[u8],
    x5c: Option<&[Vec<u8>]>,
    acd: &AttestedCredentialData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
) -> WebauthnResult<()> {
    let verification_data: Vec<u8> = auth_data_bytes
        .iter()
        .chain(client_data_hash.iter())
        .copied()
        .collect();

    match x5c {
        Some(certs) => {
            // The attestation certificate attestnCert MUST be the first
            // element in the array.
            let arr_x509 = certs
                .iter()
                .map(|der| {
                    x509::X509::from_der(der).map_err(|_| WebauthnError::UntrustedCertificate)
                })
                .collect::<WebauthnResult<Vec<_>>>()?;

            let attestn_cert = arr_x509
                .first()
                .ok_or(WebauthnError::UntrustedCertificate)?;

            // Verify that sig is a valid signature over the concatenation
            // of authenticatorData and clientDataHash using the attestation
            // public key in attestnCert with the algorithm specified in alg.
            let verified = verify_signature(alg, attestn_cert, sig, &verification_data)?;
            if !verified {
                return Err(WebauthnError::SignatureFailure);
            }

            // Verify that attestnCert meets the packed attestation
            // statement certificate requirements.
            assert_packed_attest_req(attestn_cert)?;

            // If attestnCert contains an id-fido-gen-ce-aaguid extension,
            // verify that its value matches the aaguid in authenticatorData.
            validate_fido_gen_ce_aaguid(attestn_cert, &acd.aaguid)?;

            Ok(())
        }
        None => {
            // Self attestation in use. Validate that alg matches the
            // algorithm of the credentialPublicKey in authenticatorData.
            let credential_public_key = COSEKey::try_from(acd.credential_public_key.as_ref())?;
            if alg != credential_public_key.type_ {
                debug!("packed self attestation alg does not match credential key");
                return Err(WebauthnError::SignatureFailure);
            }

            // Verify that sig is a valid signature over the concatenation
            // of authenticatorData and clientDataHash using the credential
            // public key with alg.
            let verified = credential_public_key.verify_signature(sig, &verification_data)?;
            if !verified {
                return Err(WebauthnError::SignatureFailure);
            }

            Ok(())
        }
    }
}

// https://www.w3.org/TR/webauthn/#sctn-tpm-attestation
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_tpm_attestation(
    ver: &str,
    alg: COSEAlgorithm,
    x5c: &[Vec<u8>],
    sig: &[u8],
    cert_info: &[u8],
    pub_area: &[u8],
    acd: &AttestedCredentialData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
) -> WebauthnResult<()> {
    debug!("begin verify_tpm_attestation");

    // The version of the TPM specification to which the signature conforms.
    if ver != "2.0" {
        return Err(WebauthnError::InvalidTPMAttestation);
    }

    // The TPMS_ATTEST structure over which the signature was computed.
    let certinfo = TpmsAttest::try_from(cert_info)?;

    // The TPMT_PUBLIC structure used by the TPM to represent the
    // credential public key.
    let pubarea = TpmtPublic::try_from(pub_area)?;

    // The attestation signature, in the form of a TPMT_SIGNATURE.
    let tpm_sig = TpmtSignature::try_from(sig)?;

    // x5c is the AIK certificate followed by its chain.
    let arr_x509 = x5c
        .iter()
        .map(|der| x509::X509::from_der(der).map_err(|_| WebauthnError::UntrustedCertificate))
        .collect::<WebauthnResult<Vec<_>>>()?;

    let aik_cert = arr_x509
        .first()
        .ok_or(WebauthnError::UntrustedCertificate)?;

    // Verify that the public key specified by the parameters and unique
    // fields of pubArea is identical to the credentialPublicKey in the
    // attestedCredentialData.
    let credential_public_key = COSEKey::try_from(acd.credential_public_key.as_ref())?;

    match (
        &credential_public_key.key,
        &pubarea.parameters,
        &pubarea.unique,
    ) {
        (
            COSEKeyType::RSA(cose_rsa),
            TpmuPublicParms::Rsa { key_bits, exponent },
            TpmuPublicId::Rsa(modulus),
        ) => {
            if &cose_rsa.n != modulus || (*key_bits as usize) != modulus.len() * 8 {
                return Err(WebauthnError::InvalidTPMAttestation);
            }
            // Zero on the wire means the default exponent 2^16 + 1.
            let tpm_exponent = if *exponent == 0 { 65537 } else { *exponent };
            let cose_exponent =
                u32::from_be_bytes([0, cose_rsa.e[0], cose_rsa.e[1], cose_rsa.e[2]]);
            if tpm_exponent != cose_exponent {
                return Err(WebauthnError::InvalidTPMAttestation);
            }
        }
        (
            COSEKeyType::EC_EC2(cose_ec),
            TpmuPublicParms::Ecc { curve_id, .. },
            TpmuPublicId::Ecc { x, y },
        ) => {
            // TPM_ECC_NIST_P256 is 0x0003.
            if cose_ec.curve != ECDSACurve::SECP256R1 || *curve_id != 0x0003 {
                return Err(WebauthnError::InvalidTPMAttestation);
            }
            if cose_ec.x.as_slice() != x.as_slice() || cose_ec.y.as_slice() != y.as_slice() {
                return Err(WebauthnError::InvalidTPMAttestation);
            }
        }
        _ => return Err(WebauthnError::InvalidTPMAttestation),
    }

    // Concatenate authenticatorData and clientDataHash to form attToBeSigned.
    let verification_data: Vec<u8> = auth_data_bytes
        .iter()
        .chain(client_data_hash.iter())
        .copied()
        .collect();

    // Magic was asserted at parse time. Verify that type is set to
    // TPM_ST_ATTEST_CERTIFY.
    if certinfo.type_ != TpmSt::AttestCertify {
        return Err(WebauthnError::InvalidTPMAttestation);
    }

    // Verify that extraData is set to the hash of attToBeSigned using the
    // hash algorithm employed in "alg".
    let extra_data_hash = match certinfo.extra_data {
        Some(h) => h,
        None => return Err(WebauthnError::InvalidTPMAttestation),
    };

    let hashed_verification_data = match alg {
        COSEAlgorithm::INSECURE_RS1 => compute_sha1(&verification_data),
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 => compute_sha256(&verification_data),
        COSEAlgorithm::EDDSA => return Err(WebauthnError::InvalidTPMAttestation),
    };

    if hashed_verification_data != extra_data_hash {
        return Err(WebauthnError::InvalidTPMAttestation);
    }

    // Verify that attested holds a TPMS_CERTIFY_INFO whose name field is a
    // valid Name for pubArea under pubArea's nameAlg. The two bytes at the
    // start of a name carry the algorithm; TPMv2-Part1 says nothing about
    // validating them, so they are prepended to the recomputed hash to
    // force the comparison to cover them.
    let TpmuAttest::AttestCertify(name, _qualified_name) = certinfo.typeattested;
    let name = match name {
        Tpm2bName::Digest(name) => name,
        _ => return Err(WebauthnError::InvalidTPMAttestation),
    };

    let hname = match pubarea.name_alg {
        TpmAlgId::Sha256 => {
            let mut v = vec![0, 11];
            v.extend_from_slice(&compute_sha256(pub_area));
            v
        }
        _ => return Err(WebauthnError::InvalidTPMAttestation),
    };
    if hname != name {
        return Err(WebauthnError::InvalidTPMAttestation);
    }

    // Verify the sig is a valid signature over certInfo using the
    // attestation public key in aik_cert with the algorithm specified in alg.
    let sig_valid = match tpm_sig {
        TpmtSignature::RawSignature(dsig) => verify_signature(alg, aik_cert, &dsig, cert_info)?,
    };

    if !sig_valid {
        return Err(WebauthnError::SignatureFailure);
    }

    // Verify that aik_cert meets the TPM attestation statement certificate
    // requirements.
    assert_tpm_attest_req(aik_cert)?;

    // If aik_cert contains an id-fido-gen-ce-aaguid extension, verify that
    // its value matches the aaguid in authenticatorData.
    validate_fido_gen_ce_aaguid(aik_cert, &acd.aaguid)?;

    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct JwsHeader {
    alg: String,
    x5c: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetAttestResponse {
    nonce: String,
    timestamp_ms: u64,
    #[serde(default)]
    apk_package_name: Option<String>,
    #[serde(default)]
    apk_certificate_digest_sha256: Option<Vec<String>>,
    cts_profile_match: bool,
    basic_integrity: bool,
    #[serde(default)]
    evaluation_type: Option<String>,
}

// https://www.w3.org/TR/webauthn/#sctn-android-safetynet-attestation
pub(crate) fn verify_android_safetynet_attestation(
    response: &[u8],
    cert_store: &CertificateStore,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
) -> WebauthnResult<()> {
    // The response field is a JWS compact serialization:
    //   base64url(header) . base64url(payload) . base64url(signature)
    let response_str = std::str::from_utf8(response)
        .map_err(|_| WebauthnError::InvalidAndroidAttestation)?;

    let parts: Vec<&str> = response_str.split('.').collect();
    if parts.len() != 3 {
        return Err(WebauthnError::InvalidAndroidAttestation);
    }

    let header_bytes = base64::decode_config(parts[0], base64::URL_SAFE_NO_PAD)
        .map_err(|_| WebauthnError::InvalidAndroidAttestation)?;
    let header: JwsHeader = serde_json::from_slice(&header_bytes)
        .map_err(|_| WebauthnError::InvalidAndroidAttestation)?;

    // The header x5c carries the attestation certificate chain in
    // standard base64.
    let certs = header
        .x5c
        .iter()
        .map(|cert_b64| {
            base64::decode(cert_b64)
                .map_err(|_| WebauthnError::InvalidAndroidAttestation)
                .and_then(|der| {
                    x509::X509::from_der(&der).map_err(|_| WebauthnError::UntrustedCertificate)
                })
        })
        .collect::<WebauthnResult<Vec<_>>>()?;

    let leaf = certs
        .first()
        .ok_or(WebauthnError::InvalidAndroidAttestation)?;

    // Verify that the SafetyNet response actually came from the SafetyNet
    // service: attestationCert must be issued to the hostname
    // "attest.android.com".
    let common_name = leaf
        .subject_name()
        .entries_by_nid(openssl::nid::Nid::COMMONNAME)
        .next()
        .ok_or(WebauthnError::InvalidAndroidAttestation)
        .and_then(|entry| {
            entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .map_err(|_| WebauthnError::InvalidAndroidAttestation)
        })?;

    if common_name.as_str() != SAFETYNET_ATTEST_HOSTNAME {
        return Err(WebauthnError::InvalidAndroidAttestation);
    }

    // The chain must terminate at one of the caller's trust anchors.
    cert_store.verify_chain(leaf, &certs[1..])?;

    // Verify the JWS signature over `header.payload`.
    let signed_data = format!("{}.{}", parts[0], parts[1]);
    let signature = base64::decode_config(parts[2], base64::URL_SAFE_NO_PAD)
        .map_err(|_| WebauthnError::InvalidAndroidAttestation)?;

    let verified = match header.alg.as_str() {
        "RS256" => verify_signature(
            COSEAlgorithm::RS256,
            leaf,
            &signature,
            signed_data.as_bytes(),
        )?,
        _ => {
            debug!(alg = %header.alg, "unsupported safetynet JWS algorithm");
            return Err(WebauthnError::InvalidAndroidAttestation);
        }
    };
    if !verified {
        return Err(WebauthnError::SignatureFailure);
    }

    let payload_bytes = base64::decode_config(parts[1], base64::URL_SAFE_NO_PAD)
        .map_err(|_| WebauthnError::InvalidAndroidAttestation)?;
    let payload: SafetyNetAttestResponse = serde_json::from_slice(&payload_bytes)
        .map_err(|_| WebauthnError::InvalidAndroidAttestation)?;

    debug!(
        timestamp_ms = payload.timestamp_ms,
        basic_integrity = payload.basic_integrity,
        package = ?payload.apk_package_name,
        digests = ?payload.apk_certificate_digest_sha256,
        evaluation = ?payload.evaluation_type,
        "safetynet response payload"
    );

    // Verify that the nonce attribute in the payload is identical to the
    // Base64 encoding of the SHA-256 hash of the concatenation of
    // authenticatorData and clientDataHash.
    let expected_nonce: Vec<u8> = {
        let data_to_verify: Vec<u8> = auth_data_bytes
            .iter()
            .chain(client_data_hash.iter())
            .copied()
            .collect();
        compute_sha256(&data_to_verify)
    };

    let nonce = base64::decode(&payload.nonce).map_err(|_| WebauthnError::NonceCheckFailure)?;
    if nonce != expected_nonce {
        return Err(WebauthnError::NonceCheckFailure);
    }

    // Verify that the ctsProfileMatch attribute in the payload is true.
    if !payload.cts_profile_match {
        return Err(WebauthnError::InvalidAndroidAttestation);
    }

    Ok(())
}
