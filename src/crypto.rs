//! Cryptographic operation wrappers. This module exists to allow ease of
//! auditing and safe operation wrappers for the verification paths, and
//! currently uses OpenSSL as the cryptographic primitive provider.

#![allow(non_camel_case_types)]

use openssl::{bn, ec, ecdsa, hash, memcmp, nid, pkey, sha, sign, stack, x509};
use std::convert::TryFrom;
use std::fmt;

use x509_parser::oid_registry::Oid;
use x509_parser::prelude::{GeneralName, X509Error, X509Name, X509Version};

use crate::error::*;
use crate::internals::{tpm_device_attribute_parser, TpmVendor};
use crate::proto::Aaguid;

// Why OpenSSL over another rust crate?
// - The openssl crate allows us to reconstruct a public key from the
//   x/y group coords, where most others want a pkcs formatted structure. As
//   a result, it's easiest to use openssl as it gives us exactly what we need
//   for these operations, and despite it's many challenges as a library, it
//   has resources and investment into it's maintenance, so we can at least
//   assert a higher level of confidence in it than <backyard crypto here>.

/// A COSE signature algorithm identifier.
///
/// `INSECURE_RS1` exists because TPM authenticators in the field sign
/// their certInfo with RSASSA-SHA1. It is accepted as a TPM attestation
/// signature algorithm only, never as a credential key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum COSEAlgorithm {
    /// ECDSA with SHA-256 over P-256.
    ES256 = -7,
    /// EdDSA over Ed25519.
    EDDSA = -8,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    RS256 = -257,
    /// RSASSA-PKCS1-v1_5 with SHA-1. Never valid for credential keys.
    INSECURE_RS1 = -65535,
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            -7 => Ok(COSEAlgorithm::ES256),
            -8 => Ok(COSEAlgorithm::EDDSA),
            -257 => Ok(COSEAlgorithm::RS256),
            -65535 => Ok(COSEAlgorithm::INSECURE_RS1),
            _ => Err(WebauthnError::MalformedPublicKey),
        }
    }
}

/// An ECDSA curve identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ECDSACurve {
    // | Name    | Value | Key Type | Description                        |
    // | P-256   | 1     | EC2      | NIST P-256 also known as secp256r1 |
    /// SECP256R1, X9_62_PRIME256V1 in OpenSSL terms.
    SECP256R1 = 1,
}

impl TryFrom<i128> for ECDSACurve {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            1 => Ok(ECDSACurve::SECP256R1),
            _ => Err(WebauthnError::MalformedPublicKey),
        }
    }
}

impl ECDSACurve {
    fn to_openssl_nid(self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
        }
    }
}

/// An EdDSA curve identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EDDSACurve {
    /// Ed25519, for use with EdDSA only.
    ED25519 = 6,
}

impl TryFrom<i128> for EDDSACurve {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            6 => Ok(EDDSACurve::ED25519),
            _ => Err(WebauthnError::MalformedPublicKey),
        }
    }
}

/// A COSE elliptic curve public key on a Weierstrass curve.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct COSEEC2Key {
    /// The curve this point is on.
    pub curve: ECDSACurve,
    /// The public X coordinate.
    pub x: [u8; 32],
    /// The public Y coordinate.
    pub y: [u8; 32],
}

/// A COSE RSA public key.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct COSERSAKey {
    /// The modulus, big-endian.
    pub n: Vec<u8>,
    /// The public exponent, big-endian.
    pub e: [u8; 3],
}

/// A COSE octet key pair public key (Edwards curves).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct COSEOKPKey {
    /// The curve this key is on.
    pub curve: EDDSACurve,
    /// The public key bytes.
    pub x: [u8; 32],
}

/// The key material inside a COSE_Key.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum COSEKeyType {
    /// An elliptic curve key with x and y coordinates.
    EC_EC2(COSEEC2Key),
    /// An RSA key.
    RSA(COSERSAKey),
    /// An octet key pair (Ed25519).
    EC_OKP(COSEOKPKey),
}

/// COSE key type identifiers (RFC 8152 section 13).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum COSEKeyTypeId {
    /// Octet Key Pair
    EC_OKP = 1,
    /// Elliptic Curve Keys w/ x and y coordinate pair
    EC_EC2 = 2,
    /// RSA
    EC_RSA = 3,
}

/// A credential public key as decoded from its COSE_Key CBOR map.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct COSEKey {
    /// The signature algorithm this key is used with.
    pub type_: COSEAlgorithm,
    /// The key material.
    pub key: COSEKeyType,
}

impl TryFrom<&serde_cbor::Value> for COSEKey {
    type Error = WebauthnError;
    fn try_from(d: &serde_cbor::Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d).map_err(|_| WebauthnError::MalformedPublicKey)?;

        // See also https://tools.ietf.org/html/rfc8152#section-3.1
        // The map is keyed by small integers:
        //   1   -> kty, the key type
        //   3   -> alg, the signature algorithm
        //   -1.. -> key-type specific parameters
        let key_type_value = m
            .get(&serde_cbor::Value::Integer(1))
            .ok_or(WebauthnError::MalformedPublicKey)?;
        let key_type =
            cbor_try_i128!(key_type_value).map_err(|_| WebauthnError::MalformedPublicKey)?;

        let content_type_value = m
            .get(&serde_cbor::Value::Integer(3))
            .ok_or(WebauthnError::MalformedPublicKey)?;
        let content_type =
            cbor_try_i128!(content_type_value).map_err(|_| WebauthnError::MalformedPublicKey)?;

        let type_ = COSEAlgorithm::try_from(content_type)?;

        if key_type == (COSEKeyTypeId::EC_EC2 as i128) && type_ == COSEAlgorithm::ES256 {
            // crv (-1), x (-2) and y (-3)
            let curve_type_value = m
                .get(&serde_cbor::Value::Integer(-1))
                .ok_or(WebauthnError::MalformedPublicKey)?;
            let curve_type =
                cbor_try_i128!(curve_type_value).map_err(|_| WebauthnError::MalformedPublicKey)?;
            let curve = ECDSACurve::try_from(curve_type)?;

            let x_value = m
                .get(&serde_cbor::Value::Integer(-2))
                .ok_or(WebauthnError::MalformedPublicKey)?;
            let x = cbor_try_bytes!(x_value).map_err(|_| WebauthnError::MalformedPublicKey)?;

            let y_value = m
                .get(&serde_cbor::Value::Integer(-3))
                .ok_or(WebauthnError::MalformedPublicKey)?;
            let y = cbor_try_bytes!(y_value).map_err(|_| WebauthnError::MalformedPublicKey)?;

            if x.len() != 32 || y.len() != 32 {
                return Err(WebauthnError::MalformedPublicKey);
            }

            let mut x_temp = [0; 32];
            x_temp.copy_from_slice(x.as_slice());
            let mut y_temp = [0; 32];
            y_temp.copy_from_slice(y.as_slice());

            let cose_key = COSEKey {
                type_,
                key: COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: x_temp,
                    y: y_temp,
                }),
            };

            // The rfc additionally states:
            //   "Applications MUST check that the curve and the key type are
            //    consistent and reject a key if they are not."
            // this means feeding the values to openssl to validate them for us!
            cose_key.validate()?;
            Ok(cose_key)
        } else if key_type == (COSEKeyTypeId::EC_RSA as i128) && type_ == COSEAlgorithm::RS256 {
            // -1 -> n, 256 bytes
            // -2 -> e, 3 bytes
            let n_value = m
                .get(&serde_cbor::Value::Integer(-1))
                .ok_or(WebauthnError::MalformedPublicKey)?;
            let n = cbor_try_bytes!(n_value).map_err(|_| WebauthnError::MalformedPublicKey)?;

            let e_value = m
                .get(&serde_cbor::Value::Integer(-2))
                .ok_or(WebauthnError::MalformedPublicKey)?;
            let e = cbor_try_bytes!(e_value).map_err(|_| WebauthnError::MalformedPublicKey)?;

            if n.len() != 256 || e.len() != 3 {
                return Err(WebauthnError::MalformedPublicKey);
            }

            let mut e_temp = [0; 3];
            e_temp.copy_from_slice(e.as_slice());

            let cose_key = COSEKey {
                type_,
                key: COSEKeyType::RSA(COSERSAKey {
                    n: n.to_vec(),
                    e: e_temp,
                }),
            };

            cose_key.validate()?;
            Ok(cose_key)
        } else if key_type == (COSEKeyTypeId::EC_OKP as i128) && type_ == COSEAlgorithm::EDDSA {
            // https://datatracker.ietf.org/doc/html/rfc8152#section-13.2
            let curve_type_value = m
                .get(&serde_cbor::Value::Integer(-1))
                .ok_or(WebauthnError::MalformedPublicKey)?;
            let curve = cbor_try_i128!(curve_type_value)
                .map_err(|_| WebauthnError::MalformedPublicKey)
                .and_then(EDDSACurve::try_from)?;

            let x_value = m
                .get(&serde_cbor::Value::Integer(-2))
                .ok_or(WebauthnError::MalformedPublicKey)?;
            let x = cbor_try_bytes!(x_value).map_err(|_| WebauthnError::MalformedPublicKey)?;

            if x.len() != 32 {
                return Err(WebauthnError::MalformedPublicKey);
            }

            let mut x_temp = [0; 32];
            x_temp.copy_from_slice(x.as_slice());

            let cose_key = COSEKey {
                type_,
                key: COSEKeyType::EC_OKP(COSEOKPKey { curve, x: x_temp }),
            };

            cose_key.validate()?;
            Ok(cose_key)
        } else {
            debug!(?key_type, ?type_, "rejecting unrecognised COSE key shape");
            Err(WebauthnError::MalformedPublicKey)
        }
    }
}

impl TryFrom<&[u8]> for COSEKey {
    type Error = WebauthnError;
    fn try_from(d: &[u8]) -> Result<COSEKey, Self::Error> {
        let value: serde_cbor::Value =
            serde_cbor::from_slice(d).map_err(|_| WebauthnError::MalformedPublicKey)?;
        COSEKey::try_from(&value)
    }
}

impl COSEKey {
    /// The uncompressed X9.62 form `0x04 || x || y`, as U2F wants it.
    pub(crate) fn get_alg_key_ecc_x962_raw(&self) -> WebauthnResult<Vec<u8>> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let r: [u8; 1] = [0x04];
                Ok(r.iter()
                    .chain(ecpk.x.iter())
                    .chain(ecpk.y.iter())
                    .copied()
                    .collect())
            }
            _ => Err(WebauthnError::MalformedPublicKey),
        }
    }

    pub(crate) fn validate(&self) -> WebauthnResult<()> {
        self.get_openssl_pkey().map(|_| ())
    }

    fn get_openssl_pkey(&self) -> WebauthnResult<pkey::PKey<pkey::Public>> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let curve = ec2k.curve.to_openssl_nid();
                let ec_group = ec::EcGroup::from_curve_name(curve)
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;

                let xbn = bn::BigNum::from_slice(&ec2k.x)
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;
                let ybn = bn::BigNum::from_slice(&ec2k.y)
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;

                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;

                // This asserts the point is actually on the named curve.
                ec_key
                    .check_key()
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;

                pkey::PKey::from_ec_key(ec_key).map_err(|_| WebauthnError::MalformedPublicKey)
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = bn::BigNum::from_slice(&rsak.n)
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;
                let ebn = bn::BigNum::from_slice(&rsak.e)
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;

                let rsa = openssl::rsa::Rsa::from_public_components(nbn, ebn)
                    .map_err(|_| WebauthnError::MalformedPublicKey)?;

                pkey::PKey::from_rsa(rsa).map_err(|_| WebauthnError::MalformedPublicKey)
            }
            COSEKeyType::EC_OKP(okpk) => match okpk.curve {
                EDDSACurve::ED25519 => {
                    pkey::PKey::public_key_from_raw_bytes(&okpk.x, pkey::Id::ED25519)
                        .map_err(|_| WebauthnError::MalformedPublicKey)
                }
            },
        }
    }

    /// Verify `signature` over `verification_data` with this key.
    ///
    /// The signature encoding is algorithm defined: DER for ECDSA, the raw
    /// 64 byte value for Ed25519, PKCS#1 v1.5 for RSA.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> WebauthnResult<bool> {
        let pkey = self.get_openssl_pkey()?;

        match (self.type_, &self.key) {
            (COSEAlgorithm::ES256, COSEKeyType::EC_EC2(_)) => {
                // Assert the DER structure up front so an undecodable blob
                // is distinguishable from a failed verification.
                ecdsa::EcdsaSig::from_der(signature)
                    .map_err(|_| WebauthnError::MalformedSignature)?;

                let mut verifier = sign::Verifier::new(hash::MessageDigest::sha256(), &pkey)
                    .map_err(|_| WebauthnError::SignatureFailure)?;
                verifier
                    .update(verification_data)
                    .map_err(|_| WebauthnError::SignatureFailure)?;
                Ok(verifier.verify(signature).unwrap_or(false))
            }
            (COSEAlgorithm::RS256, COSEKeyType::RSA(_)) => {
                let mut verifier = sign::Verifier::new(hash::MessageDigest::sha256(), &pkey)
                    .map_err(|_| WebauthnError::SignatureFailure)?;
                verifier
                    .update(verification_data)
                    .map_err(|_| WebauthnError::SignatureFailure)?;
                Ok(verifier.verify(signature).unwrap_or(false))
            }
            (COSEAlgorithm::EDDSA, COSEKeyType::EC_OKP(_)) => {
                if signature.len() != 64 {
                    return Err(WebauthnError::MalformedSignature);
                }
                let mut verifier = sign::Verifier::new_without_digest(&pkey)
                    .map_err(|_| WebauthnError::SignatureFailure)?;
                Ok(verifier
                    .verify_oneshot(signature, verification_data)
                    .unwrap_or(false))
            }
            _ => Err(WebauthnError::MalformedPublicKey),
        }
    }
}

/// Verify a signature under the public key of an x509 certificate, with
/// the digest selected by the COSE algorithm.
pub(crate) fn verify_signature(
    alg: COSEAlgorithm,
    cert: &x509::X509,
    signature: &[u8],
    verification_data: &[u8],
) -> WebauthnResult<bool> {
    let pkey = cert
        .public_key()
        .map_err(|_| WebauthnError::UntrustedCertificate)?;

    match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 => {
            let mut verifier = sign::Verifier::new(hash::MessageDigest::sha256(), &pkey)
                .map_err(|_| WebauthnError::SignatureFailure)?;
            verifier
                .update(verification_data)
                .map_err(|_| WebauthnError::SignatureFailure)?;
            Ok(verifier.verify(signature).unwrap_or(false))
        }
        COSEAlgorithm::INSECURE_RS1 => {
            warn!("verifying an RSASSA-SHA1 attestation signature");
            let mut verifier = sign::Verifier::new(hash::MessageDigest::sha1(), &pkey)
                .map_err(|_| WebauthnError::SignatureFailure)?;
            verifier
                .update(verification_data)
                .map_err(|_| WebauthnError::SignatureFailure)?;
            Ok(verifier.verify(signature).unwrap_or(false))
        }
        COSEAlgorithm::EDDSA => {
            let mut verifier = sign::Verifier::new_without_digest(&pkey)
                .map_err(|_| WebauthnError::SignatureFailure)?;
            Ok(verifier
                .verify_oneshot(signature, verification_data)
                .unwrap_or(false))
        }
    }
}

/// Does this certificate hold an EC P-256 public key?
pub(crate) fn cert_is_secp256r1(cert: &x509::X509) -> WebauthnResult<bool> {
    let pk = cert
        .public_key()
        .map_err(|_| WebauthnError::UntrustedCertificate)?;

    let ec_key = match pk.ec_key() {
        Ok(k) => k,
        Err(_) => return Ok(false),
    };

    ec_key
        .check_key()
        .map_err(|_| WebauthnError::UntrustedCertificate)?;

    Ok(ec_key.group().curve_name() == Some(nid::Nid::X9_62_PRIME256V1))
}

/// Compute the SHA-256 digest of a slice of data.
pub fn compute_sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = sha::Sha256::new();
    hasher.update(data);
    hasher.finish().to_vec()
}

/// Compute the SHA-1 digest of a slice of data. Only the TPM certInfo
/// extraData check ever wants this.
pub(crate) fn compute_sha1(data: &[u8]) -> Vec<u8> {
    sha::sha1(data).to_vec()
}

/// Constant-time equality for secret-adjacent byte strings.
pub(crate) fn ct_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && memcmp::eq(a, b)
}

/// The set of trust anchors the caller is willing to chain attestation
/// certificates to. Read-only and freely shareable between verifications.
#[derive(Clone, Default)]
pub struct CertificateStore {
    cas: Vec<x509::X509>,
}

impl fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateStore({} trust anchors)", self.cas.len())
    }
}

impl CertificateStore {
    /// An empty store. Nothing can chain to it.
    pub fn new() -> Self {
        CertificateStore { cas: Vec::new() }
    }

    /// Build a store from DER encoded certificates.
    pub fn from_der_certs(certs: &[Vec<u8>]) -> WebauthnResult<Self> {
        let cas = certs
            .iter()
            .map(|der| x509::X509::from_der(der).map_err(|_| WebauthnError::UntrustedCertificate))
            .collect::<WebauthnResult<Vec<_>>>()?;
        Ok(CertificateStore { cas })
    }

    /// Add a trust anchor.
    pub fn add_trust_anchor(&mut self, ca: x509::X509) {
        self.cas.push(ca);
    }

    /// True when the store holds no trust anchors at all.
    pub fn is_empty(&self) -> bool {
        self.cas.is_empty()
    }

    /// Validate that `leaf` chains to one of our trust anchors, using the
    /// remaining presented certificates as untrusted intermediates.
    pub(crate) fn verify_chain(
        &self,
        leaf: &x509::X509,
        chain: &[x509::X509],
    ) -> WebauthnResult<()> {
        // An empty store can never assert trust.
        if self.cas.is_empty() {
            return Err(WebauthnError::UntrustedCertificate);
        }

        let mut chain_stack =
            stack::Stack::new().map_err(|_| WebauthnError::UntrustedCertificate)?;
        for crt in chain.iter() {
            chain_stack
                .push(crt.clone())
                .map_err(|_| WebauthnError::UntrustedCertificate)?;
        }

        let mut ca_store =
            x509::store::X509StoreBuilder::new().map_err(|_| WebauthnError::UntrustedCertificate)?;
        for ca_crt in self.cas.iter() {
            ca_store
                .add_cert(ca_crt.clone())
                .map_err(|_| WebauthnError::UntrustedCertificate)?;
        }
        let ca_store = ca_store.build();

        let mut ca_ctx =
            x509::X509StoreContext::new().map_err(|_| WebauthnError::UntrustedCertificate)?;

        let res = ca_ctx
            .init(&ca_store, leaf, &chain_stack, |ca_ctx_ref| {
                ca_ctx_ref.verify_cert().map(|_| {
                    debug!(
                        "chain verify - error depth={}, sn={:?}",
                        ca_ctx_ref.error_depth(),
                        ca_ctx_ref.current_cert().map(|crt| crt.subject_name())
                    );
                    ca_ctx_ref.error()
                })
            })
            .map_err(|_| WebauthnError::UntrustedCertificate)?;

        if res != x509::X509VerifyResult::OK {
            error!(?res, "attestation chain did not verify");
            return Err(WebauthnError::UntrustedCertificate);
        }

        Ok(())
    }
}

// If cert contains an extension with OID 1.3.6.1.4.1.45724.1.1.4
// (id-fido-gen-ce-aaguid), its value must match the aaguid in
// authenticatorData.
const FIDO_GEN_CE_AAGUID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);

/// Check the optional id-fido-gen-ce-aaguid certificate extension against
/// the aaguid the authenticator reported. Absence is fine; a mismatch is
/// an attestation failure.
pub(crate) fn validate_fido_gen_ce_aaguid(
    cert: &x509::X509,
    aaguid: &Aaguid,
) -> WebauthnResult<()> {
    let der_bytes = cert
        .to_der()
        .map_err(|_| WebauthnError::UntrustedCertificate)?;
    let x509_cert = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::UntrustedCertificate)?
        .1;

    match x509_cert
        .extensions()
        .iter()
        .find(|extension| extension.oid == FIDO_GEN_CE_AAGUID)
    {
        Some(extension) => {
            let ext_aaguid = der_parser::der::parse_der_octetstring(extension.value)
                .map_err(|_| WebauthnError::UntrustedCertificate)
                .and_then(|(_, obj)| {
                    obj.as_slice()
                        .map(|s| s.to_vec())
                        .map_err(|_| WebauthnError::UntrustedCertificate)
                })?;
            if ext_aaguid.as_slice() == aaguid.as_slice() {
                Ok(())
            } else {
                Err(WebauthnError::UntrustedCertificate)
            }
        }
        None => Ok(()),
    }
}

fn check_extension<T, F>(
    extension: &Result<Option<T>, X509Error>,
    must_be_present: bool,
    f: F,
) -> WebauthnResult<()>
where
    F: Fn(&T) -> bool,
{
    match extension {
        Ok(Some(extension)) => {
            if f(extension) {
                Ok(())
            } else {
                trace!("extension check failed");
                Err(WebauthnError::UntrustedCertificate)
            }
        }
        Ok(None) => {
            if must_be_present {
                trace!("required extension not present");
                Err(WebauthnError::UntrustedCertificate)
            } else {
                Ok(())
            }
        }
        Err(_) => {
            debug!("extension present multiple times or invalid");
            Err(WebauthnError::UntrustedCertificate)
        }
    }
}

pub(crate) struct TpmSanData<'a> {
    pub manufacturer: &'a str,
    pub _model: &'a str,
    pub _version: &'a str,
}

#[derive(Default)]
struct TpmSanDataBuilder<'a> {
    manufacturer: Option<&'a str>,
    model: Option<&'a str>,
    version: Option<&'a str>,
}

impl<'a> TpmSanDataBuilder<'a> {
    fn new() -> Self {
        Default::default()
    }

    fn manufacturer(mut self, value: &'a str) -> Self {
        self.manufacturer = Some(value);
        self
    }

    fn model(mut self, value: &'a str) -> Self {
        self.model = Some(value);
        self
    }

    fn version(mut self, value: &'a str) -> Self {
        self.version = Some(value);
        self
    }

    fn build(self) -> WebauthnResult<TpmSanData<'a>> {
        self.manufacturer
            .zip(self.model)
            .zip(self.version)
            .map(|((manufacturer, model), version)| TpmSanData {
                manufacturer,
                _model: model,
                _version: version,
            })
            .ok_or(WebauthnError::UntrustedCertificate)
    }
}

pub(crate) const TCG_AT_TPM_MANUFACTURER_RAW: &[u8] = &der_parser::oid!(raw 2.23.133 .2 .1);
pub(crate) const TCG_AT_TPM_MODEL_RAW: &[u8] = &der_parser::oid!(raw 2.23.133 .2 .2);
pub(crate) const TCG_AT_TPM_VERSION_RAW: &[u8] = &der_parser::oid!(raw 2.23.133 .2 .3);

impl<'a> TryFrom<&'a X509Name<'a>> for TpmSanData<'a> {
    type Error = WebauthnError;

    fn try_from(x509_name: &'a X509Name<'a>) -> Result<Self, Self::Error> {
        let mut builder = TpmSanDataBuilder::new();
        for attribute in x509_name.iter_attributes() {
            let value = match attribute.attr_value().as_str() {
                Ok(value) => value,
                Err(_) => continue,
            };
            let attr_type = attribute.attr_type().as_bytes();
            if attr_type == TCG_AT_TPM_MANUFACTURER_RAW {
                builder = builder.manufacturer(value);
            } else if attr_type == TCG_AT_TPM_MODEL_RAW {
                builder = builder.model(value);
            } else if attr_type == TCG_AT_TPM_VERSION_RAW {
                builder = builder.version(value);
            }
        }
        builder.build()
    }
}

/// Assert the AIK certificate requirements of the TPM attestation format.
pub(crate) fn assert_tpm_attest_req(cert: &x509::X509) -> WebauthnResult<()> {
    let der_bytes = cert
        .to_der()
        .map_err(|_| WebauthnError::UntrustedCertificate)?;
    let x509_cert = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::UntrustedCertificate)?
        .1;

    // TPM attestation certificate MUST have the following fields/extensions:

    // Version MUST be set to 3.
    if x509_cert.version != X509Version::V3 {
        return Err(WebauthnError::UntrustedCertificate);
    }

    // Subject field MUST be set to empty.
    if x509_cert.subject.iter_attributes().next().is_some() {
        return Err(WebauthnError::UntrustedCertificate);
    }

    // The Subject Alternative Name extension MUST be set as defined in
    // [TPMv2-EK-Profile] section 3.2.9.
    check_extension(
        &x509_cert.subject_alternative_name(),
        true,
        |subject_alternative_name| {
            // In accordance with RFC 5280, this extension MUST be critical if
            // subject is empty. We've already returned if the subject is
            // non-empty, so just check that the extension is critical.
            if !subject_alternative_name.critical {
                return false;
            }

            // The issuer MUST include TPM manufacturer, TPM part number and
            // TPM firmware version, using the directoryName form within the
            // GeneralName structure. The manufacturer must name a registered
            // TCG vendor.
            subject_alternative_name
                .value
                .general_names
                .iter()
                .any(|general_name| {
                    if let GeneralName::DirectoryName(x509_name) = general_name {
                        TpmSanData::try_from(x509_name)
                            .and_then(|san_data| {
                                tpm_device_attribute_parser(san_data.manufacturer.as_bytes())
                                    .map_err(|_| WebauthnError::UntrustedCertificate)
                            })
                            .and_then(|(_, manufacturer_bytes)| {
                                TpmVendor::try_from(&manufacturer_bytes)
                            })
                            .is_ok()
                    } else {
                        false
                    }
                })
        },
    )?;

    // The Extended Key Usage extension MUST contain the
    // tcg-kp-AIKCertificate OID 2.23.133.8.3.
    check_extension(
        &x509_cert.extended_key_usage(),
        true,
        |extended_key_usage| {
            extended_key_usage
                .value
                .other
                .contains(&der_parser::oid!(2.23.133 .8 .3))
        },
    )?;

    // The Basic Constraints extension MUST have the CA component set to false.
    check_extension(&x509_cert.basic_constraints(), true, |basic_constraints| {
        !basic_constraints.value.ca
    })?;

    // An Authority Information Access (AIA) extension and a CRL Distribution
    // Point extension are both OPTIONAL as the status of many attestation
    // certificates is available through metadata services.

    Ok(())
}

/// Assert the attestation certificate requirements of the packed format.
pub(crate) fn assert_packed_attest_req(cert: &x509::X509) -> WebauthnResult<()> {
    let der_bytes = cert
        .to_der()
        .map_err(|_| WebauthnError::UntrustedCertificate)?;
    let x509_cert = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::UntrustedCertificate)?
        .1;

    // The attestation certificate MUST have the following fields/extensions:
    // Version MUST be set to 3 (which is indicated by an ASN.1 INTEGER with
    // value 2).
    if x509_cert.version != X509Version::V3 {
        trace!("X509 version != v3");
        return Err(WebauthnError::UntrustedCertificate);
    }

    // Subject field MUST be set to:
    //
    // Subject-C:  country where the Authenticator vendor is incorporated
    // Subject-O:  legal name of the Authenticator vendor
    // Subject-OU: literal string "Authenticator Attestation"
    // Subject-CN: a UTF8String of the vendor's choosing
    let subject = &x509_cert.subject;

    let subject_c = subject.iter_country().take(1).next();
    let subject_o = subject.iter_organization().take(1).next();
    let subject_ou = subject.iter_organizational_unit().take(1).next();
    let subject_cn = subject.iter_common_name().take(1).next();

    if subject_c.is_none() || subject_o.is_none() || subject_cn.is_none() {
        trace!("subject is missing a required attribute");
        return Err(WebauthnError::UntrustedCertificate);
    }

    match subject_ou {
        Some(ou) => match ou.attr_value().as_str() {
            Ok(ou_d) => {
                if ou_d != "Authenticator Attestation" {
                    trace!("ou != Authenticator Attestation");
                    return Err(WebauthnError::UntrustedCertificate);
                }
            }
            Err(_) => {
                trace!("ou invalid");
                return Err(WebauthnError::UntrustedCertificate);
            }
        },
        None => {
            trace!("ou not found");
            return Err(WebauthnError::UntrustedCertificate);
        }
    }

    // If the related attestation root certificate is used for multiple
    // authenticator models, the id-fido-gen-ce-aaguid extension MUST be
    // present and MUST NOT be marked critical. The value match against
    // authenticatorData happens in the attestation verifier; only the
    // critical requirement is checked here.
    check_extension(
        &x509_cert.get_extension_unique(&FIDO_GEN_CE_AAGUID),
        false,
        |fido_gen_ce_aaguid| !fido_gen_ce_aaguid.critical,
    )?;

    // The Basic Constraints extension MUST have the CA component set to false.
    check_extension(&x509_cert.basic_constraints(), true, |basic_constraints| {
        !basic_constraints.value.ca
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use hex_literal::hex;
    use serde_cbor::Value;

    #[test]
    fn cbor_es256() {
        let hex_data = hex!(
                "A5"         // Map - 5 elements
                "01 02"      //   1:   2,  ; kty: EC2 key type
                "03 26"      //   3:  -7,  ; alg: ES256 signature algorithm
                "20 01"      //  -1:   1,  ; crv: P-256 curve
                "21 58 20   65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d" // -2:   x,  ; x-coordinate
                "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c" // -3:   y,  ; y-coordinate
        );

        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::ES256);
        match key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(
                    pkey.x,
                    hex!("65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d")
                );
                assert_eq!(
                    pkey.y,
                    hex!("1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c")
                );
                assert_eq!(pkey.curve, ECDSACurve::SECP256R1);
            }
            _ => panic!("Key should be parsed EC2 key"),
        }
    }

    #[test]
    fn cbor_ed25519() {
        let hex_data = hex!(
            "A4"         // Map - 4 elements
            "01 01"      //   1:   1,  ; kty: OKP key type
            "03 27"      //   3:  -8,  ; alg: EDDSA signature algorithm
            "20 06"      //  -1:   6,  ; crv: Ed25519 curve
            "21 58 20   43565027f918beb00257d112b903d15b93f5cbc7562dfc8458fbefd714546e3c" // -2:   x,  ; public key
        );
        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();
        assert_eq!(key.type_, COSEAlgorithm::EDDSA);
        match key.key {
            COSEKeyType::EC_OKP(pkey) => {
                assert_eq!(
                    pkey.x,
                    hex!("43565027f918beb00257d112b903d15b93f5cbc7562dfc8458fbefd714546e3c")
                );
                assert_eq!(pkey.curve, EDDSACurve::ED25519);
            }
            _ => panic!("Key should be parsed OKP key"),
        }
    }

    #[test]
    fn cbor_es256_wrong_coordinate_size_rejected() {
        // x truncated to 31 bytes.
        let hex_data = hex!(
            "A5"
            "01 02"
            "03 26"
            "20 01"
            "21 58 1f   65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c0855"
            "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );

        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        assert_eq!(
            COSEKey::try_from(&val),
            Err(WebauthnError::MalformedPublicKey)
        );
    }

    #[test]
    fn cbor_garbage_rejected() {
        assert_eq!(
            COSEKey::try_from(&[0xff_u8, 0x00, 0x12][..]),
            Err(WebauthnError::MalformedPublicKey)
        );
    }

    #[test]
    fn ct_equal_lengths() {
        assert!(ct_equal(b"abcd", b"abcd"));
        assert!(!ct_equal(b"abcd", b"abce"));
        assert!(!ct_equal(b"abcd", b"abc"));
        assert!(ct_equal(b"", b""));
    }
}
