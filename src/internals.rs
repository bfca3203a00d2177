//! Binary parsers for the fixed-layout structures that arrive inside
//! attestation and assertion payloads: the CTAP2 authenticator data blob
//! and the TPM 2.0 structures carried by the tpm attestation format.
//! Everything here is written as incremental nom combinators; a short
//! read or trailing garbage is a parse failure, never a panic.

use nom::bytes::complete::{tag, take, take_while_m_n};
use nom::combinator::{cond, consumed, eof};
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u32, be_u64, u8 as be_u8};

use crate::constants::*;
use crate::error::*;
use crate::proto::{AttestedCredentialData, AuthenticatorData};

/// Run a single CBOR item out of the front of `i`, returning the rest.
/// The item length is discovered from the deserializer's byte offset,
/// which is the only reliable way to find where a COSE key ends and the
/// extension map begins.
fn cbor_item_parser(i: &[u8]) -> nom::IResult<&[u8], serde_cbor::Value> {
    let mut deserializer = serde_cbor::Deserializer::from_slice(i);
    let value: serde_cbor::Value = serde::de::Deserialize::deserialize(&mut deserializer)
        .map_err(|_| nom::Err::Failure(nom::error::Error::new(i, nom::error::ErrorKind::Fail)))?;
    let consumed = deserializer.byte_offset();
    Ok((&i[consumed..], value))
}

fn acd_parser(i: &[u8]) -> nom::IResult<&[u8], AttestedCredentialData> {
    let (i, aaguid) = take(16_usize)(i)?;
    let (i, cred_id) = length_data(be_u16)(i)?;
    let (i, (key_raw, _key)) = consumed(cbor_item_parser)(i)?;

    let mut aaguid_copy = [0; 16];
    aaguid_copy.copy_from_slice(aaguid);

    Ok((
        i,
        AttestedCredentialData {
            aaguid: aaguid_copy,
            credential_id: cred_id.to_vec().into(),
            credential_public_key: key_raw.to_vec().into(),
        },
    ))
}

fn extensions_parser(i: &[u8]) -> nom::IResult<&[u8], Vec<u8>> {
    let (i, (ext_raw, _ext)) = consumed(cbor_item_parser)(i)?;
    Ok((i, ext_raw.to_vec()))
}

fn authenticator_data_parser(i: &[u8]) -> nom::IResult<&[u8], AuthenticatorData> {
    let (i, rp_id_hash) = take(32_usize)(i)?;
    let (i, flags) = be_u8(i)?;
    let (i, counter) = be_u32(i)?;

    let acd_present = (flags & FLAG_AT) != 0;
    let extensions_present = (flags & FLAG_ED) != 0;

    let (i, acd) = cond(acd_present, acd_parser)(i)?;
    let (i, extensions) = cond(extensions_present, extensions_parser)(i)?;
    let (i, _) = eof(i)?;

    Ok((
        i,
        AuthenticatorData {
            rp_id_hash: rp_id_hash.to_vec(),
            counter,
            user_present: (flags & FLAG_UP) != 0,
            user_verified: (flags & FLAG_UV) != 0,
            acd,
            extensions,
        },
    ))
}

/// Parse a raw authenticator data blob. Any structural problem, including
/// bytes left over after the declared content, is malformed.
pub(crate) fn parse_authenticator_data(raw: &[u8]) -> WebauthnResult<AuthenticatorData> {
    authenticator_data_parser(raw)
        .map(|(_, ad)| ad)
        .map_err(|e| {
            debug!(?e, "authenticator data failed to parse");
            WebauthnError::MalformedAuthenticatorData
        })
}

// TPM 2.0 structures, as needed by the tpm attestation statement.
// References are TPMv2-Part2 "Structures"; only the shapes webauthn
// attestation can legally carry are represented.

/// TPM_ALG_ID constants this crate recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TpmAlgId {
    Rsa = 0x0001,
    Sha1 = 0x0004,
    Sha256 = 0x000b,
    Null = 0x0010,
    RsaSsa = 0x0014,
    EcDsa = 0x0018,
    Ecc = 0x0023,
}

impl TpmAlgId {
    fn try_from_u16(v: u16) -> WebauthnResult<Self> {
        match v {
            0x0001 => Ok(TpmAlgId::Rsa),
            0x0004 => Ok(TpmAlgId::Sha1),
            0x000b => Ok(TpmAlgId::Sha256),
            0x0010 => Ok(TpmAlgId::Null),
            0x0014 => Ok(TpmAlgId::RsaSsa),
            0x0018 => Ok(TpmAlgId::EcDsa),
            0x0023 => Ok(TpmAlgId::Ecc),
            _ => Err(WebauthnError::InvalidTPMAttestation),
        }
    }
}

/// TPM_ST tag values for attestation structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TpmSt {
    AttestNv = 0x8014,
    AttestCommandAudit = 0x8015,
    AttestSessionAudit = 0x8016,
    AttestCertify = 0x8017,
    AttestQuote = 0x8018,
    AttestTime = 0x8019,
    AttestCreation = 0x801a,
}

impl TpmSt {
    fn try_from_u16(v: u16) -> WebauthnResult<Self> {
        match v {
            0x8014 => Ok(TpmSt::AttestNv),
            0x8015 => Ok(TpmSt::AttestCommandAudit),
            0x8016 => Ok(TpmSt::AttestSessionAudit),
            0x8017 => Ok(TpmSt::AttestCertify),
            0x8018 => Ok(TpmSt::AttestQuote),
            0x8019 => Ok(TpmSt::AttestTime),
            0x801a => Ok(TpmSt::AttestCreation),
            _ => Err(WebauthnError::InvalidTPMAttestation),
        }
    }
}

/// A TPM2B_NAME. Names are either absent, a handle, or a digest prefixed
/// by the two byte algorithm that produced it; the prefix stays attached
/// so comparisons cover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tpm2bName {
    None,
    Handle(u32),
    Digest(Vec<u8>),
}

fn tpm2b_name_parser(i: &[u8]) -> nom::IResult<&[u8], Tpm2bName> {
    let (i, data) = length_data(be_u16)(i)?;
    let name = match data.len() {
        0 => Tpm2bName::None,
        4 => Tpm2bName::Handle(u32::from_be_bytes([data[0], data[1], data[2], data[3]])),
        _ => Tpm2bName::Digest(data.to_vec()),
    };
    Ok((i, name))
}

/// TPMS_CLOCK_INFO. Carried through for completeness; webauthn ignores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TpmsClockInfo {
    pub _clock: u64,
    pub _reset_count: u32,
    pub _restart_count: u32,
    pub _safe: bool,
}

fn tpms_clock_info_parser(i: &[u8]) -> nom::IResult<&[u8], TpmsClockInfo> {
    let (i, clock) = be_u64(i)?;
    let (i, reset_count) = be_u32(i)?;
    let (i, restart_count) = be_u32(i)?;
    let (i, safe) = be_u8(i)?;
    Ok((
        i,
        TpmsClockInfo {
            _clock: clock,
            _reset_count: reset_count,
            _restart_count: restart_count,
            _safe: safe != 0,
        },
    ))
}

/// The algorithm-specific parameters of a TPMT_PUBLIC. Symmetric and
/// scheme algorithms must be TPM_ALG_NULL for an attested signing key and
/// are consumed during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TpmuPublicParms {
    Rsa {
        key_bits: u16,
        /// Zero on the wire means the default exponent 2^16 + 1.
        exponent: u32,
    },
    Ecc {
        curve_id: u16,
    },
}

/// The unique field of a TPMT_PUBLIC, i.e. the actual public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TpmuPublicId {
    Rsa(Vec<u8>),
    Ecc { x: Vec<u8>, y: Vec<u8> },
}

/// A TPMT_PUBLIC, the TPM's representation of the credential public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TpmtPublic {
    pub name_alg: TpmAlgId,
    pub _object_attributes: u32,
    pub _auth_policy: Vec<u8>,
    pub parameters: TpmuPublicParms,
    pub unique: TpmuPublicId,
}

fn tpm_alg_parser(i: &[u8]) -> nom::IResult<&[u8], u16> {
    be_u16(i)
}

fn nom_fail<T>(i: &[u8]) -> Result<T, nom::Err<nom::error::Error<&[u8]>>> {
    Err(nom::Err::Failure(nom::error::Error::new(
        i,
        nom::error::ErrorKind::Fail,
    )))
}

fn tpmt_public_parser(i: &[u8]) -> nom::IResult<&[u8], TpmtPublic> {
    let orig = i;
    let (i, type_raw) = tpm_alg_parser(i)?;
    let type_ = match TpmAlgId::try_from_u16(type_raw) {
        Ok(t) => t,
        Err(_) => return nom_fail(orig),
    };
    let (i, name_alg_raw) = tpm_alg_parser(i)?;
    let name_alg = match TpmAlgId::try_from_u16(name_alg_raw) {
        Ok(t) => t,
        Err(_) => return nom_fail(orig),
    };
    let (i, object_attributes) = be_u32(i)?;
    let (i, auth_policy) = length_data(be_u16)(i)?;

    // Symmetric and scheme parameters other than TPM_ALG_NULL would carry
    // their own parameter blocks; attestation keys never use them.
    match type_ {
        TpmAlgId::Rsa => {
            let (i, symmetric_raw) = tpm_alg_parser(i)?;
            let (i, scheme_raw) = tpm_alg_parser(i)?;
            match (
                TpmAlgId::try_from_u16(symmetric_raw),
                TpmAlgId::try_from_u16(scheme_raw),
            ) {
                (Ok(TpmAlgId::Null), Ok(_)) => {}
                _ => return nom_fail(orig),
            }
            let (i, key_bits) = be_u16(i)?;
            let (i, exponent) = be_u32(i)?;
            let (i, modulus) = length_data(be_u16)(i)?;
            let (i, _) = eof(i)?;
            Ok((
                i,
                TpmtPublic {
                    name_alg,
                    _object_attributes: object_attributes,
                    _auth_policy: auth_policy.to_vec(),
                    parameters: TpmuPublicParms::Rsa { key_bits, exponent },
                    unique: TpmuPublicId::Rsa(modulus.to_vec()),
                },
            ))
        }
        TpmAlgId::Ecc => {
            let (i, symmetric_raw) = tpm_alg_parser(i)?;
            let (i, scheme_raw) = tpm_alg_parser(i)?;
            match (
                TpmAlgId::try_from_u16(symmetric_raw),
                TpmAlgId::try_from_u16(scheme_raw),
            ) {
                (Ok(TpmAlgId::Null), Ok(_)) => {}
                _ => return nom_fail(orig),
            }
            let (i, curve_id) = be_u16(i)?;
            let (i, kdf_raw) = tpm_alg_parser(i)?;
            if TpmAlgId::try_from_u16(kdf_raw).is_err() {
                return nom_fail(orig);
            }
            let (i, x) = length_data(be_u16)(i)?;
            let (i, y) = length_data(be_u16)(i)?;
            let (i, _) = eof(i)?;
            Ok((
                i,
                TpmtPublic {
                    name_alg,
                    _object_attributes: object_attributes,
                    _auth_policy: auth_policy.to_vec(),
                    parameters: TpmuPublicParms::Ecc { curve_id },
                    unique: TpmuPublicId::Ecc {
                        x: x.to_vec(),
                        y: y.to_vec(),
                    },
                },
            ))
        }
        _ => nom_fail(orig),
    }
}

impl TryFrom<&[u8]> for TpmtPublic {
    type Error = WebauthnError;
    fn try_from(data: &[u8]) -> Result<TpmtPublic, Self::Error> {
        tpmt_public_parser(data)
            .map(|(_, p)| p)
            .map_err(|e| {
                debug!(?e, "TPMT_PUBLIC failed to parse");
                WebauthnError::InvalidTPMAttestation
            })
    }
}

/// The attested-structure union of a TPMS_ATTEST. Only certify is valid
/// for webauthn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TpmuAttest {
    AttestCertify(Tpm2bName, Tpm2bName),
}

/// A TPMS_ATTEST, the signed payload of the tpm statement's certInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TpmsAttest {
    pub type_: TpmSt,
    pub _qualified_signer: Tpm2bName,
    pub extra_data: Option<Vec<u8>>,
    pub _clock_info: TpmsClockInfo,
    pub _firmware_version: u64,
    pub typeattested: TpmuAttest,
}

fn tpms_attest_parser(i: &[u8]) -> nom::IResult<&[u8], TpmsAttest> {
    let orig = i;
    // Verify that magic is set to TPM_GENERATED_VALUE. Enforced at parse
    // time so nothing downstream can forget it.
    let (i, magic) = be_u32(i)?;
    if magic != TPM_GENERATED_VALUE {
        return nom_fail(orig);
    }
    let (i, type_raw) = be_u16(i)?;
    let type_ = match TpmSt::try_from_u16(type_raw) {
        Ok(t) => t,
        Err(_) => return nom_fail(orig),
    };
    let (i, qualified_signer) = tpm2b_name_parser(i)?;
    let (i, extra_data) = length_data(be_u16)(i)?;
    let (i, clock_info) = tpms_clock_info_parser(i)?;
    let (i, firmware_version) = be_u64(i)?;

    let (i, typeattested) = match type_ {
        TpmSt::AttestCertify => {
            let (i, name) = tpm2b_name_parser(i)?;
            let (i, qualified_name) = tpm2b_name_parser(i)?;
            (i, TpmuAttest::AttestCertify(name, qualified_name))
        }
        _ => return nom_fail(orig),
    };
    let (i, _) = eof(i)?;

    Ok((
        i,
        TpmsAttest {
            type_,
            _qualified_signer: qualified_signer,
            extra_data: if extra_data.is_empty() {
                None
            } else {
                Some(extra_data.to_vec())
            },
            _clock_info: clock_info,
            _firmware_version: firmware_version,
            typeattested,
        },
    ))
}

impl TryFrom<&[u8]> for TpmsAttest {
    type Error = WebauthnError;
    fn try_from(data: &[u8]) -> Result<TpmsAttest, Self::Error> {
        tpms_attest_parser(data)
            .map(|(_, a)| a)
            .map_err(|e| {
                debug!(?e, "TPMS_ATTEST failed to parse");
                WebauthnError::InvalidTPMAttestation
            })
    }
}

/// A TPMT_SIGNATURE. Despite TPMv2-Part2, authenticators in the field
/// emit the bare signature bytes with no algorithm framing, so an input
/// whose leading two bytes are not a signature algorithm id is taken
/// whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TpmtSignature {
    RawSignature(Vec<u8>),
}

impl TryFrom<&[u8]> for TpmtSignature {
    type Error = WebauthnError;
    fn try_from(data: &[u8]) -> Result<TpmtSignature, Self::Error> {
        if data.len() >= 2 {
            let alg = u16::from_be_bytes([data[0], data[1]]);
            if alg == TpmAlgId::RsaSsa as u16 {
                // TPMS_SIGNATURE_RSA: hash alg then a TPM2B buffer.
                fn parsed(i: &[u8]) -> nom::IResult<&[u8], Vec<u8>> {
                    let (i, _alg) = be_u16(i)?;
                    let (i, _hash) = be_u16(i)?;
                    let (i, sig) = length_data(be_u16)(i)?;
                    let (i, _) = eof(i)?;
                    Ok((i, sig.to_vec()))
                }
                if let Ok((_, sig)) = parsed(data) {
                    return Ok(TpmtSignature::RawSignature(sig));
                }
            }
        }
        Ok(TpmtSignature::RawSignature(data.to_vec()))
    }
}

/// Parse the `id:HHHHHHHH` device attribute form TPM vendors use in the
/// subject alternative name of AIK certificates.
pub(crate) fn tpm_device_attribute_parser(i: &[u8]) -> nom::IResult<&[u8], [u8; 4]> {
    let (i, _) = tag("id:")(i)?;
    let (i, hex_digits) = take_while_m_n(8, 8, |c: u8| c.is_ascii_hexdigit())(i)?;

    let mut out = [0_u8; 4];
    for (idx, pair) in hex_digits.chunks_exact(2).enumerate() {
        let high = (pair[0] as char).to_digit(16);
        let low = (pair[1] as char).to_digit(16);
        match (high, low) {
            (Some(h), Some(l)) => out[idx] = ((h << 4) | l) as u8,
            _ => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    i,
                    nom::error::ErrorKind::Fail,
                )))
            }
        }
    }
    Ok((i, out))
}

/// The TCG registered TPM manufacturers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TpmVendor {
    AMD,
    Atmel,
    Broadcom,
    Cisco,
    FlysliceTechnologies,
    FuzhouRockchip,
    Google,
    HPE,
    Huawei,
    IBM,
    Infineon,
    Intel,
    Lenovo,
    Microsoft,
    NationalSemiconductor,
    Nationz,
    NuvotonTechnology,
    Qualcomm,
    SMSC,
    Samsung,
    Sinosun,
    STMicroelectronics,
    TexasInstruments,
    Winbond,
}

impl TryFrom<&[u8; 4]> for TpmVendor {
    type Error = WebauthnError;
    fn try_from(v: &[u8; 4]) -> Result<TpmVendor, Self::Error> {
        match v {
            b"AMD\0" => Ok(TpmVendor::AMD),
            b"ATML" => Ok(TpmVendor::Atmel),
            b"BRCM" => Ok(TpmVendor::Broadcom),
            b"CSCO" => Ok(TpmVendor::Cisco),
            b"FLYS" => Ok(TpmVendor::FlysliceTechnologies),
            b"ROCC" => Ok(TpmVendor::FuzhouRockchip),
            b"GOOG" => Ok(TpmVendor::Google),
            b"HPE\0" => Ok(TpmVendor::HPE),
            b"HISI" => Ok(TpmVendor::Huawei),
            b"IBM\0" => Ok(TpmVendor::IBM),
            b"IFX\0" => Ok(TpmVendor::Infineon),
            b"INTC" => Ok(TpmVendor::Intel),
            b"LEN\0" => Ok(TpmVendor::Lenovo),
            b"MSFT" => Ok(TpmVendor::Microsoft),
            b"NSM\x20" => Ok(TpmVendor::NationalSemiconductor),
            b"NTZ\0" => Ok(TpmVendor::Nationz),
            b"NTC\0" => Ok(TpmVendor::NuvotonTechnology),
            b"QCOM" => Ok(TpmVendor::Qualcomm),
            b"SMSC" => Ok(TpmVendor::SMSC),
            b"SMSN" => Ok(TpmVendor::Samsung),
            b"SNS\0" => Ok(TpmVendor::Sinosun),
            b"STM\x20" => Ok(TpmVendor::STMicroelectronics),
            b"TXN\0" => Ok(TpmVendor::TexasInstruments),
            b"WEC\0" => Ok(TpmVendor::Winbond),
            _ => Err(WebauthnError::UntrustedCertificate),
        }
    }
}

/// Builds a well formed authenticator data blob around the supplied
/// flags and trailing sections. Test scaffolding for the parser and the
/// ceremony tests.
#[cfg(test)]
pub(crate) fn build_auth_data(
    rp_id: &str,
    flags: u8,
    counter: u32,
    acd: Option<(&[u8; 16], &[u8], &[u8])>,
    extensions: Option<&[u8]>,
) -> Vec<u8> {
    let mut out = crate::crypto::compute_sha256(rp_id.as_bytes());
    out.push(flags);
    out.extend_from_slice(&counter.to_be_bytes());
    if let Some((aaguid, cred_id, cose_key)) = acd {
        out.extend_from_slice(aaguid.as_slice());
        out.extend_from_slice(&(cred_id.len() as u16).to_be_bytes());
        out.extend_from_slice(cred_id);
        out.extend_from_slice(cose_key);
    }
    if let Some(ext) = extensions {
        out.extend_from_slice(ext);
    }
    out
}
