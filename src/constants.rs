//! Wire-format constants shared across the parsers and verifiers.

/// Default length of a generated challenge in bytes. Can this ever change?
pub const CHALLENGE_SIZE_BYTES: usize = 32;

/// The clientDataJSON type literal for a registration ceremony.
pub(crate) const CLIENT_DATA_TYPE_CREATE: &str = "webauthn.create";
/// The clientDataJSON type literal for an authentication ceremony.
pub(crate) const CLIENT_DATA_TYPE_GET: &str = "webauthn.get";

// Authenticator data flags.
//   [ ED | AT | 0 | 0 | 0 | UV | 0 | UP ]
//    7    6                2        0
pub(crate) const FLAG_UP: u8 = 1 << 0;
pub(crate) const FLAG_UV: u8 = 1 << 2;
pub(crate) const FLAG_AT: u8 = 1 << 6;
pub(crate) const FLAG_ED: u8 = 1 << 7;

/// TPM_GENERATED_VALUE, 0xff followed by "TCG".
pub(crate) const TPM_GENERATED_VALUE: u32 = 0xff54_4347;

/// The hostname SafetyNet attestation certificates must be issued to.
pub(crate) const SAFETYNET_ATTEST_HOSTNAME: &str = "attest.android.com";
