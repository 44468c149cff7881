//! PKIStatus / PKIFailureInfo / PKIStatusInfo — the status model (spec §3, §9).
//!
//! `render` is pure: it never reads from a global error queue, only from the
//! `PKIStatusInfo` it is handed.

use serde::{Deserialize, Serialize};

/// Closed enumeration of PKIStatus values (RFC 4210 §5.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PKIStatus {
    /// Request was granted as-is.
    Accepted,
    /// Request was granted with modifications.
    GrantedWithMods,
    /// Request was rejected.
    Rejection,
    /// Response to an enrolment request is not yet available.
    Waiting,
    /// Revocation is pending.
    RevocationWarning,
    /// Revocation has occurred.
    RevocationNotification,
    /// Update of a key is warranted.
    KeyUpdateWarning,
}

impl PKIStatus {
    /// Short, stable textual name used by `render`.
    pub fn name(self) -> &'static str {
        match self {
            PKIStatus::Accepted => "accepted",
            PKIStatus::GrantedWithMods => "grantedWithMods",
            PKIStatus::Rejection => "rejection",
            PKIStatus::Waiting => "waiting",
            PKIStatus::RevocationWarning => "revocationWarning",
            PKIStatus::RevocationNotification => "revocationNotification",
            PKIStatus::KeyUpdateWarning => "keyUpdateWarning",
        }
    }

    /// Maps the RFC 4210 integer encoding to/from the enum.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => PKIStatus::Accepted,
            1 => PKIStatus::GrantedWithMods,
            2 => PKIStatus::Rejection,
            3 => PKIStatus::Waiting,
            4 => PKIStatus::RevocationWarning,
            5 => PKIStatus::RevocationNotification,
            6 => PKIStatus::KeyUpdateWarning,
            _ => return None,
        })
    }

    /// The RFC 4210 integer encoding for this status.
    pub fn to_code(self) -> i32 {
        match self {
            PKIStatus::Accepted => 0,
            PKIStatus::GrantedWithMods => 1,
            PKIStatus::Rejection => 2,
            PKIStatus::Waiting => 3,
            PKIStatus::RevocationWarning => 4,
            PKIStatus::RevocationNotification => 5,
            PKIStatus::KeyUpdateWarning => 6,
        }
    }
}

/// The 27 named PKIFailureInfo bits (RFC 4210 §5.2.3). Bit order follows the
/// ASN.1 BIT STRING definition; no bit above 26 is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum FailureBit {
    BadAlg = 0,
    BadMessageCheck = 1,
    BadRequest = 2,
    BadTime = 3,
    BadCertId = 4,
    BadDataFormat = 5,
    WrongAuthority = 6,
    IncorrectData = 7,
    MissingTimeStamp = 8,
    BadPop = 9,
    CertRevoked = 10,
    CertConfirmed = 11,
    WrongIntegrity = 12,
    BadRecipientNonce = 13,
    TimeNotAvailable = 14,
    UnacceptedPolicy = 15,
    UnacceptedExtension = 16,
    AddInfoNotAvailable = 17,
    BadSenderNonce = 18,
    BadCertTemplate = 19,
    SignerNotTrusted = 20,
    TransactionIdInUse = 21,
    UnsupportedVersion = 22,
    NotAuthorized = 23,
    SystemUnavail = 24,
    SystemFailure = 25,
    DuplicateCertReq = 26,
}

impl FailureBit {
    const ALL: [FailureBit; 27] = [
        FailureBit::BadAlg,
        FailureBit::BadMessageCheck,
        FailureBit::BadRequest,
        FailureBit::BadTime,
        FailureBit::BadCertId,
        FailureBit::BadDataFormat,
        FailureBit::WrongAuthority,
        FailureBit::IncorrectData,
        FailureBit::MissingTimeStamp,
        FailureBit::BadPop,
        FailureBit::CertRevoked,
        FailureBit::CertConfirmed,
        FailureBit::WrongIntegrity,
        FailureBit::BadRecipientNonce,
        FailureBit::TimeNotAvailable,
        FailureBit::UnacceptedPolicy,
        FailureBit::UnacceptedExtension,
        FailureBit::AddInfoNotAvailable,
        FailureBit::BadSenderNonce,
        FailureBit::BadCertTemplate,
        FailureBit::SignerNotTrusted,
        FailureBit::TransactionIdInUse,
        FailureBit::UnsupportedVersion,
        FailureBit::NotAuthorized,
        FailureBit::SystemUnavail,
        FailureBit::SystemFailure,
        FailureBit::DuplicateCertReq,
    ];

    /// The name RFC 4210 gives this bit, used by `render`.
    pub fn name(self) -> &'static str {
        match self {
            FailureBit::BadAlg => "badAlg",
            FailureBit::BadMessageCheck => "badMessageCheck",
            FailureBit::BadRequest => "badRequest",
            FailureBit::BadTime => "badTime",
            FailureBit::BadCertId => "badCertId",
            FailureBit::BadDataFormat => "badDataFormat",
            FailureBit::WrongAuthority => "wrongAuthority",
            FailureBit::IncorrectData => "incorrectData",
            FailureBit::MissingTimeStamp => "missingTimeStamp",
            FailureBit::BadPop => "badPOP",
            FailureBit::CertRevoked => "certRevoked",
            FailureBit::CertConfirmed => "certConfirmed",
            FailureBit::WrongIntegrity => "wrongIntegrity",
            FailureBit::BadRecipientNonce => "badRecipientNonce",
            FailureBit::TimeNotAvailable => "timeNotAvailable",
            FailureBit::UnacceptedPolicy => "unacceptedPolicy",
            FailureBit::UnacceptedExtension => "unacceptedExtension",
            FailureBit::AddInfoNotAvailable => "addInfoNotAvailable",
            FailureBit::BadSenderNonce => "badSenderNonce",
            FailureBit::BadCertTemplate => "badCertTemplate",
            FailureBit::SignerNotTrusted => "signerNotTrusted",
            FailureBit::TransactionIdInUse => "transactionIdInUse",
            FailureBit::UnsupportedVersion => "unsupportedVersion",
            FailureBit::NotAuthorized => "notAuthorized",
            FailureBit::SystemUnavail => "systemUnavail",
            FailureBit::SystemFailure => "systemFailure",
            FailureBit::DuplicateCertReq => "duplicateCertReq",
        }
    }
}

/// A bitset over the 27 `FailureBit`s. Invariant: no bit above 26 is ever set,
/// which this type enforces by construction (the only way to set a bit is
/// through a `FailureBit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PKIFailureInfo(u32);

impl PKIFailureInfo {
    /// The empty failure set.
    pub fn empty() -> Self {
        Self(0)
    }

    /// True if no bits are set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Sets a bit, returning `self` for chaining.
    pub fn with(mut self, bit: FailureBit) -> Self {
        self.0 |= 1 << (bit as u32);
        self
    }

    /// Sets a bit in place.
    pub fn set(&mut self, bit: FailureBit) {
        self.0 |= 1 << (bit as u32);
    }

    /// True if the given bit is set.
    pub fn contains(&self, bit: FailureBit) -> bool {
        self.0 & (1 << (bit as u32)) != 0
    }

    /// Builds a `PKIFailureInfo` from a raw 27-bit mask, masking off any
    /// bits above 26 per the invariant.
    pub fn from_raw(mask: u32) -> Self {
        Self(mask & 0x07FF_FFFF)
    }

    /// The raw bitmask, for wire encoding.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Iterates the set bits in ascending order, for `render`.
    pub fn iter_set(&self) -> impl Iterator<Item = FailureBit> + '_ {
        FailureBit::ALL.iter().copied().filter(move |b| self.contains(*b))
    }
}

/// `{status, failInfo, statusString}` (spec §3). Invariant: when `status` is
/// `Accepted` or `GrantedWithMods`, `fail_info` is empty — enforced at
/// construction by `PKIStatusInfo::new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PKIStatusInfo {
    status: PKIStatus,
    fail_info: PKIFailureInfo,
    status_string: Vec<String>,
}

impl PKIStatusInfo {
    /// Builds a status info, clearing `fail_info` if `status` is a success
    /// status (the exclusivity invariant is structural, not a validation
    /// failure the caller needs to handle).
    pub fn new(status: PKIStatus, fail_info: PKIFailureInfo, status_string: Vec<String>) -> Self {
        let fail_info = match status {
            PKIStatus::Accepted | PKIStatus::GrantedWithMods => PKIFailureInfo::empty(),
            _ => fail_info,
        };
        Self { status, fail_info, status_string }
    }

    /// A plain acceptance with no failInfo or statusString.
    pub fn accepted() -> Self {
        Self::new(PKIStatus::Accepted, PKIFailureInfo::empty(), Vec::new())
    }

    /// A rejection carrying the given failInfo bits and free text.
    pub fn rejection(fail_info: PKIFailureInfo, status_string: Vec<String>) -> Self {
        Self::new(PKIStatus::Rejection, fail_info, status_string)
    }

    /// The status value.
    pub fn status(&self) -> PKIStatus {
        self.status
    }

    /// The failInfo bitset (always empty for success statuses).
    pub fn fail_info(&self) -> PKIFailureInfo {
        self.fail_info
    }

    /// The free-text statusString entries.
    pub fn status_string(&self) -> &[String] {
        &self.status_string
    }
}

/// Side-effect-free rendering of a `PKIStatusInfo` into a human string:
/// `"<status> [<failInfo bits>] <statusString...>"`. Never reads global state.
pub fn render(info: &PKIStatusInfo) -> String {
    let mut out = String::from(info.status().name());
    if !info.fail_info().is_empty() {
        let bits: Vec<&str> = info.fail_info().iter_set().map(FailureBit::name).collect();
        out.push_str(" [");
        out.push_str(&bits.join(", "));
        out.push(']');
    }
    for s in info.status_string() {
        out.push(' ');
        out.push_str(s);
    }
    out
}
