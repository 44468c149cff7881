//! Common wire-level types shared across the CMP engine.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Protocol version number this engine speaks (spec §6). Always `2`.
pub const PVNO: i32 = 2;

/// Length in bytes of a `TransactionId` (spec §6).
pub const TRANSACTION_ID_LEN: usize = 16;

/// Length in bytes of a `Nonce` (spec §6).
pub const NONCE_LEN: usize = 16;

/// The canonical "first and only" certReqId used by every builder (spec §6,
/// §9 — this engine defines exactly one certReqId slot per session).
pub const CERT_REQ_ID: u32 = 0;

/// Opaque 16-byte transaction identifier binding every message of one
/// session (spec §3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId([u8; TRANSACTION_ID_LEN]);

impl TransactionId {
    /// Generates a fresh, random transaction id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TRANSACTION_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps raw bytes as a transaction id.
    pub fn from_bytes(bytes: [u8; TRANSACTION_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; TRANSACTION_ID_LEN] {
        &self.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", hex::encode(self.0))
    }
}

/// A 16-byte nonce, regenerated for every outbound message (`senderNonce`) or
/// echoed from the peer's last senderNonce (`recipNonce`) (spec §3, §4.3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Generates a fresh, random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps raw bytes as a nonce.
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// Identifies a single certificate request within a (single-slot) batch.
/// This engine always uses `CERT_REQ_ID` (spec §6, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertReqId(pub u32);

impl Default for CertReqId {
    fn default() -> Self {
        Self(CERT_REQ_ID)
    }
}

impl fmt::Display for CertReqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A short opaque byte string used when the client has no certificate yet
/// (MAC-protected path). Reserved in `Context`; zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct ReferenceValue(Vec<u8>);

impl ReferenceValue {
    /// Wraps raw bytes as a reference value.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ReferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceValue(***)")
    }
}

/// A MAC secret value paired with a `ReferenceValue`; zeroized via `secrecy`.
#[derive(Clone)]
pub struct SecretValue(secrecy::SecretVec<u8>);

impl SecretValue {
    /// Wraps raw bytes as a secret value.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(secrecy::SecretVec::from(bytes))
    }

    /// Exposes the raw secret bytes.
    pub fn expose_secret(&self) -> &[u8] {
        use secrecy::ExposeSecret;
        self.0.expose_secret()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue(***)")
    }
}

/// An ASN.1 OBJECT IDENTIFIER, stored in dotted-decimal form (spec §3 ITAV).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Oid(pub String);

impl Oid {
    /// The `id-it-implicitConfirm` OID (1.3.6.1.5.5.7.4.13), used by
    /// `generalInfo` to signal implicit confirmation (spec §3, §4.1).
    pub fn implicit_confirm() -> Self {
        Self("1.3.6.1.5.5.7.4.13".to_string())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{type: OID, value: ANY}` (spec §3). The value is carried as opaque DER
/// content octets — the engine only ever needs to compare/echo them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itav {
    /// The info-type OID.
    pub infotype: Oid,
    /// The associated value, DER-encoded, or absent for a NULL value.
    pub infovalue: Option<Vec<u8>>,
}

impl Itav {
    /// The implicit-confirm ITAV: `id-it-implicitConfirm` with a NULL value.
    pub fn implicit_confirm() -> Self {
        Self { infotype: Oid::implicit_confirm(), infovalue: None }
    }
}

/// A `GeneralName` as used in `PKIHeader.sender`/`.recipient` (spec §4.2
/// restricts verification to `DirectoryName`; other forms are recognized
/// but rejected by `validate_received`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneralName {
    /// `directoryName`, an X.501 distinguished name in RFC 4514 string form.
    DirectoryName(String),
    /// `rfc822Name`, an email address — recognized but not supported by
    /// header verification.
    Rfc822Name(String),
    /// `dNSName` — recognized but not supported by header verification.
    DnsName(String),
    /// `uniformResourceIdentifier` — recognized but not supported.
    Uri(String),
    /// The null DN (`directoryName` with an empty RDNSequence), used as a
    /// placeholder sender/recipient when no identity is configured.
    NullDn,
}

impl GeneralName {
    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            GeneralName::DirectoryName(_) => "directoryName",
            GeneralName::Rfc822Name(_) => "rfc822Name",
            GeneralName::DnsName(_) => "dNSName",
            GeneralName::Uri(_) => "uniformResourceIdentifier",
            GeneralName::NullDn => "directoryName",
        }
    }

    /// True if this is a `DirectoryName` (including the null DN).
    pub fn is_directory_name(&self) -> bool {
        matches!(self, GeneralName::DirectoryName(_) | GeneralName::NullDn)
    }
}

impl fmt::Display for GeneralName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneralName::DirectoryName(dn) => write!(f, "{dn}"),
            GeneralName::Rfc822Name(s) | GeneralName::DnsName(s) | GeneralName::Uri(s) => {
                write!(f, "{s}")
            }
            GeneralName::NullDn => write!(f, ""),
        }
    }
}

/// Revocation reason carried by an RR's CRLReason extension (a small,
/// commonly-used subset of RFC 5280 §5.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevocationReason {
    /// Reason unspecified.
    Unspecified,
    /// Signing key believed compromised.
    KeyCompromise,
    /// CA key believed compromised.
    CaCompromise,
    /// Subject's affiliation changed.
    AffiliationChanged,
    /// Certificate superseded by a new one.
    Superseded,
    /// CA is ceasing operation.
    CessationOfOperation,
    /// Certificate is on hold pending investigation.
    CertificateHold,
}

impl RevocationReason {
    /// The CRLReason integer code (RFC 5280 §5.3.1).
    pub fn code(self) -> i32 {
        match self {
            RevocationReason::Unspecified => 0,
            RevocationReason::KeyCompromise => 1,
            RevocationReason::CaCompromise => 2,
            RevocationReason::AffiliationChanged => 3,
            RevocationReason::Superseded => 4,
            RevocationReason::CessationOfOperation => 5,
            RevocationReason::CertificateHold => 6,
        }
    }
}
