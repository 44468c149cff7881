//! Certificate and crypto seam (spec §1 — X.509/CSR cryptographic
//! primitives are an external collaborator; this module defines the seam
//! they expose and a test/mock-friendly implementation over `rcgen` and
//! `x509-parser`, in the style of `cim-keys`'s `crypto::x509` module).

use crate::error::{CmpError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An opaque, DER-encoded X.509 certificate. The engine never interprets the
/// bytes itself beyond what `issuer_and_serial`/`subject` expose; full
/// chain-building and signature verification are delegated to
/// `CertProtector` implementations.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    /// Wraps DER bytes as a certificate, without validating them.
    pub fn from_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// The DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.0
    }

    /// PEM encoding, for export/logging convenience.
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.0.clone()))
    }

    /// Parses `{issuer, serial}` out of the DER using `x509-parser`.
    pub fn issuer_and_serial(&self) -> Result<CertId> {
        let (_, parsed) = x509_parser::parse_x509_certificate(&self.0)
            .map_err(|e| CmpError::UnknownCertType(format!("failed to parse certificate: {e}")))?;
        Ok(CertId {
            issuer: parsed.issuer().to_string(),
            serial: parsed.raw_serial().to_vec(),
        })
    }

    /// Parses the subject distinguished name.
    pub fn subject(&self) -> Result<String> {
        let (_, parsed) = x509_parser::parse_x509_certificate(&self.0)
            .map_err(|e| CmpError::UnknownCertType(format!("failed to parse certificate: {e}")))?;
        Ok(parsed.subject().to_string())
    }

    /// SHA-256 fingerprint over the DER bytes, used by certConf hashing
    /// (spec §4.4, §4.5 `process_certConf`).
    pub fn sha256_fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Certificate({} bytes)", self.0.len())
    }
}

/// `{issuer, serial}` identifying a certificate for revocation/certConf
/// matching (spec §4.4 RR transaction, §4.5 `process_rr`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertId {
    /// Issuer distinguished name, RFC 4514 string form.
    pub issuer: String,
    /// Serial number, big-endian minimal encoding.
    pub serial: Vec<u8>,
}

/// A PKCS#10 Certification Request, opaque DER, used by P10CR (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Csr(Vec<u8>);

impl Csr {
    /// Wraps DER bytes as a CSR.
    pub fn from_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// The DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.0
    }
}

/// Selects the proof-of-possession variant for IR/CR/KUR (spec §6
/// `PopoMethod`). The engine only selects by this option; the cryptography
/// itself is delegated to `CertProtector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopoMethod {
    /// POP via a self-signature over the cert template (most common case).
    Signature,
    /// POP deferred; CA verifies out of band.
    RaVerified,
    /// POP via a challenge-response over an encrypted private key
    /// (indirect POP for key-update-style flows).
    KeyEncipherment,
}

/// The crypto seam spec §1 scopes out: message protection (MAC or
/// signature) and its verification, and proof-of-possession generation.
/// A production implementation backs this with real keys, HSMs, etc.; tests
/// use a deterministic HMAC-like stand-in (`MockProtector`).
pub trait CertProtector: Send + Sync {
    /// Computes the `protection` octets for `protected_bytes` (the DER
    /// encoding of `{header, body}`, per RFC 4210 §5.1.3).
    fn protect(&self, protected_bytes: &[u8]) -> Result<Vec<u8>>;

    /// Verifies `protection` over `protected_bytes`, checking it against
    /// the expected signer (trust anchors, pinned server cert, or a shared
    /// secret, depending on implementation).
    fn verify(&self, protected_bytes: &[u8], protection: &[u8]) -> Result<()>;
}

/// Deterministic stand-in for `CertProtector` used by tests and the
/// in-process mock responder: "protection" is a SHA-256 HMAC-like digest of
/// the bytes salted with a shared key, not intended for production use.
pub struct MockProtector {
    key: Vec<u8>,
}

impl MockProtector {
    /// Builds a mock protector sharing `key` between client and server.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }
}

impl CertProtector for MockProtector {
    fn protect(&self, protected_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = Sha256::new();
        hasher.update(&self.key);
        hasher.update(protected_bytes);
        Ok(hasher.finalize().to_vec())
    }

    fn verify(&self, protected_bytes: &[u8], protection: &[u8]) -> Result<()> {
        let expected = self.protect(protected_bytes)?;
        if expected == protection {
            Ok(())
        } else {
            Err(CmpError::ErrorValidatingProtection("mock MAC mismatch".to_string()))
        }
    }
}

/// Builds a real self-signed certificate DER for tests that need
/// `issuer_and_serial`/`subject` to actually parse (revocation targeting,
/// certConf hashing against realistic material).
#[cfg(test)]
pub(crate) fn test_certificate(subject_cn: &str) -> Certificate {
    use rcgen::{generate_simple_self_signed, CertifiedKey};
    let CertifiedKey { cert, .. } =
        generate_simple_self_signed(vec![subject_cn.to_string()]).expect("self-signed cert generation");
    Certificate::from_der(cert.der().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_protector_round_trips() {
        let p = MockProtector::new(b"shared-secret".to_vec());
        let bytes = b"some protected content";
        let mac = p.protect(bytes).unwrap();
        assert!(p.verify(bytes, &mac).is_ok());
        assert!(p.verify(b"tampered", &mac).is_err());
    }

    #[test]
    fn fingerprint_is_stable() {
        let cert = Certificate::from_der(vec![1, 2, 3, 4]);
        assert_eq!(cert.sha256_fingerprint(), cert.sha256_fingerprint());
    }
}
