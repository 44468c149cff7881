//! Message body types and the `Message` envelope (spec §3 Message body,
//! Message; §6 wire format).

use crate::asn1::{self, Reader};
use crate::certs::{CertId, Certificate, Csr, PopoMethod};
use crate::error::{CmpError, Result};
use crate::header::{decode_header, encode_header, PKIHeader};
use crate::status::{FailureBit, PKIFailureInfo, PKIStatus, PKIStatusInfo};
use crate::types::{CertReqId, Itav, RevocationReason};
use serde::{Deserialize, Serialize};

/// A single entry of a `CertReqMessages` (IR/CR/KUR). Per spec §9 this
/// engine defines exactly one certReqId slot (`CertReqId::default()`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertReqMsg {
    /// Always `CertReqId::default()` in this engine.
    pub cert_req_id: CertReqId,
    /// Requested subject distinguished name.
    pub subject: String,
    /// Requested Subject Alternative Names.
    pub sans: Vec<String>,
    /// Requested public key, opaque to the engine (produced by the crypto
    /// seam).
    pub public_key: Vec<u8>,
    /// Selected proof-of-possession variant.
    pub popo_method: PopoMethod,
    /// Proof-of-possession value, opaque bytes from the crypto seam
    /// (absent for `PopoMethod::RaVerified`).
    pub popo_value: Option<Vec<u8>>,
}

/// A single `CertResponse` within a `CertRepMessage` (IP/CP/KUP).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertResponse {
    /// Echoes the request's certReqId.
    pub cert_req_id: CertReqId,
    /// Outcome of this individual request.
    pub status: PKIStatusInfo,
    /// The issued certificate, absent while `status.status() == Waiting`
    /// or on rejection.
    pub certified: Option<CertifiedKeyPair>,
}

/// The issued certificate plus, for indirect POP, the client's private key
/// encrypted for the client (spec §4.4 "extract ... direct or
/// encrypted-for-indirect-POP").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedKeyPair {
    /// The issued certificate.
    pub cert: Certificate,
    /// Private key material encrypted for the requester, present only for
    /// indirect POP flows.
    pub encrypted_key: Option<Vec<u8>>,
}

/// `CertRepMessage` (IP/CP/KUP payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRepMessage {
    /// CA certificates returned alongside the response, order preserved
    /// (spec §8 scenario 1).
    pub ca_pubs: Vec<Certificate>,
    /// One response per outstanding certReqId (always length 1 here).
    pub responses: Vec<CertResponse>,
}

/// A single `RevDetails` within `RevReqContent` (RR payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevDetails {
    /// Identifies the certificate to revoke.
    pub cert_id: CertId,
    /// Reason for the revocation.
    pub reason: RevocationReason,
}

/// A single entry of `RevRepContent` (RP payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevRepEntry {
    /// Outcome of this revocation request.
    pub status: PKIStatusInfo,
    /// Echoes the targeted certificate id.
    pub cert_id: CertId,
}

/// A single `CertStatus` within `CertConfContent` (certConf payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertStatus {
    /// Digest of the issued certificate's DER encoding (spec §4.5
    /// `process_certConf`).
    pub cert_hash: Vec<u8>,
    /// Echoes the certReqId this confirmation targets.
    pub cert_req_id: CertReqId,
}

/// A single `PollRepContent` entry (pollRep payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRepEntry {
    /// Echoes the polled certReqId.
    pub cert_req_id: CertReqId,
    /// Seconds the client should wait before polling again.
    pub check_after_secs: u64,
}

/// `ErrorMsgContent` (ERROR payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContent {
    /// The reported status.
    pub status: PKIStatusInfo,
    /// Optional numeric error code.
    pub error_code: Option<i32>,
    /// Additional free-text diagnostics.
    pub error_details: Vec<String>,
}

/// Tagged union over the nine in-scope CMP body types plus the confirmation
/// and polling bodies they depend on (spec §3 Message body; spec §1 caps
/// coverage at these — CCR/CCP/CKUANN/CANN/CRLANN/NESTED etc. are explicitly
/// out of scope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkiBody {
    /// Initialization Request.
    Ir(Vec<CertReqMsg>),
    /// Initialization Response.
    Ip(CertRepMessage),
    /// Certification Request.
    Cr(Vec<CertReqMsg>),
    /// Certification Response.
    Cp(CertRepMessage),
    /// PKCS#10-wrapped Request.
    P10cr(Csr),
    /// Key-Update Request.
    Kur(Vec<CertReqMsg>),
    /// Key-Update Response.
    Kup(CertRepMessage),
    /// Revocation Request.
    Rr(Vec<RevDetails>),
    /// Revocation Response.
    Rp(Vec<RevRepEntry>),
    /// Certificate confirmation.
    CertConf(Vec<CertStatus>),
    /// Acknowledges a certificate confirmation.
    PkiConf,
    /// General Message.
    Genm(Vec<Itav>),
    /// General Response.
    Genp(Vec<Itav>),
    /// Polling request.
    PollReq(CertReqId),
    /// Polling response.
    PollRep(Vec<PollRepEntry>),
    /// Error report, sendable by either side at any time.
    Error(ErrorContent),
}

impl PkiBody {
    /// Stable name used in error messages (`UnexpectedPKIBody`) and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            PkiBody::Ir(_) => "ir",
            PkiBody::Ip(_) => "ip",
            PkiBody::Cr(_) => "cr",
            PkiBody::Cp(_) => "cp",
            PkiBody::P10cr(_) => "p10cr",
            PkiBody::Kur(_) => "kur",
            PkiBody::Kup(_) => "kup",
            PkiBody::Rr(_) => "rr",
            PkiBody::Rp(_) => "rp",
            PkiBody::CertConf(_) => "certConf",
            PkiBody::PkiConf => "pkiConf",
            PkiBody::Genm(_) => "genm",
            PkiBody::Genp(_) => "genp",
            PkiBody::PollReq(_) => "pollReq",
            PkiBody::PollRep(_) => "pollRep",
            PkiBody::Error(_) => "error",
        }
    }

    /// True for IP/CP/KUP — the three "cert response" body types (spec
    /// §4.4).
    pub fn is_cert_response(&self) -> bool {
        matches!(self, PkiBody::Ip(_) | PkiBody::Cp(_) | PkiBody::Kup(_))
    }
}

/// `{header, body, protection?, extraCerts}` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The PKIHeader.
    pub header: PKIHeader,
    /// The tagged-union body.
    pub body: PkiBody,
    /// MAC or signature over `{header, body}`, absent for unprotected
    /// messages.
    pub protection: Option<Vec<u8>>,
    /// Additional certificates accompanying the message (chain material,
    /// trust-anchor pinning per `permit_ta_in_extra_certs`).
    pub extra_certs: Vec<Certificate>,
}

impl Message {
    /// The bytes over which `protection` is computed/verified: the encoded
    /// `{header, body}` pair, independent of `protection`/`extra_certs`
    /// (RFC 4210 §5.1.3 `protectedPart`).
    pub fn protected_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        asn1::write_field(&mut buf, &encode_header(&self.header));
        asn1::write_field(&mut buf, &encode_body(&self.body));
        buf
    }

    /// Encodes the full message. See module docs on `asn1` for the codec's
    /// scope and guarantees.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        asn1::write_field(&mut buf, &encode_header(&self.header));
        asn1::write_field(&mut buf, &encode_body(&self.body));
        asn1::write_option(&mut buf, self.protection.as_deref());
        let certs: Vec<Vec<u8>> = self.extra_certs.iter().map(|c| c.der().to_vec()).collect();
        asn1::write_vec(&mut buf, &certs);
        Ok(buf)
    }

    /// Decodes a message previously produced by `encode`. The server engine
    /// round-trips every inbound and outbound message through this pair as
    /// a deliberate sanity check (spec §4.5, §9 "DER round-trip as
    /// validation").
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let header = decode_header(r.read_field()?)?;
        let body = decode_body(r.read_field()?)?;
        let protection = asn1::read_option(&mut r)?.map(|b| b.to_vec());
        let extra_certs = asn1::read_vec(&mut r, |b| Ok(Certificate::from_der(b.to_vec())))?;
        Ok(Self { header, body, protection, extra_certs })
    }
}

fn encode_status(buf: &mut Vec<u8>, s: &PKIStatusInfo) {
    asn1::write_u32(buf, s.status().to_code() as u32);
    asn1::write_u32(buf, s.fail_info().raw());
    let strings: Vec<Vec<u8>> = s.status_string().iter().map(|s| s.as_bytes().to_vec()).collect();
    asn1::write_vec(buf, &strings);
}

fn decode_status(r: &mut Reader<'_>) -> Result<PKIStatusInfo> {
    let code = asn1::read_u32(r)? as i32;
    let status = PKIStatus::from_code(code)
        .ok_or_else(|| CmpError::ErrorParsingPKIStatus(format!("unknown status code {code}")))?;
    let fail_info = PKIFailureInfo::from_raw(asn1::read_u32(r)?);
    let status_string = asn1::read_vec(r, |b| {
        std::str::from_utf8(b)
            .map(str::to_string)
            .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))
    })?;
    Ok(PKIStatusInfo::new(status, fail_info, status_string))
}

fn encode_cert_req_msgs(reqs: &[CertReqMsg]) -> Vec<u8> {
    let mut buf = Vec::new();
    let items: Vec<Vec<u8>> = reqs
        .iter()
        .map(|req| {
            let mut item = Vec::new();
            asn1::write_u32(&mut item, req.cert_req_id.0);
            asn1::write_field(&mut item, req.subject.as_bytes());
            let sans: Vec<Vec<u8>> = req.sans.iter().map(|s| s.as_bytes().to_vec()).collect();
            asn1::write_vec(&mut item, &sans);
            asn1::write_field(&mut item, &req.public_key);
            asn1::write_u32(&mut item, popo_method_code(req.popo_method));
            asn1::write_option(&mut item, req.popo_value.as_deref());
            item
        })
        .collect();
    asn1::write_vec(&mut buf, &items);
    buf
}

fn decode_cert_req_msgs(bytes: &[u8]) -> Result<Vec<CertReqMsg>> {
    let mut r = Reader::new(bytes);
    asn1::read_vec(&mut r, |item_bytes| {
        let mut ir = Reader::new(item_bytes);
        let cert_req_id = CertReqId(asn1::read_u32(&mut ir)?);
        let subject = std::str::from_utf8(ir.read_field()?)
            .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?
            .to_string();
        let sans = asn1::read_vec(&mut ir, |b| {
            std::str::from_utf8(b)
                .map(str::to_string)
                .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))
        })?;
        let public_key = ir.read_field()?.to_vec();
        let popo_method = popo_method_from_code(asn1::read_u32(&mut ir)?)?;
        let popo_value = asn1::read_option(&mut ir)?.map(|b| b.to_vec());
        Ok(CertReqMsg { cert_req_id, subject, sans, public_key, popo_method, popo_value })
    })
}

fn popo_method_code(m: PopoMethod) -> u32 {
    match m {
        PopoMethod::Signature => 0,
        PopoMethod::RaVerified => 1,
        PopoMethod::KeyEncipherment => 2,
    }
}

fn popo_method_from_code(code: u32) -> Result<PopoMethod> {
    Ok(match code {
        0 => PopoMethod::Signature,
        1 => PopoMethod::RaVerified,
        2 => PopoMethod::KeyEncipherment,
        other => return Err(CmpError::ErrorDecodingMessage(format!("unknown popo method {other}"))),
    })
}

fn encode_cert_rep(rep: &CertRepMessage) -> Vec<u8> {
    let mut buf = Vec::new();
    let ca_pubs: Vec<Vec<u8>> = rep.ca_pubs.iter().map(|c| c.der().to_vec()).collect();
    asn1::write_vec(&mut buf, &ca_pubs);
    let responses: Vec<Vec<u8>> = rep
        .responses
        .iter()
        .map(|resp| {
            let mut item = Vec::new();
            asn1::write_u32(&mut item, resp.cert_req_id.0);
            encode_status(&mut item, &resp.status);
            let presence = [1u8];
            asn1::write_option(&mut item, resp.certified.as_ref().map(|_| presence.as_slice()));
            if let Some(certified) = &resp.certified {
                asn1::write_field(&mut item, certified.cert.der());
                asn1::write_option(&mut item, certified.encrypted_key.as_deref());
            }
            item
        })
        .collect();
    asn1::write_vec(&mut buf, &responses);
    buf
}

fn decode_cert_rep(bytes: &[u8]) -> Result<CertRepMessage> {
    let mut r = Reader::new(bytes);
    let ca_pubs = asn1::read_vec(&mut r, |b| Ok(Certificate::from_der(b.to_vec())))?;
    let responses = asn1::read_vec(&mut r, |item_bytes| {
        let mut ir = Reader::new(item_bytes);
        let cert_req_id = CertReqId(asn1::read_u32(&mut ir)?);
        let status = decode_status(&mut ir)?;
        let has_certified = asn1::read_option(&mut ir)?.is_some();
        let certified = if has_certified {
            let cert = Certificate::from_der(ir.read_field()?.to_vec());
            let encrypted_key = asn1::read_option(&mut ir)?.map(|b| b.to_vec());
            Some(CertifiedKeyPair { cert, encrypted_key })
        } else {
            None
        };
        Ok(CertResponse { cert_req_id, status, certified })
    })?;
    Ok(CertRepMessage { ca_pubs, responses })
}

fn encode_rev_details(details: &[RevDetails]) -> Vec<u8> {
    let mut buf = Vec::new();
    let items: Vec<Vec<u8>> = details
        .iter()
        .map(|d| {
            let mut item = Vec::new();
            asn1::write_field(&mut item, d.cert_id.issuer.as_bytes());
            asn1::write_field(&mut item, &d.cert_id.serial);
            asn1::write_u32(&mut item, d.reason.code() as u32);
            item
        })
        .collect();
    asn1::write_vec(&mut buf, &items);
    buf
}

fn decode_rev_details(bytes: &[u8]) -> Result<Vec<RevDetails>> {
    let mut r = Reader::new(bytes);
    asn1::read_vec(&mut r, |item_bytes| {
        let mut ir = Reader::new(item_bytes);
        let issuer = std::str::from_utf8(ir.read_field()?)
            .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?
            .to_string();
        let serial = ir.read_field()?.to_vec();
        let reason = revocation_reason_from_code(asn1::read_u32(&mut ir)?)?;
        Ok(RevDetails { cert_id: CertId { issuer, serial }, reason })
    })
}

fn revocation_reason_from_code(code: u32) -> Result<RevocationReason> {
    Ok(match code {
        0 => RevocationReason::Unspecified,
        1 => RevocationReason::KeyCompromise,
        2 => RevocationReason::CaCompromise,
        3 => RevocationReason::AffiliationChanged,
        4 => RevocationReason::Superseded,
        5 => RevocationReason::CessationOfOperation,
        6 => RevocationReason::CertificateHold,
        other => {
            return Err(CmpError::ErrorDecodingMessage(format!(
                "unknown revocation reason {other}"
            )))
        }
    })
}

fn encode_rev_rep(entries: &[RevRepEntry]) -> Vec<u8> {
    let mut buf = Vec::new();
    let items: Vec<Vec<u8>> = entries
        .iter()
        .map(|e| {
            let mut item = Vec::new();
            encode_status(&mut item, &e.status);
            asn1::write_field(&mut item, e.cert_id.issuer.as_bytes());
            asn1::write_field(&mut item, &e.cert_id.serial);
            item
        })
        .collect();
    asn1::write_vec(&mut buf, &items);
    buf
}

fn decode_rev_rep(bytes: &[u8]) -> Result<Vec<RevRepEntry>> {
    let mut r = Reader::new(bytes);
    asn1::read_vec(&mut r, |item_bytes| {
        let mut ir = Reader::new(item_bytes);
        let status = decode_status(&mut ir)?;
        let issuer = std::str::from_utf8(ir.read_field()?)
            .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?
            .to_string();
        let serial = ir.read_field()?.to_vec();
        Ok(RevRepEntry { status, cert_id: CertId { issuer, serial } })
    })
}

fn encode_itavs(itavs: &[Itav]) -> Vec<u8> {
    let mut buf = Vec::new();
    let items: Vec<Vec<u8>> = itavs
        .iter()
        .map(|i| {
            let mut item = Vec::new();
            asn1::write_field(&mut item, i.infotype.0.as_bytes());
            asn1::write_option(&mut item, i.infovalue.as_deref());
            item
        })
        .collect();
    asn1::write_vec(&mut buf, &items);
    buf
}

fn decode_itavs(bytes: &[u8]) -> Result<Vec<Itav>> {
    let mut r = Reader::new(bytes);
    asn1::read_vec(&mut r, |item_bytes| {
        let mut ir = Reader::new(item_bytes);
        let oid = std::str::from_utf8(ir.read_field()?)
            .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?
            .to_string();
        let infovalue = asn1::read_option(&mut ir)?.map(|b| b.to_vec());
        Ok(Itav { infotype: crate::types::Oid(oid), infovalue })
    })
}

fn encode_cert_conf(statuses: &[CertStatus]) -> Vec<u8> {
    let mut buf = Vec::new();
    let items: Vec<Vec<u8>> = statuses
        .iter()
        .map(|s| {
            let mut item = Vec::new();
            asn1::write_field(&mut item, &s.cert_hash);
            asn1::write_u32(&mut item, s.cert_req_id.0);
            item
        })
        .collect();
    asn1::write_vec(&mut buf, &items);
    buf
}

fn decode_cert_conf(bytes: &[u8]) -> Result<Vec<CertStatus>> {
    let mut r = Reader::new(bytes);
    asn1::read_vec(&mut r, |item_bytes| {
        let mut ir = Reader::new(item_bytes);
        let cert_hash = ir.read_field()?.to_vec();
        let cert_req_id = CertReqId(asn1::read_u32(&mut ir)?);
        Ok(CertStatus { cert_hash, cert_req_id })
    })
}

fn encode_poll_rep(entries: &[PollRepEntry]) -> Vec<u8> {
    let mut buf = Vec::new();
    let items: Vec<Vec<u8>> = entries
        .iter()
        .map(|e| {
            let mut item = Vec::new();
            asn1::write_u32(&mut item, e.cert_req_id.0);
            asn1::write_u32(&mut item, e.check_after_secs as u32);
            item
        })
        .collect();
    asn1::write_vec(&mut buf, &items);
    buf
}

fn decode_poll_rep(bytes: &[u8]) -> Result<Vec<PollRepEntry>> {
    let mut r = Reader::new(bytes);
    asn1::read_vec(&mut r, |item_bytes| {
        let mut ir = Reader::new(item_bytes);
        let cert_req_id = CertReqId(asn1::read_u32(&mut ir)?);
        let check_after_secs = asn1::read_u32(&mut ir)? as u64;
        Ok(PollRepEntry { cert_req_id, check_after_secs })
    })
}

fn encode_error(e: &ErrorContent) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_status(&mut buf, &e.status);
    asn1::write_option(&mut buf, e.error_code.map(|c| c.to_be_bytes()).as_ref().map(|b| b.as_slice()));
    let details: Vec<Vec<u8>> = e.error_details.iter().map(|s| s.as_bytes().to_vec()).collect();
    asn1::write_vec(&mut buf, &details);
    buf
}

fn decode_error(bytes: &[u8]) -> Result<ErrorContent> {
    let mut r = Reader::new(bytes);
    let status = decode_status(&mut r)?;
    let error_code = asn1::read_option(&mut r)?
        .map(|b| {
            let arr: [u8; 4] = b
                .try_into()
                .map_err(|_| CmpError::ErrorDecodingMessage("bad error code length".into()))?;
            Ok::<_, CmpError>(i32::from_be_bytes(arr))
        })
        .transpose()?;
    let error_details = asn1::read_vec(&mut r, |b| {
        std::str::from_utf8(b)
            .map(str::to_string)
            .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))
    })?;
    Ok(ErrorContent { status, error_code, error_details })
}

fn body_tag(body: &PkiBody) -> u32 {
    match body {
        PkiBody::Ir(_) => 0,
        PkiBody::Ip(_) => 1,
        PkiBody::Cr(_) => 2,
        PkiBody::Cp(_) => 3,
        PkiBody::P10cr(_) => 4,
        PkiBody::Kur(_) => 5,
        PkiBody::Kup(_) => 6,
        PkiBody::Rr(_) => 7,
        PkiBody::Rp(_) => 8,
        PkiBody::CertConf(_) => 9,
        PkiBody::PkiConf => 10,
        PkiBody::Genm(_) => 11,
        PkiBody::Genp(_) => 12,
        PkiBody::PollReq(_) => 13,
        PkiBody::PollRep(_) => 14,
        PkiBody::Error(_) => 15,
    }
}

fn encode_body(body: &PkiBody) -> Vec<u8> {
    let mut buf = Vec::new();
    asn1::write_u32(&mut buf, body_tag(body));
    let payload = match body {
        PkiBody::Ir(reqs) | PkiBody::Cr(reqs) | PkiBody::Kur(reqs) => encode_cert_req_msgs(reqs),
        PkiBody::Ip(rep) | PkiBody::Cp(rep) | PkiBody::Kup(rep) => encode_cert_rep(rep),
        PkiBody::P10cr(csr) => csr.der().to_vec(),
        PkiBody::Rr(details) => encode_rev_details(details),
        PkiBody::Rp(entries) => encode_rev_rep(entries),
        PkiBody::CertConf(statuses) => encode_cert_conf(statuses),
        PkiBody::PkiConf => Vec::new(),
        PkiBody::Genm(itavs) | PkiBody::Genp(itavs) => encode_itavs(itavs),
        PkiBody::PollReq(id) => id.0.to_be_bytes().to_vec(),
        PkiBody::PollRep(entries) => encode_poll_rep(entries),
        PkiBody::Error(e) => encode_error(e),
    };
    asn1::write_field(&mut buf, &payload);
    buf
}

fn decode_body(bytes: &[u8]) -> Result<PkiBody> {
    let mut r = Reader::new(bytes);
    let tag = asn1::read_u32(&mut r)?;
    let payload = r.read_field()?;
    Ok(match tag {
        0 => PkiBody::Ir(decode_cert_req_msgs(payload)?),
        1 => PkiBody::Ip(decode_cert_rep(payload)?),
        2 => PkiBody::Cr(decode_cert_req_msgs(payload)?),
        3 => PkiBody::Cp(decode_cert_rep(payload)?),
        4 => PkiBody::P10cr(Csr::from_der(payload.to_vec())),
        5 => PkiBody::Kur(decode_cert_req_msgs(payload)?),
        6 => PkiBody::Kup(decode_cert_rep(payload)?),
        7 => PkiBody::Rr(decode_rev_details(payload)?),
        8 => PkiBody::Rp(decode_rev_rep(payload)?),
        9 => PkiBody::CertConf(decode_cert_conf(payload)?),
        10 => PkiBody::PkiConf,
        11 => PkiBody::Genm(decode_itavs(payload)?),
        12 => PkiBody::Genp(decode_itavs(payload)?),
        13 => {
            let arr: [u8; 4] = payload
                .try_into()
                .map_err(|_| CmpError::ErrorDecodingMessage("bad pollReq certReqId".into()))?;
            PkiBody::PollReq(CertReqId(u32::from_be_bytes(arr)))
        }
        14 => PkiBody::PollRep(decode_poll_rep(payload)?),
        15 => PkiBody::Error(decode_error(payload)?),
        other => return Err(CmpError::ErrorDecodingMessage(format!("unknown body tag {other}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PKIHeader;
    use crate::types::{GeneralName, Nonce, TransactionId, PVNO};

    fn sample_header() -> PKIHeader {
        PKIHeader {
            pvno: PVNO,
            sender: GeneralName::DirectoryName("CN=client".into()),
            recipient: GeneralName::DirectoryName("CN=server".into()),
            message_time: None,
            protection_alg: None,
            sender_kid: None,
            recip_kid: None,
            transaction_id: TransactionId::generate(),
            sender_nonce: Nonce::generate(),
            recip_nonce: None,
            general_info: Vec::new(),
        }
    }

    fn sample_message(body: PkiBody) -> Message {
        Message {
            header: sample_header(),
            body,
            protection: Some(vec![9, 9, 9]),
            extra_certs: vec![Certificate::from_der(vec![1, 2, 3])],
        }
    }

    #[test]
    fn ir_round_trips() {
        let msg = sample_message(PkiBody::Ir(vec![CertReqMsg {
            cert_req_id: CertReqId::default(),
            subject: "CN=alice".into(),
            sans: vec!["alice@example.com".into()],
            public_key: vec![1, 2, 3, 4],
            popo_method: PopoMethod::Signature,
            popo_value: Some(vec![5, 6]),
        }]));
        let encoded = msg.encode().unwrap();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn ip_round_trips_with_waiting_status() {
        let status = PKIStatusInfo::new(PKIStatus::Waiting, PKIFailureInfo::empty(), vec![]);
        let msg = sample_message(PkiBody::Ip(CertRepMessage {
            ca_pubs: vec![Certificate::from_der(vec![7, 7])],
            responses: vec![CertResponse {
                cert_req_id: CertReqId::default(),
                status,
                certified: None,
            }],
        }));
        let encoded = msg.encode().unwrap();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn rr_and_rp_round_trip() {
        let rr = sample_message(PkiBody::Rr(vec![RevDetails {
            cert_id: CertId { issuer: "CN=ca".into(), serial: vec![1] },
            reason: RevocationReason::KeyCompromise,
        }]));
        let encoded = rr.encode().unwrap();
        assert_eq!(rr, Message::decode(&encoded).unwrap());

        let rp = sample_message(PkiBody::Rp(vec![RevRepEntry {
            status: PKIStatusInfo::accepted(),
            cert_id: CertId { issuer: "CN=ca".into(), serial: vec![1] },
        }]));
        let encoded = rp.encode().unwrap();
        assert_eq!(rp, Message::decode(&encoded).unwrap());
    }

    #[test]
    fn error_round_trips() {
        let msg = sample_message(PkiBody::Error(ErrorContent {
            status: PKIStatusInfo::rejection(
                PKIFailureInfo::empty().with(FailureBit::SignerNotTrusted),
                vec!["nope".into()],
            ),
            error_code: Some(-1),
            error_details: vec!["detail".into()],
        }));
        let encoded = msg.encode().unwrap();
        assert_eq!(msg, Message::decode(&encoded).unwrap());
    }

    #[test]
    fn pkiconf_round_trips() {
        let msg = sample_message(PkiBody::PkiConf);
        let encoded = msg.encode().unwrap();
        assert_eq!(msg, Message::decode(&encoded).unwrap());
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let msg = sample_message(PkiBody::PkiConf);
        let mut encoded = msg.encode().unwrap();
        encoded.truncate(encoded.len() - 2);
        assert!(Message::decode(&encoded).is_err());
    }
}
