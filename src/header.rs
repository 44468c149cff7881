//! PKIHeader construction, binding and (de)serialization (spec §3, §4.1).

use crate::asn1::{self, Reader};
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::types::{GeneralName, Itav, Nonce, Oid, TransactionId, PVNO};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `PKIHeader` (spec §3). Invariants: `pvno == 2`; `transaction_id` and
/// `sender_nonce` are always present (enforced by construction — there is
/// no `PKIHeader` constructor that omits them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PKIHeader {
    /// Protocol version, always `PVNO` (2).
    pub pvno: i32,
    /// The message's originator.
    pub sender: GeneralName,
    /// The message's intended recipient.
    pub recipient: GeneralName,
    /// Time the message was created, if the sender chose to include it.
    pub message_time: Option<DateTime<Utc>>,
    /// Protection algorithm identifier, absent for unprotected messages.
    pub protection_alg: Option<String>,
    /// Key identifier of the sender's protection key.
    pub sender_kid: Option<Vec<u8>>,
    /// Key identifier of the recipient's protection key.
    pub recip_kid: Option<Vec<u8>>,
    /// Binds every message of one session together.
    pub transaction_id: TransactionId,
    /// Fresh per outbound message.
    pub sender_nonce: Nonce,
    /// Echoes the peer's last `sender_nonce`, absent on the very first
    /// message of a session.
    pub recip_nonce: Option<Nonce>,
    /// `generalInfo`, carrying e.g. the implicit-confirm ITAV.
    pub general_info: Vec<Itav>,
}

impl PKIHeader {
    /// True iff `general_info` contains the implicit-confirm ITAV
    /// (spec §4.1 `check_implicitConfirm`).
    pub fn check_implicit_confirm(&self) -> bool {
        let oid = Oid::implicit_confirm();
        self.general_info.iter().any(|i| i.infotype == oid)
    }

    /// Pushes the implicit-confirm ITAV if not already present; idempotent
    /// (spec §4.1 `set_implicitConfirm`, §5 idempotence).
    pub fn set_implicit_confirm(&mut self) {
        if !self.check_implicit_confirm() {
            self.general_info.push(Itav::implicit_confirm());
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        asn1::write_u32(&mut buf, self.pvno as u32);
        encode_general_name(&mut buf, &self.sender);
        encode_general_name(&mut buf, &self.recipient);
        asn1::write_option(
            &mut buf,
            self.message_time.map(|t| t.to_rfc3339()).as_deref().map(str::as_bytes),
        );
        asn1::write_option(&mut buf, self.protection_alg.as_deref().map(str::as_bytes));
        asn1::write_option(&mut buf, self.sender_kid.as_deref());
        asn1::write_option(&mut buf, self.recip_kid.as_deref());
        asn1::write_field(&mut buf, self.transaction_id.as_bytes());
        asn1::write_field(&mut buf, self.sender_nonce.as_bytes());
        asn1::write_option(&mut buf, self.recip_nonce.as_ref().map(|n| n.as_bytes().as_slice()));
        let itavs: Vec<Vec<u8>> = self.general_info.iter().map(encode_itav).collect();
        asn1::write_vec(&mut buf, &itavs);
        buf
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let pvno = asn1::read_u32(&mut r)? as i32;
        let sender = decode_general_name(r.read_field()?)?;
        let recipient = decode_general_name(r.read_field()?)?;
        let message_time = asn1::read_option(&mut r)?
            .map(|b| {
                let s = std::str::from_utf8(b)
                    .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?;
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))
            })
            .transpose()?;
        let protection_alg = asn1::read_option(&mut r)?
            .map(|b| {
                std::str::from_utf8(b)
                    .map(str::to_string)
                    .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))
            })
            .transpose()?;
        let sender_kid = asn1::read_option(&mut r)?.map(|b| b.to_vec());
        let recip_kid = asn1::read_option(&mut r)?.map(|b| b.to_vec());
        let transaction_id = TransactionId::from_bytes(
            r.read_field()?
                .try_into()
                .map_err(|_| CmpError::ErrorDecodingMessage("bad transactionID length".into()))?,
        );
        let sender_nonce = Nonce::from_bytes(
            r.read_field()?
                .try_into()
                .map_err(|_| CmpError::ErrorDecodingMessage("bad senderNonce length".into()))?,
        );
        let recip_nonce = asn1::read_option(&mut r)?
            .map(|b| {
                let arr: [u8; 16] = b
                    .try_into()
                    .map_err(|_| CmpError::ErrorDecodingMessage("bad recipNonce length".into()))?;
                Ok::<_, CmpError>(Nonce::from_bytes(arr))
            })
            .transpose()?;
        let general_info = asn1::read_vec(&mut r, |b| decode_itav(b))?;
        Ok(Self {
            pvno,
            sender,
            recipient,
            message_time,
            protection_alg,
            sender_kid,
            recip_kid,
            transaction_id,
            sender_nonce,
            recip_nonce,
            general_info,
        })
    }
}

pub(crate) fn encode_header(h: &PKIHeader) -> Vec<u8> {
    h.encode()
}

pub(crate) fn decode_header(bytes: &[u8]) -> Result<PKIHeader> {
    PKIHeader::decode(bytes)
}

fn encode_general_name(buf: &mut Vec<u8>, name: &GeneralName) -> () {
    let (kind, value): (u8, &str) = match name {
        GeneralName::DirectoryName(dn) => (0, dn.as_str()),
        GeneralName::Rfc822Name(s) => (1, s.as_str()),
        GeneralName::DnsName(s) => (2, s.as_str()),
        GeneralName::Uri(s) => (3, s.as_str()),
        GeneralName::NullDn => (4, ""),
    };
    let mut inner = Vec::new();
    asn1::write_u32(&mut inner, kind as u32);
    asn1::write_field(&mut inner, value.as_bytes());
    asn1::write_field(buf, &inner);
}

fn decode_general_name(bytes: &[u8]) -> Result<GeneralName> {
    let mut r = Reader::new(bytes);
    let kind = asn1::read_u32(&mut r)?;
    let value = std::str::from_utf8(r.read_field()?)
        .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?
        .to_string();
    Ok(match kind {
        0 => GeneralName::DirectoryName(value),
        1 => GeneralName::Rfc822Name(value),
        2 => GeneralName::DnsName(value),
        3 => GeneralName::Uri(value),
        4 => GeneralName::NullDn,
        other => {
            return Err(CmpError::ErrorDecodingMessage(format!(
                "unknown GeneralName kind {other}"
            )))
        }
    })
}

fn encode_itav(itav: &Itav) -> Vec<u8> {
    let mut buf = Vec::new();
    asn1::write_field(&mut buf, itav.infotype.0.as_bytes());
    asn1::write_option(&mut buf, itav.infovalue.as_deref());
    buf
}

fn decode_itav(bytes: &[u8]) -> Result<Itav> {
    let mut r = Reader::new(bytes);
    let oid = std::str::from_utf8(r.read_field()?)
        .map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?
        .to_string();
    let infovalue = asn1::read_option(&mut r)?.map(|b| b.to_vec());
    Ok(Itav { infotype: Oid(oid), infovalue })
}

/// Populates a fresh `PKIHeader` from `ctx` (spec §4.1 `init_header`):
/// sender/recipient from configured identity, a fresh or stored
/// transactionID, a fresh senderNonce, the echoed recipNonce (if any), and
/// the current time. Storing the generated transactionID into `ctx` is an
/// observable side effect, and it is idempotent: calling this twice within
/// the same session before a reset yields the same transactionID (spec
/// §4.1, §5 idempotence). The senderNonce is *not* reused across distinct
/// messages — spec §4.3 requires 16 fresh random bytes for every outbound
/// message — so a new one is minted here whenever the previous one has
/// already been consumed by a validated response (`validate_received`
/// clears it); building two messages back to back without a response in
/// between reuses the still-pending nonce, since no response has echoed it
/// yet.
pub fn init_header(ctx: &mut Context) -> Result<PKIHeader> {
    let sender = ctx.sender_name()?;
    let recipient = ctx.recipient_name();

    let transaction_id = match ctx.transaction_id() {
        Some(id) => id,
        None => {
            let id = TransactionId::generate();
            ctx.set_transaction_id(id);
            id
        }
    };

    let sender_nonce = ctx.last_sent_sender_nonce().unwrap_or_else(|| {
        let n = Nonce::generate();
        ctx.set_last_sent_sender_nonce(n);
        n
    });

    let recip_nonce = ctx.recip_nonce();

    Ok(PKIHeader {
        pvno: PVNO,
        sender,
        recipient,
        message_time: Some(Utc::now()),
        protection_alg: None,
        sender_kid: None,
        recip_kid: None,
        transaction_id,
        sender_nonce,
        recip_nonce,
        general_info: Vec::new(),
    })
}
