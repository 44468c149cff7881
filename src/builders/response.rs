//! Server-side response builders (spec §4.5, §2 C7): IP/CP/KUP/RP/PKIconf/
//! pollRep/genp/error, each with a header mirrored from the inbound request.

use crate::certs::CertProtector;
use crate::context::{FaultInjection, ServerContext};
use crate::error::Result;
use crate::header::PKIHeader;
use crate::message::{
    CertRepMessage, CertResponse, CertifiedKeyPair, ErrorContent, Message, PkiBody, PollRepEntry,
    RevRepEntry,
};
use crate::status::PKIStatusInfo;
use crate::types::{CertReqId, GeneralName, Itav, Nonce, TransactionId};
use chrono::Utc;

/// Selects which of the three cert-response body types to build (spec §3
/// Message body — IP answers IR, CP answers CR/P10CR, KUP answers KUR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertRepKind {
    /// Answers an IR.
    Ip,
    /// Answers a CR or P10CR.
    Cp,
    /// Answers a KUR.
    Kup,
}

/// Mirrors `req_header` into a response header (spec §4.5 "build response
/// message with mirrored transactionID and senderNonce-derived recipNonce"):
/// same `transactionID`, a fresh `senderNonce`, `recipNonce` echoing the
/// request's `senderNonce`, and the implicit-confirm ITAV if `faults`
/// allows it and the request asked for it. `faults.corrupt_recip_nonce` and
/// `faults.corrupt_transaction_id` deliberately break the mirrored fields
/// so a conformance suite can exercise the client's §4.2 checks 1 and 5
/// (`TransactionIdUnmatched`, `NoncesDoNotMatch`) against a misbehaving
/// peer.
pub fn mirror_header(sender: GeneralName, req_header: &PKIHeader, faults: &FaultInjection) -> PKIHeader {
    let general_info = if faults.grant_implicit_confirm && req_header.check_implicit_confirm() {
        vec![Itav::implicit_confirm()]
    } else {
        Vec::new()
    };
    let transaction_id =
        if faults.corrupt_transaction_id { TransactionId::generate() } else { req_header.transaction_id };
    let recip_nonce =
        if faults.corrupt_recip_nonce { Nonce::generate() } else { req_header.sender_nonce };
    PKIHeader {
        pvno: req_header.pvno,
        sender,
        recipient: req_header.sender.clone(),
        message_time: Some(Utc::now()),
        protection_alg: None,
        sender_kid: None,
        recip_kid: None,
        transaction_id,
        sender_nonce: Nonce::generate(),
        recip_nonce: Some(recip_nonce),
        general_info,
    }
}

fn finish(protector: &dyn CertProtector, header: PKIHeader, body: PkiBody, unprotected: bool) -> Result<Message> {
    let mut msg = Message { header, body, protection: None, extra_certs: Vec::new() };
    if !unprotected {
        let protection = protector.protect(&msg.protected_bytes())?;
        msg.protection = Some(protection);
    }
    Ok(msg)
}

/// Builds an IP/CP/KUP carrying a single `CertResponse` (spec §4.5
/// `process_cert_request`, `process_pollReq`).
#[allow(clippy::too_many_arguments)]
pub fn build_cert_response(
    server: &ServerContext,
    req_header: &PKIHeader,
    kind: CertRepKind,
    cert_req_id: CertReqId,
    status: PKIStatusInfo,
    certified: Option<CertifiedKeyPair>,
    ca_pubs: Vec<crate::certs::Certificate>,
) -> Result<Message> {
    let header = mirror_header(server.identity.clone(), req_header, &server.faults);
    let rep = CertRepMessage { ca_pubs, responses: vec![CertResponse { cert_req_id, status, certified }] };
    let body = match kind {
        CertRepKind::Ip => PkiBody::Ip(rep),
        CertRepKind::Cp => PkiBody::Cp(rep),
        CertRepKind::Kup => PkiBody::Kup(rep),
    };
    finish(server.protector.as_ref(), header, body, server.faults.respond_unprotected)
}

/// Builds an RP (spec §4.5 `process_rr`).
pub fn build_rp(
    server: &ServerContext,
    req_header: &PKIHeader,
    entry: RevRepEntry,
) -> Result<Message> {
    let header = mirror_header(server.identity.clone(), req_header, &server.faults);
    finish(
        server.protector.as_ref(),
        header,
        PkiBody::Rp(vec![entry]),
        server.faults.respond_unprotected,
    )
}

/// Builds a PKICONF (spec §4.5 `process_certConf`, `process_error`).
pub fn build_pkiconf(server: &ServerContext, req_header: &PKIHeader) -> Result<Message> {
    let header = mirror_header(server.identity.clone(), req_header, &server.faults);
    finish(server.protector.as_ref(), header, PkiBody::PkiConf, server.faults.respond_unprotected)
}

/// Builds a PollRep (spec §4.5 `process_pollReq`).
pub fn build_poll_rep(server: &ServerContext, req_header: &PKIHeader, entry: PollRepEntry) -> Result<Message> {
    let header = mirror_header(server.identity.clone(), req_header, &server.faults);
    finish(
        server.protector.as_ref(),
        header,
        PkiBody::PollRep(vec![entry]),
        server.faults.respond_unprotected,
    )
}

/// Builds a GENP echoing `itavs` (spec §4.5 `process_genm` default
/// behavior).
pub fn build_genp(server: &ServerContext, req_header: &PKIHeader, itavs: Vec<Itav>) -> Result<Message> {
    let header = mirror_header(server.identity.clone(), req_header, &server.faults);
    finish(server.protector.as_ref(), header, PkiBody::Genp(itavs), server.faults.respond_unprotected)
}

/// Builds an ERROR response (spec §4.5 "if sendError is set: respond with
/// ERROR carrying pkiStatusOut").
pub fn build_error_response(server: &ServerContext, req_header: &PKIHeader, status: PKIStatusInfo) -> Result<Message> {
    let header = mirror_header(server.identity.clone(), req_header, &server.faults);
    let unprotected = server.faults.respond_unprotected;
    finish(
        server.protector.as_ref(),
        header,
        PkiBody::Error(ErrorContent { status, error_code: None, error_details: Vec::new() }),
        unprotected,
    )
}
