//! Server responder engine (spec §4.5, §2 C9): validates an inbound
//! message, dispatches on body type to one of the processors below, and
//! returns the matching response, honoring `ServerContext`'s simulated
//! polling and fault-injection knobs.

use crate::builders::response::{
    build_cert_response, build_error_response, build_genp, build_pkiconf, build_poll_rep, build_rp,
    CertRepKind,
};
use crate::certs::CertifiedKeyPair;
use crate::context::ServerContext;
use crate::error::{CmpError, Result};
use crate::header::PKIHeader;
use crate::message::{CertStatus, Message, PkiBody, PollRepEntry, RevDetails, RevRepEntry};
use crate::status::{FailureBit, PKIFailureInfo, PKIStatus, PKIStatusInfo};
use crate::types::{CertReqId, Itav};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// State-free-per-request responder (spec §4.5 "State-free per request;
/// uses ServerContext for simulated behavior"). Wraps the mutable
/// `ServerContext` in a `Mutex` so `ServerEngine` itself is `Sync` and can
/// be shared behind an `Arc` by `InProcessTransfer`.
pub struct ServerEngine {
    ctx: Mutex<ServerContext>,
}

impl ServerEngine {
    /// Builds a responder around `ctx`.
    pub fn new(ctx: ServerContext) -> Self {
        Self { ctx: Mutex::new(ctx) }
    }

    /// Processes one inbound `Message` end to end (spec §4.5 pseudocode):
    /// defensive DER round-trip, header/protection validation, dispatch, and
    /// response assembly.
    #[instrument(skip(self, req), fields(body = req.body.type_name()))]
    pub async fn handle(&self, req: &Message) -> Result<Message> {
        let wire = req.encode().map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?;
        let req = Message::decode(&wire)?;

        if !req.header.sender.is_directory_name() {
            return Err(CmpError::SenderGeneralNameTypeNotSupported(
                req.header.sender.kind_name().to_string(),
            ));
        }

        let mut server = self.ctx.lock().await;
        validate_inbound_protection(&server, &req)?;

        let response = if server.faults.send_error {
            debug!("fault injection: sendError set, responding with ERROR");
            let status = server
                .pki_status_out
                .clone()
                .unwrap_or_else(|| PKIStatusInfo::rejection(PKIFailureInfo::empty(), Vec::new()));
            build_error_response(&server, &req.header, status)?
        } else {
            match &req.body {
                PkiBody::Ir(_) | PkiBody::Cr(_) | PkiBody::P10cr(_) | PkiBody::Kur(_) => {
                    process_cert_request(&mut server, &req)?
                }
                PkiBody::PollReq(id) => process_poll_req(&mut server, &req, *id)?,
                PkiBody::Rr(details) => process_rr(&mut server, &req, details)?,
                PkiBody::Error(_) => process_error(&server, &req)?,
                PkiBody::CertConf(statuses) => process_cert_conf(&server, &req, statuses)?,
                PkiBody::Genm(itavs) => process_genm(&server, &req, itavs.clone())?,
                other => {
                    return Err(CmpError::UnexpectedPKIBody {
                        expected: "IR/CR/KUR/P10CR/RR/ERROR/CERTCONF/GENM/POLLREQ".to_string(),
                        actual: other.type_name().to_string(),
                    })
                }
            }
        };
        drop(server);

        let wire = response.encode().map_err(|e| CmpError::ErrorDecodingMessage(e.to_string()))?;
        Message::decode(&wire)
    }
}

/// spec §4.5 "validate protection with unprotected-exception rule (mirror
/// of §4.2)": the server-side mirror of `verify::validate_received`'s step
/// 3/4, without the nonce/transactionID checks (those bind a *client*
/// session; the server is stateless per request).
fn validate_inbound_protection(server: &ServerContext, req: &Message) -> Result<()> {
    match &req.protection {
        Some(protection) => server.protector.verify(&req.protected_bytes(), protection),
        None if server.faults.accept_unprotected => Ok(()),
        None => Err(CmpError::ErrorValidatingProtection(
            "unprotected request rejected: acceptUnprotected not set".to_string(),
        )),
    }
}

fn cert_rep_kind_for(body: &PkiBody) -> Result<(CertRepKind, CertReqId)> {
    match body {
        PkiBody::Ir(reqs) => Ok((CertRepKind::Ip, first_cert_req_id(reqs)?)),
        PkiBody::Cr(reqs) => Ok((CertRepKind::Cp, first_cert_req_id(reqs)?)),
        PkiBody::P10cr(_) => Ok((CertRepKind::Cp, CertReqId::default())),
        PkiBody::Kur(reqs) => Ok((CertRepKind::Kup, first_cert_req_id(reqs)?)),
        other => Err(CmpError::UnexpectedPKIBody {
            expected: "IR/CR/KUR/P10CR".to_string(),
            actual: other.type_name().to_string(),
        }),
    }
}

fn first_cert_req_id(reqs: &[crate::message::CertReqMsg]) -> Result<CertReqId> {
    reqs.first().map(|r| r.cert_req_id).ok_or(CmpError::CertIDNotFound)
}

/// spec §4.5 `process_cert_request`: while `pollCount > 0`, retain the
/// request and answer `waiting`; otherwise issue the fixed `certOut` /
/// `chainOut` / `pkiStatusOut` and retain the certReqId for `process_certConf`.
///
/// The initial IR/CR/KUR/P10CR does not itself consume a poll credit —
/// only the PollReq/PollRep rounds in `process_poll_req` do (spec §8
/// scenarios 2/3 pin `pollCount` to the number of PollReq/PollRep pairs the
/// client performs before the terminal response).
fn process_cert_request(server: &mut ServerContext, req: &Message) -> Result<Message> {
    let (kind, cert_req_id) = cert_rep_kind_for(&req.body)?;
    server.retained_cert_req_id = Some(cert_req_id);

    if server.is_polling() {
        server.pending_request = Some(req.clone());
        let status = PKIStatusInfo::new(PKIStatus::Waiting, PKIFailureInfo::empty(), Vec::new());
        return build_cert_response(server, &req.header, kind, cert_req_id, status, None, Vec::new());
    }

    let cert = server.cert_out.clone().ok_or(CmpError::CertificateNotFound)?;
    let status = server.pki_status_out.clone().unwrap_or_else(PKIStatusInfo::accepted);
    let certified = Some(CertifiedKeyPair { cert, encrypted_key: None });
    let ca_pubs = server.chain_out.clone();
    build_cert_response(server, &req.header, kind, cert_req_id, status, certified, ca_pubs)
}

/// spec §4.5 `process_pollReq`: decrements `pollCount` and answers
/// `PollRep` while polling continues; once exhausted, re-runs the retained
/// request through `process_cert_request` to produce the terminal answer.
fn process_poll_req(server: &mut ServerContext, req: &Message, cert_req_id: CertReqId) -> Result<Message> {
    if server.poll_count == 0 {
        let pending = server
            .pending_request
            .clone()
            .ok_or_else(|| CmpError::BadRequestID("no pending request for pollReq".to_string()))?;
        return process_cert_request(server, &pending);
    }
    server.tick_poll();
    let entry = PollRepEntry { cert_req_id, check_after_secs: server.check_after_secs };
    build_poll_rep(server, &req.header, entry)
}

/// spec §4.5 `process_rr`: the revocation must target `ctx.certOut`'s
/// issuer and serial. A mismatch is reported as a rejected `RP` (decision
/// recorded in DESIGN.md — see `[[rr-mismatch-is-a-response-not-a-fault]]`)
/// rather than failing the whole exchange, matching spec §8 scenario 4's
/// expectation that the client still receives a status to inspect.
fn process_rr(server: &mut ServerContext, req: &Message, details: &[RevDetails]) -> Result<Message> {
    let targeted = details.first().ok_or(CmpError::CertIDNotFound)?;
    let matches_cert_out = server
        .cert_out
        .as_ref()
        .and_then(|c| c.issuer_and_serial().ok())
        .map(|id| id == targeted.cert_id)
        .unwrap_or(false);

    let (status, cert_id) = if matches_cert_out {
        (server.pki_status_out.clone().unwrap_or_else(PKIStatusInfo::accepted), targeted.cert_id.clone())
    } else {
        (
            PKIStatusInfo::rejection(
                PKIFailureInfo::empty().with(FailureBit::BadCertId),
                vec!["request not accepted: certificate not found".to_string()],
            ),
            targeted.cert_id.clone(),
        )
    };
    build_rp(server, &req.header, RevRepEntry { status, cert_id })
}

/// spec §4.5 `process_certConf`: recomputes the hash over `ctx.certOut` and
/// compares it and the echoed certReqId against what was retained. Mismatches
/// are reported as an ERROR body (decision recorded in DESIGN.md) carrying
/// the relevant failInfo bit, rather than failing the call.
fn process_cert_conf(server: &ServerContext, req: &Message, statuses: &[CertStatus]) -> Result<Message> {
    let confirmed = statuses.first().ok_or(CmpError::PKIStatusInfoNotFound)?;

    let expected_id = server.retained_cert_req_id.unwrap_or_default();
    if confirmed.cert_req_id != expected_id {
        let status = PKIStatusInfo::rejection(
            PKIFailureInfo::empty().with(FailureBit::BadRequest),
            vec![format!(
                "unexpected request ID: expected {}, got {}",
                expected_id, confirmed.cert_req_id
            )],
        );
        return build_error_response(server, &req.header, status);
    }

    let expected_hash = server
        .cert_out
        .as_ref()
        .map(|c| c.sha256_fingerprint().to_vec())
        .ok_or(CmpError::CertificateNotFound)?;
    if confirmed.cert_hash != expected_hash {
        let status = PKIStatusInfo::rejection(
            PKIFailureInfo::empty().with(FailureBit::BadCertId),
            vec!["wrong cert hash".to_string()],
        );
        return build_error_response(server, &req.header, status);
    }

    build_pkiconf(server, &req.header)
}

/// spec §4.5 `process_genm`: default behavior echoes the incoming ITAVs.
fn process_genm(server: &ServerContext, req: &Message, itavs: Vec<Itav>) -> Result<Message> {
    build_genp(server, &req.header, itavs)
}

/// spec §4.5 `process_error`: default behavior logs and acknowledges.
fn process_error(server: &ServerContext, req: &Message) -> Result<Message> {
    warn!("received ERROR from peer, acknowledging with PKICONF");
    build_pkiconf(server, &req.header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::{Certificate, MockProtector};
    use crate::message::CertReqMsg;
    use crate::types::{GeneralName, Nonce, TransactionId, PVNO};
    use std::sync::Arc;

    fn sample_req_header() -> PKIHeader {
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

    fn protected_ir(protector: &dyn crate::certs::CertProtector) -> Message {
        let header = sample_req_header();
        let body = PkiBody::Ir(vec![CertReqMsg {
            cert_req_id: CertReqId::default(),
            subject: "CN=alice".into(),
            sans: vec![],
            public_key: vec![1, 2, 3],
            popo_method: crate::certs::PopoMethod::Signature,
            popo_value: None,
        }]);
        let mut msg = Message { header, body, protection: None, extra_certs: vec![] };
        msg.protection = Some(protector.protect(&msg.protected_bytes()).unwrap());
        msg
    }

    #[tokio::test]
    async fn issues_cert_immediately_with_no_polling() {
        let protector = Arc::new(MockProtector::new(b"shared".to_vec()));
        let mut ctx = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        ctx.cert_out = Some(Certificate::from_der(vec![9, 9, 9]));
        let engine = ServerEngine::new(ctx);

        let req = protected_ir(protector.as_ref());
        let resp = engine.handle(&req).await.unwrap();
        match resp.body {
            PkiBody::Ip(rep) => {
                assert_eq!(rep.responses.len(), 1);
                assert_eq!(rep.responses[0].status.status(), PKIStatus::Accepted);
                assert!(rep.responses[0].certified.is_some());
            }
            other => panic!("expected IP, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn waits_while_polling_then_issues() {
        let protector = Arc::new(MockProtector::new(b"shared".to_vec()));
        let mut ctx = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        ctx.cert_out = Some(Certificate::from_der(vec![1]));
        ctx.poll_count = 1;
        ctx.check_after_secs = 0;
        let engine = ServerEngine::new(ctx);

        let req = protected_ir(protector.as_ref());
        let resp = engine.handle(&req).await.unwrap();
        match resp.body {
            PkiBody::Ip(rep) => assert_eq!(rep.responses[0].status.status(), PKIStatus::Waiting),
            other => panic!("expected IP waiting, got {other:?}"),
        }

        let poll_req = {
            let header = PKIHeader {
                transaction_id: resp.header.transaction_id,
                recip_nonce: Some(resp.header.sender_nonce),
                ..sample_req_header()
            };
            let mut msg =
                Message { header, body: PkiBody::PollReq(CertReqId::default()), protection: None, extra_certs: vec![] };
            msg.protection = Some(protector.protect(&msg.protected_bytes()).unwrap());
            msg
        };
        let resp2 = engine.handle(&poll_req).await.unwrap();
        match resp2.body {
            PkiBody::Ip(rep) => assert_eq!(rep.responses[0].status.status(), PKIStatus::Accepted),
            other => panic!("expected final IP, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_error_fault_overrides_everything() {
        let protector = Arc::new(MockProtector::new(b"shared".to_vec()));
        let mut ctx = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        ctx.faults.send_error = true;
        ctx.pki_status_out = Some(PKIStatusInfo::rejection(
            PKIFailureInfo::empty().with(FailureBit::SignerNotTrusted),
            vec!["nope".into()],
        ));
        let engine = ServerEngine::new(ctx);

        let req = protected_ir(protector.as_ref());
        let resp = engine.handle(&req).await.unwrap();
        assert!(matches!(resp.body, PkiBody::Error(_)));
    }

    #[tokio::test]
    async fn rr_mismatch_yields_rejected_rp_not_a_hard_error() {
        let protector = Arc::new(MockProtector::new(b"shared".to_vec()));
        let mut ctx = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        ctx.cert_out = None;
        let engine = ServerEngine::new(ctx);

        let header = sample_req_header();
        let body = PkiBody::Rr(vec![RevDetails {
            cert_id: crate::certs::CertId { issuer: "CN=someone-else".into(), serial: vec![9] },
            reason: crate::types::RevocationReason::Unspecified,
        }]);
        let mut msg = Message { header, body, protection: None, extra_certs: vec![] };
        msg.protection = Some(protector.protect(&msg.protected_bytes()).unwrap());

        let resp = engine.handle(&msg).await.unwrap();
        match resp.body {
            PkiBody::Rp(entries) => assert_eq!(entries[0].status.status(), PKIStatus::Rejection),
            other => panic!("expected RP, got {other:?}"),
        }
    }
}
