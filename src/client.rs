//! Client session engine (spec §4.4, §4.6, §2 C8): drives one transaction
//! (IR/CR/KUR/P10CR/RR/GENM) from first request to terminal state, handling
//! the polling submode, implicit/explicit certificate confirmation, and the
//! per-session state machine.

use crate::builders::request::{
    build_cert_conf, build_error, build_genm, build_ir, build_kur, build_p10cr, build_poll_req, build_rr,
    build_cr, CertRequestParams,
};
use crate::certs::Csr;
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::message::Message;
use crate::message::PkiBody;
use crate::status::{render, PKIStatus, PKIStatusInfo};
use crate::types::{CertReqId, Itav, RevocationReason};
use crate::verify::validate_received;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// The per-session state machine spec §4.6 describes, tracked only for
/// observability (logging/tracing); no transition is gated on this value —
/// the match arms in `run_cert_issuance` already encode the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No request sent yet.
    Start,
    /// The initial IR/CR/KUR/P10CR has been sent, awaiting a response.
    ReqSent,
    /// A `waiting` status was received; PollReq/PollRep round trips follow.
    Polling,
    /// A terminal cert response was received and validated.
    ResponseReceived,
    /// certConf was sent; awaiting PKICONF.
    ConfSent,
    /// The transaction completed successfully.
    Done,
    /// The transaction failed; `Context::last_status` holds diagnostic
    /// detail where one was received.
    Failed,
}

/// Outcome of a revocation request (spec §4.4 RR transaction, §9 "RR status
/// mapping"): `Rejected` is a value carried in `Ok`, not an error — the RFC
/// draws a line between "the server declined" (a normal protocol outcome)
/// and "something went wrong talking to the server" (an `Err`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// Revocation accepted as requested.
    Accepted,
    /// Revocation accepted with modifications.
    GrantedWithMods,
    /// Revocation is pending.
    RevocationWarning,
    /// Revocation has occurred (informational notice).
    RevocationNotification,
    /// The server declined to revoke the certificate.
    Rejected,
}

fn unexpected_body(expected: &str, actual: &PkiBody) -> CmpError {
    CmpError::UnexpectedPKIBody { expected: expected.to_string(), actual: actual.type_name().to_string() }
}

async fn send(ctx: &Context, request: &Message) -> Result<Message> {
    ctx.transfer().send(request).await
}

/// Drives an IR from first request to terminal state (spec §4.4's general
/// cert-issuance shape), including polling and the automatic certConf
/// exchange.
#[instrument(skip(ctx, params))]
pub async fn exec_ir(ctx: &mut Context, params: &CertRequestParams) -> Result<()> {
    let request = build_ir(ctx, params)?;
    run_cert_issuance(ctx, request).await
}

/// Drives a CR (spec §4.4).
#[instrument(skip(ctx, params))]
pub async fn exec_cr(ctx: &mut Context, params: &CertRequestParams) -> Result<()> {
    let request = build_cr(ctx, params)?;
    run_cert_issuance(ctx, request).await
}

/// Drives a KUR (spec §4.4). Requires `ctx.old_cert()` to be set.
#[instrument(skip(ctx, params))]
pub async fn exec_kur(ctx: &mut Context, params: &CertRequestParams) -> Result<()> {
    let request = build_kur(ctx, params)?;
    run_cert_issuance(ctx, request).await
}

/// Drives a P10CR (spec §4.4).
#[instrument(skip(ctx))]
pub async fn exec_p10cr(ctx: &mut Context, csr: Csr) -> Result<()> {
    let request = build_p10cr(ctx, csr)?;
    run_cert_issuance(ctx, request).await
}

/// Shared IR/CR/KUR/P10CR driver (spec §4.4 pseudocode): sends `request`,
/// validates the response, follows the polling submode on `waiting`, then
/// extracts the issued certificate and — unless `disableConfirm` is set or
/// the peer advertised implicit confirm — sends certConf and awaits PKICONF.
async fn run_cert_issuance(ctx: &mut Context, mut request: Message) -> Result<()> {
    let total_timeout = ctx.options().total_timeout_secs;
    let mut elapsed: u64 = 0;
    let mut state = SessionState::ReqSent;

    let (ca_pubs, cert_response, extra_certs_in, peer_implicit_confirm) = loop {
        let response = match send(ctx, &request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(?state, "transfer failed");
                return Err(e);
            }
        };
        if let Err(e) = validate_received(ctx, &response) {
            warn!(?e, "response failed validation");
            return Err(e);
        }
        let peer_implicit_confirm = response.header.check_implicit_confirm();
        let extra_certs = response.extra_certs.clone();

        match response.body {
            PkiBody::Ip(rep) | PkiBody::Cp(rep) | PkiBody::Kup(rep) => {
                let first = rep.responses.into_iter().next().ok_or(CmpError::CertresponseNotFound)?;
                if first.status.status() == PKIStatus::Waiting {
                    state = SessionState::Polling;
                    debug!(?state, "server returned waiting, entering polling submode");
                    request = build_poll_req(ctx, first.cert_req_id)?;
                    continue;
                }
                break (rep.ca_pubs, first, extra_certs, peer_implicit_confirm);
            }
            PkiBody::PollRep(entries) => {
                state = SessionState::Polling;
                debug!(?state, "polling continues");
                let entry = entries.into_iter().next().ok_or(CmpError::CertIDNotFound)?;
                // `>=`, not `>`: a full-length wait that would land exactly on the
                // budget still has to be the session's last ordinary wait — the
                // server's own poll countdown keeps advancing independently of the
                // client's elapsed-time bookkeeping, so treating an exact match as
                // "still fits" would let the session run one round past the budget
                // spec §5/§8 scenario 3 pins to `TotalTimeoutExceeded`.
                if total_timeout > 0 && elapsed + entry.check_after_secs >= total_timeout {
                    let remaining = total_timeout.saturating_sub(elapsed);
                    if remaining > 0 {
                        tokio::time::sleep(Duration::from_secs(remaining)).await;
                    }
                    request = build_poll_req(ctx, entry.cert_req_id)?;
                    let final_response = send(ctx, &request).await?;
                    validate_received(ctx, &final_response)?;
                    let final_peer_implicit = final_response.header.check_implicit_confirm();
                    let final_extra_certs = final_response.extra_certs.clone();
                    match final_response.body {
                        PkiBody::Ip(rep) | PkiBody::Cp(rep) | PkiBody::Kup(rep) => {
                            let first =
                                rep.responses.into_iter().next().ok_or(CmpError::CertresponseNotFound)?;
                            if first.status.status() == PKIStatus::Waiting {
                                return Err(CmpError::TotalTimeoutExceeded);
                            }
                            break (rep.ca_pubs, first, final_extra_certs, final_peer_implicit);
                        }
                        PkiBody::PollRep(_) => return Err(CmpError::TotalTimeoutExceeded),
                        PkiBody::Error(e) => return Err(CmpError::PkiBodyError(render(&e.status))),
                        other => return Err(unexpected_body("IP/CP/KUP", &other)),
                    }
                }
                tokio::time::sleep(Duration::from_secs(entry.check_after_secs)).await;
                elapsed += entry.check_after_secs;
                request = build_poll_req(ctx, entry.cert_req_id)?;
            }
            PkiBody::Error(e) => {
                debug!(state = ?SessionState::Failed, "peer reported an error");
                ctx.set_last_status(e.status.clone());
                return Err(CmpError::PkiBodyError(render(&e.status)));
            }
            other => return Err(unexpected_body("IP/CP/KUP", &other)),
        }
    };

    ctx.set_last_status(cert_response.status.clone());
    let certified = cert_response.certified.ok_or(CmpError::CertresponseNotFound)?;
    ctx.set_new_cert(certified.cert);
    if let Some(encrypted_key) = certified.encrypted_key {
        ctx.set_new_pkey(encrypted_key);
    }
    ctx.set_ca_pubs(ca_pubs);
    ctx.set_extra_certs_in(extra_certs_in);

    if !ctx.options().disable_confirm && !peer_implicit_confirm {
        exchange_cert_conf(ctx).await?;
    }
    debug!(state = ?SessionState::Done, "transaction complete");
    Ok(())
}

/// Sends a certConf for `ctx.new_cert()` and awaits PKICONF (spec §4.4
/// `exchange_certConf`, §4.1/§5 idempotence — a second call is a no-op once
/// one confirmation has been sent this session). Fails immediately, with no
/// message sent, if there is no certificate to confirm (spec §8 scenario 7).
#[instrument(skip(ctx))]
pub async fn exchange_cert_conf(ctx: &mut Context) -> Result<()> {
    if ctx.cert_conf_sent() {
        return Ok(());
    }
    let cert = ctx
        .new_cert()
        .cloned()
        .ok_or_else(|| CmpError::ErrorCreatingCertConf("no certificate to confirm".to_string()))?;

    let request = build_cert_conf(ctx, &cert, CertReqId::default())?;
    ctx.set_cert_conf_sent(true);

    let response = send(ctx, &request).await?;
    validate_received(ctx, &response)?;
    match response.body {
        PkiBody::PkiConf => Ok(()),
        PkiBody::Error(e) => Err(CmpError::PkiBodyError(render(&e.status))),
        other => Err(unexpected_body("PKICONF", &other)),
    }
}

/// Drives an RR to completion (spec §4.4 RR transaction, §9 mapping table).
#[instrument(skip(ctx))]
pub async fn exec_rr(ctx: &mut Context, reason: Option<RevocationReason>) -> Result<RevocationOutcome> {
    let request = build_rr(ctx, reason)?;
    let response = send(ctx, &request).await?;
    validate_received(ctx, &response)?;
    match response.body {
        PkiBody::Rp(entries) => {
            let entry = entries.into_iter().next().ok_or(CmpError::PKIStatusInfoNotFound)?;
            ctx.set_last_status(entry.status.clone());
            match entry.status.status() {
                PKIStatus::Accepted => Ok(RevocationOutcome::Accepted),
                PKIStatus::GrantedWithMods => Ok(RevocationOutcome::GrantedWithMods),
                PKIStatus::RevocationWarning => Ok(RevocationOutcome::RevocationWarning),
                PKIStatus::RevocationNotification => Ok(RevocationOutcome::RevocationNotification),
                PKIStatus::Rejection => Ok(RevocationOutcome::Rejected),
                PKIStatus::Waiting | PKIStatus::KeyUpdateWarning => {
                    Err(CmpError::UnexpectedPKIStatus(render(&entry.status)))
                }
            }
        }
        PkiBody::Error(e) => Err(CmpError::PkiBodyError(render(&e.status))),
        other => Err(unexpected_body("RP", &other)),
    }
}

/// Drives a GENM/GENP exchange, returning the peer's ITAV list (spec §4.4
/// GENM transaction).
#[instrument(skip(ctx))]
pub async fn exec_genm(ctx: &mut Context, itavs: Vec<Itav>) -> Result<Vec<Itav>> {
    let request = build_genm(ctx, itavs)?;
    let response = send(ctx, &request).await?;
    validate_received(ctx, &response)?;
    match response.body {
        PkiBody::Genp(out) => Ok(out),
        PkiBody::Error(e) => Err(CmpError::PkiBodyError(render(&e.status))),
        other => Err(unexpected_body("GENP", &other)),
    }
}

/// Sends an ERROR body (spec §4.4 "Error transaction"). Callable at any
/// time; the peer may answer with PKICONF, which this function validates
/// when present but does not require.
#[instrument(skip(ctx))]
pub async fn exchange_error(ctx: &mut Context, status: PKIStatusInfo) -> Result<()> {
    let request = build_error(ctx, status)?;
    let response = send(ctx, &request).await?;
    if matches!(response.body, PkiBody::PkiConf) {
        validate_received(ctx, &response)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::{Certificate, MockProtector};
    use crate::config::EndpointOptions;
    use crate::context::ServerContext;
    use crate::server::ServerEngine;
    use crate::status::{FailureBit, PKIFailureInfo};
    use crate::transfer::InProcessTransfer;
    use crate::types::GeneralName;
    use std::sync::Arc;

    fn client_ctx(server: Arc<ServerEngine>, options: EndpointOptions) -> Context {
        Context::new(
            GeneralName::DirectoryName("CN=client".into()),
            GeneralName::DirectoryName("CN=server".into()),
            Arc::new(MockProtector::new(b"shared-secret".to_vec())),
            Arc::new(InProcessTransfer::new(server)),
            options,
        )
    }

    fn server_with_cert(cert: Vec<u8>) -> Arc<ServerEngine> {
        let protector = Arc::new(MockProtector::new(b"shared-secret".to_vec()));
        let mut sc = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector);
        sc.cert_out = Some(Certificate::from_der(cert));
        Arc::new(ServerEngine::new(sc))
    }

    fn params() -> CertRequestParams {
        CertRequestParams {
            subject: "CN=alice".into(),
            sans: vec!["alice@example.com".into()],
            public_key: vec![1, 2, 3, 4],
            popo_value: Some(vec![5, 6]),
        }
    }

    #[tokio::test]
    async fn ir_happy_path_obtains_cert_and_confirms() {
        let server = server_with_cert(vec![7, 7, 7]);
        let mut ctx = client_ctx(server, EndpointOptions::default());

        exec_ir(&mut ctx, &params()).await.unwrap();

        assert_eq!(ctx.new_cert().unwrap().der(), &[7, 7, 7]);
        assert!(ctx.cert_conf_sent());
    }

    #[tokio::test]
    async fn ir_with_implicit_confirm_skips_cert_conf() {
        let protector = Arc::new(MockProtector::new(b"shared-secret".to_vec()));
        let mut sc = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        sc.cert_out = Some(Certificate::from_der(vec![1, 2]));
        sc.faults.grant_implicit_confirm = true;
        let server = Arc::new(ServerEngine::new(sc));

        let mut ctx = client_ctx(
            server,
            EndpointOptions { implicit_confirm: true, ..EndpointOptions::default() },
        );
        exec_ir(&mut ctx, &params()).await.unwrap();

        assert!(ctx.new_cert().is_some());
        assert!(!ctx.cert_conf_sent());
    }

    #[tokio::test]
    async fn ir_with_polling_resolves_after_one_round() {
        let protector = Arc::new(MockProtector::new(b"shared-secret".to_vec()));
        let mut sc = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        sc.cert_out = Some(Certificate::from_der(vec![3, 3, 3]));
        sc.poll_count = 1;
        sc.check_after_secs = 0;
        let server = Arc::new(ServerEngine::new(sc));

        let mut ctx = client_ctx(server, EndpointOptions::default());
        exec_ir(&mut ctx, &params()).await.unwrap();

        assert_eq!(ctx.new_cert().unwrap().der(), &[3, 3, 3]);
    }

    #[tokio::test]
    async fn ir_polling_timeout_is_reported() {
        let protector = Arc::new(MockProtector::new(b"shared-secret".to_vec()));
        let mut sc = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        sc.cert_out = Some(Certificate::from_der(vec![4]));
        sc.poll_count = 4;
        sc.check_after_secs = 1;
        let server = Arc::new(ServerEngine::new(sc));

        let mut ctx = client_ctx(
            server,
            EndpointOptions { total_timeout_secs: 1, ..EndpointOptions::default() },
        );
        let result = exec_ir(&mut ctx, &params()).await;
        assert!(matches!(result, Err(CmpError::TotalTimeoutExceeded)));
        assert!(ctx.new_cert().is_none());
    }

    #[tokio::test]
    async fn rr_mismatched_issuer_is_reported_as_rejected() {
        use crate::certs::test_certificate;
        let server_cert = test_certificate("server-issued");
        let unrelated_cert = test_certificate("someone-else");

        let protector = Arc::new(MockProtector::new(b"shared-secret".to_vec()));
        let mut sc = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        sc.cert_out = Some(server_cert);
        let server = Arc::new(ServerEngine::new(sc));

        let mut ctx = client_ctx(server, EndpointOptions::default());
        ctx.set_old_cert(unrelated_cert);

        // A mismatched revocation target is a normal protocol outcome (spec
        // §4.5 `process_rr`), not a transport failure: the client still
        // receives and can inspect an RP.
        let outcome = exec_rr(&mut ctx, None).await.unwrap();
        assert_eq!(outcome, RevocationOutcome::Rejected);
    }

    #[tokio::test]
    async fn rr_build_fails_for_unparseable_old_cert() {
        let server = server_with_cert(vec![1, 2, 3]);
        let mut ctx = client_ctx(server, EndpointOptions::default());
        ctx.set_old_cert(Certificate::from_der(b"not-a-real-certificate".to_vec()));

        // issuer_and_serial() fails to parse this DER via x509-parser, which
        // build_rr surfaces as ErrorCreatingRR before anything is sent.
        let result = exec_rr(&mut ctx, None).await;
        assert!(matches!(result, Err(CmpError::ErrorCreatingRR(_))));
    }

    #[tokio::test]
    async fn rr_with_induced_error_fails_and_renders_status() {
        use crate::certs::test_certificate;
        let protector = Arc::new(MockProtector::new(b"shared-secret".to_vec()));
        let mut sc = ServerContext::new(GeneralName::DirectoryName("CN=server".into()), protector.clone());
        sc.faults.send_error = true;
        sc.pki_status_out = Some(PKIStatusInfo::rejection(
            PKIFailureInfo::empty().with(FailureBit::SignerNotTrusted),
            vec!["rejected".to_string()],
        ));
        let server = Arc::new(ServerEngine::new(sc));

        let mut ctx = client_ctx(server, EndpointOptions::default());
        ctx.set_old_cert(test_certificate("client-held"));

        let result = exec_rr(&mut ctx, None).await;
        match result {
            Err(CmpError::PkiBodyError(msg)) => {
                assert!(msg.contains("rejection"));
                assert!(msg.contains("signerNotTrusted"));
            }
            other => panic!("expected PkiBodyError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cert_conf_without_new_cert_fails_with_no_send() {
        let server = server_with_cert(vec![1]);
        let mut ctx = client_ctx(server, EndpointOptions::default());
        let result = exchange_cert_conf(&mut ctx).await;
        assert!(matches!(result, Err(CmpError::ErrorCreatingCertConf(_))));
        assert!(!ctx.cert_conf_sent());
    }

    #[tokio::test]
    async fn genm_round_trips_itavs() {
        let server = server_with_cert(vec![1]);
        let mut ctx = client_ctx(server, EndpointOptions::default());
        let itavs = vec![Itav { infotype: crate::types::Oid("1.2.3.4".into()), infovalue: None }];
        let out = exec_genm(&mut ctx, itavs.clone()).await.unwrap();
        assert_eq!(out, itavs);
    }
}
