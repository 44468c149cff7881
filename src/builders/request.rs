//! Client-side request builders (spec §4.4, §2 C6): IR/CR/KUR/P10CR/RR/GENM
//! plus the certConf/pollReq/error bodies the session engine sends mid-
//! transaction.

use crate::certs::{Csr, PopoMethod};
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::header::init_header;
use crate::message::{CertReqMsg, CertStatus, ErrorContent, Message, PkiBody, RevDetails};
use crate::status::PKIStatusInfo;
use crate::types::{CertReqId, Itav, RevocationReason};

/// Parameters for an IR/CR/KUR cert request — everything the caller must
/// supply beyond what `Context` already tracks (identity, nonces, options).
#[derive(Debug, Clone)]
pub struct CertRequestParams {
    /// Requested subject distinguished name.
    pub subject: String,
    /// Requested Subject Alternative Names.
    pub sans: Vec<String>,
    /// The public key to certify, opaque to the engine.
    pub public_key: Vec<u8>,
    /// Proof-of-possession value from the crypto seam, absent when
    /// `ctx.options().popo_method == PopoMethod::RaVerified`.
    pub popo_value: Option<Vec<u8>>,
}

fn cert_req_msg(ctx: &Context, params: &CertRequestParams) -> CertReqMsg {
    CertReqMsg {
        cert_req_id: CertReqId::default(),
        subject: params.subject.clone(),
        sans: params.sans.clone(),
        public_key: params.public_key.clone(),
        popo_method: ctx.options().popo_method,
        popo_value: params.popo_value.clone(),
    }
}

/// Wraps `header`/`body` into a fully protected `Message`: applies
/// `ImplicitConfirm` if the session advertises it (spec §4.1
/// `set_implicitConfirm`), then protects via `ctx.protector()` unless
/// `UnprotectedSend` is set (spec §6 Options table).
fn finish(ctx: &mut Context, mut header: crate::header::PKIHeader, body: PkiBody) -> Result<Message> {
    if ctx.options().implicit_confirm {
        header.set_implicit_confirm();
    }
    let mut msg = Message { header, body, protection: None, extra_certs: Vec::new() };
    if !ctx.options().unprotected_send {
        let protection = ctx.protector().protect(&msg.protected_bytes())?;
        msg.protection = Some(protection);
    }
    Ok(msg)
}

/// Builds an Initialization Request (spec §3 Message body `Ir`).
pub fn build_ir(ctx: &mut Context, params: &CertRequestParams) -> Result<Message> {
    let req = cert_req_msg(ctx, params);
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingIR(e.to_string()))?;
    finish(ctx, header, PkiBody::Ir(vec![req]))
}

/// Builds a Certification Request (spec §3 Message body `Cr`).
pub fn build_cr(ctx: &mut Context, params: &CertRequestParams) -> Result<Message> {
    let req = cert_req_msg(ctx, params);
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingCR(e.to_string()))?;
    finish(ctx, header, PkiBody::Cr(vec![req]))
}

/// Builds a Key-Update Request (spec §3 Message body `Kur`). Requires
/// `ctx.old_cert()` to be set — KUR updates an existing certificate.
pub fn build_kur(ctx: &mut Context, params: &CertRequestParams) -> Result<Message> {
    if ctx.old_cert().is_none() {
        return Err(CmpError::ErrorCreatingKUR(
            "KUR requires ctx.old_cert() to be set".to_string(),
        ));
    }
    let req = cert_req_msg(ctx, params);
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingKUR(e.to_string()))?;
    finish(ctx, header, PkiBody::Kur(vec![req]))
}

/// Builds a PKCS#10-wrapped Request (spec §3 Message body `P10cr`).
pub fn build_p10cr(ctx: &mut Context, csr: Csr) -> Result<Message> {
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingP10CR(e.to_string()))?;
    finish(ctx, header, PkiBody::P10cr(csr))
}

/// Builds a Revocation Request from `ctx.old_cert()` (spec §4.4 "Build RR
/// from ctx.oldCert (issuer + serial derived from it)"). `reason` overrides
/// `ctx.options().default_revocation_reason` when provided.
pub fn build_rr(ctx: &mut Context, reason: Option<RevocationReason>) -> Result<Message> {
    let old_cert = ctx
        .old_cert()
        .ok_or_else(|| CmpError::ErrorCreatingRR("RR requires ctx.old_cert() to be set".to_string()))?;
    let cert_id = old_cert
        .issuer_and_serial()
        .map_err(|e| CmpError::ErrorCreatingRR(e.to_string()))?;
    let reason = reason.unwrap_or(ctx.options().default_revocation_reason);
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingRR(e.to_string()))?;
    finish(ctx, header, PkiBody::Rr(vec![RevDetails { cert_id, reason }]))
}

/// Builds a General Message carrying `itavs` (spec §4.4 GENM transaction).
pub fn build_genm(ctx: &mut Context, itavs: Vec<Itav>) -> Result<Message> {
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingGENM(e.to_string()))?;
    finish(ctx, header, PkiBody::Genm(itavs))
}

/// Builds a certificate confirmation for `cert` (spec §4.4
/// `exchange_certConf`, §8 "Hash match"). The digest is always SHA-256;
/// `ctx.options().digest_algorithm` documents the configured choice but this
/// engine's crypto seam (spec §1) only implements the one hash the mock
/// responder also recomputes.
pub fn build_cert_conf(
    ctx: &mut Context,
    cert: &crate::certs::Certificate,
    cert_req_id: CertReqId,
) -> Result<Message> {
    let cert_hash = cert.sha256_fingerprint().to_vec();
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingCertConf(e.to_string()))?;
    finish(ctx, header, PkiBody::CertConf(vec![CertStatus { cert_hash, cert_req_id }]))
}

/// Builds a `PollReq` for `cert_req_id` (spec §4.4 "Polling submode").
pub fn build_poll_req(ctx: &mut Context, cert_req_id: CertReqId) -> Result<Message> {
    let header = init_header(ctx)?;
    finish(ctx, header, PkiBody::PollReq(cert_req_id))
}

/// Builds an ERROR body the client may send at any time (spec §4.4
/// "Error transaction").
pub fn build_error(ctx: &mut Context, status: PKIStatusInfo) -> Result<Message> {
    let header = init_header(ctx).map_err(|e| CmpError::ErrorCreatingError(e.to_string()))?;
    finish(
        ctx,
        header,
        PkiBody::Error(ErrorContent { status, error_code: None, error_details: Vec::new() }),
    )
}

/// Default PoP method placeholder for callers that never override it (the
/// engine only selects by this option, per spec §9 "Exact proof-of-possession
/// variants are delegated to the crypto seam").
pub fn default_popo_method() -> PopoMethod {
    PopoMethod::Signature
}
