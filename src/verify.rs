//! Inbound message verification (spec §4.2 `validate_received`).

use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::message::{Message, PkiBody};
use crate::status::PKIStatus;

/// Runs the six checks spec §4.2 requires of every inbound message before a
/// session engine may act on it:
///
/// 1. the header's `sender` is a `DirectoryName` (the only form this engine
///    verifies against),
/// 2. `transactionID` matches the session's,
/// 3. `protection`, if present, verifies against `protected_bytes` via the
///    configured `CertProtector`,
/// 4. an absent `protection` is accepted only under the unprotected-
///    exception rules (`unprotected_errors` plus an ERROR/PKICONF body or a
///    rejection status),
/// 5. `recipNonce`, if the session has sent a prior message, echoes that
///    message's `senderNonce`,
/// 6. on success, `ctx`'s recipNonce-to-echo is updated to this message's
///    `senderNonce` for the next outbound header.
pub fn validate_received(ctx: &mut Context, msg: &Message) -> Result<()> {
    if !msg.header.sender.is_directory_name() {
        return Err(CmpError::SenderGeneralNameTypeNotSupported(
            msg.header.sender.kind_name().to_string(),
        ));
    }

    let expected_txn = ctx.transaction_id().ok_or(CmpError::TransactionIdUnmatched)?;
    if msg.header.transaction_id != expected_txn {
        return Err(CmpError::TransactionIdUnmatched);
    }

    match &msg.protection {
        Some(protection) => {
            ctx.protector().verify(&msg.protected_bytes(), protection)?;
        }
        None if is_unprotected_exception(ctx, msg) => {}
        None => {
            return Err(CmpError::ErrorValidatingProtection(
                "unprotected message rejected: no matching exception".to_string(),
            ));
        }
    }

    if let Some(expected_sender_nonce) = ctx.last_sent_sender_nonce() {
        match msg.header.recip_nonce {
            Some(recip_nonce) if recip_nonce == expected_sender_nonce => {}
            _ => return Err(CmpError::NoncesDoNotMatch),
        }
    }

    // The pending senderNonce has now been echoed back and verified; clear
    // it so the next `init_header` call mints a fresh one instead of
    // reusing it (spec §4.3, §8 "Nonce freshness").
    ctx.clear_last_sent_sender_nonce();
    ctx.set_recip_nonce(msg.header.sender_nonce);
    Ok(())
}

/// spec §4.2 step 4: an unprotected message is only ever accepted when the
/// session opted into it via `unprotected_errors`, and only for bodies that
/// are themselves fault reports — a real ERROR/PKICONF, or a cert response
/// whose status is a rejection.
fn is_unprotected_exception(ctx: &Context, msg: &Message) -> bool {
    if !ctx.options().unprotected_errors {
        return false;
    }
    match &msg.body {
        PkiBody::Error(_) | PkiBody::PkiConf => true,
        PkiBody::Ip(rep) | PkiBody::Cp(rep) | PkiBody::Kup(rep) => {
            rep.responses.iter().any(|r| r.status.status() == PKIStatus::Rejection)
        }
        PkiBody::Rp(entries) => entries.iter().any(|e| e.status.status() == PKIStatus::Rejection),
        _ => false,
    }
}
