//! `Context` (client-side session state) and `ServerContext` (mock
//! responder state) — spec §3 Context / §3 Server-side analogues.

use crate::certs::{CertProtector, Certificate};
use crate::config::EndpointOptions;
use crate::message::Message;
use crate::status::PKIStatusInfo;
use crate::transfer::Transfer;
use crate::types::{GeneralName, Nonce, ReferenceValue, SecretValue, TransactionId};
use crate::error::{CmpError, Result};
use std::sync::Arc;

/// Long-lived client-side session state (spec §3 Context): identity,
/// negotiated options, the crypto and transfer seams, and the per-
/// transaction state a `ClientSession` mutates as it runs.
pub struct Context {
    identity: GeneralName,
    server_identity: GeneralName,
    options: EndpointOptions,
    protector: Arc<dyn CertProtector>,
    transfer: Arc<dyn Transfer>,
    reference_value: Option<ReferenceValue>,
    secret_value: Option<SecretValue>,

    transaction_id: Option<TransactionId>,
    last_sent_sender_nonce: Option<Nonce>,
    recip_nonce: Option<Nonce>,

    old_cert: Option<Certificate>,

    new_cert: Option<Certificate>,
    ca_pubs: Vec<Certificate>,
    extra_certs_in: Vec<Certificate>,
    new_pkey: Option<Vec<u8>>,
    last_status: Option<PKIStatusInfo>,
    cert_conf_sent: bool,
}

impl Context {
    /// Builds a fresh context bound to one client identity, one server
    /// identity, and the seams needed to run a transaction.
    pub fn new(
        identity: GeneralName,
        server_identity: GeneralName,
        protector: Arc<dyn CertProtector>,
        transfer: Arc<dyn Transfer>,
        options: EndpointOptions,
    ) -> Self {
        Self {
            identity,
            server_identity,
            options,
            protector,
            transfer,
            reference_value: None,
            secret_value: None,
            transaction_id: None,
            last_sent_sender_nonce: None,
            recip_nonce: None,
            old_cert: None,
            new_cert: None,
            ca_pubs: Vec::new(),
            extra_certs_in: Vec::new(),
            new_pkey: None,
            last_status: None,
            cert_conf_sent: false,
        }
    }

    /// Attaches the certificate a KUR/RR transaction targets (spec §3
    /// "Request template: oldCert (for KUR/RR)").
    pub fn with_old_cert(mut self, cert: Certificate) -> Self {
        self.old_cert = Some(cert);
        self
    }

    /// Attaches a reference value / secret value pair for the MAC-protected
    /// path used before the client holds a certificate.
    pub fn with_reference(mut self, reference: ReferenceValue, secret: SecretValue) -> Self {
        self.reference_value = Some(reference);
        self.secret_value = Some(secret);
        self
    }

    /// The configured endpoint options.
    pub fn options(&self) -> &EndpointOptions {
        &self.options
    }

    /// The crypto seam used to protect/verify messages.
    pub fn protector(&self) -> &Arc<dyn CertProtector> {
        &self.protector
    }

    /// The transfer seam used to send requests.
    pub fn transfer(&self) -> &Arc<dyn Transfer> {
        &self.transfer
    }

    /// Reference value, if this session authenticates via a shared secret.
    pub fn reference_value(&self) -> Option<&ReferenceValue> {
        self.reference_value.as_ref()
    }

    /// Secret value paired with `reference_value`.
    pub fn secret_value(&self) -> Option<&SecretValue> {
        self.secret_value.as_ref()
    }

    /// The sender identity, validated as a `DirectoryName` (spec §4.1/§4.2 —
    /// header verification only supports `DirectoryName` senders).
    pub fn sender_name(&self) -> Result<GeneralName> {
        if self.identity.is_directory_name() {
            Ok(self.identity.clone())
        } else {
            Err(CmpError::SenderGeneralNameTypeNotSupported(
                self.identity.kind_name().to_string(),
            ))
        }
    }

    /// The configured recipient (server) identity.
    pub fn recipient_name(&self) -> GeneralName {
        self.server_identity.clone()
    }

    /// The session's transactionID, if one has been assigned.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    /// Assigns the session's transactionID (spec §4.1 `init_header`).
    pub fn set_transaction_id(&mut self, id: TransactionId) {
        self.transaction_id = Some(id);
    }

    /// The senderNonce of the last outbound message still awaiting a
    /// matching response, consulted by `validate_received`'s recipNonce
    /// check (spec §4.2 step 5). Cleared once that response is validated so
    /// the next `init_header` call is forced to mint a fresh one (spec
    /// §4.3: a senderNonce is regenerated for every outbound message).
    pub fn last_sent_sender_nonce(&self) -> Option<Nonce> {
        self.last_sent_sender_nonce
    }

    /// Records the senderNonce of the message just built.
    pub fn set_last_sent_sender_nonce(&mut self, nonce: Nonce) {
        self.last_sent_sender_nonce = Some(nonce);
    }

    /// Clears the pending senderNonce after its response has been
    /// validated, so `init_header` regenerates one for the next outbound
    /// message instead of reusing it (spec §4.3, §8 "Nonce freshness").
    pub fn clear_last_sent_sender_nonce(&mut self) {
        self.last_sent_sender_nonce = None;
    }

    /// The recipNonce to echo on the next outbound header: the peer's last
    /// senderNonce, once `validate_received` has accepted a response.
    pub fn recip_nonce(&self) -> Option<Nonce> {
        self.recip_nonce
    }

    /// Updates the recipNonce after a response passes verification (spec
    /// §4.2 step 6).
    pub fn set_recip_nonce(&mut self, nonce: Nonce) {
        self.recip_nonce = Some(nonce);
    }

    /// The certificate a KUR/RR transaction targets, set by the caller
    /// before the session starts (spec §3 Context "Request template").
    pub fn old_cert(&self) -> Option<&Certificate> {
        self.old_cert.as_ref()
    }

    /// Assigns the certificate a KUR/RR transaction targets.
    pub fn set_old_cert(&mut self, cert: Certificate) {
        self.old_cert = Some(cert);
    }

    /// True once `exchange_certConf` has sent a confirmation this session
    /// (spec §5 idempotence: certConf is sent at most once per session).
    pub fn cert_conf_sent(&self) -> bool {
        self.cert_conf_sent
    }

    /// Marks that a certConf has been sent for this session.
    pub fn set_cert_conf_sent(&mut self, sent: bool) {
        self.cert_conf_sent = sent;
    }

    /// The issued certificate extracted from the last successful response.
    pub fn new_cert(&self) -> Option<&Certificate> {
        self.new_cert.as_ref()
    }

    /// Records the issued certificate.
    pub fn set_new_cert(&mut self, cert: Certificate) {
        self.new_cert = Some(cert);
    }

    /// CA certificates returned alongside the last response.
    pub fn ca_pubs(&self) -> &[Certificate] {
        &self.ca_pubs
    }

    /// Records CA certificates from a response.
    pub fn set_ca_pubs(&mut self, certs: Vec<Certificate>) {
        self.ca_pubs = certs;
    }

    /// `extraCerts` carried by the last received message.
    pub fn extra_certs_in(&self) -> &[Certificate] {
        &self.extra_certs_in
    }

    /// Records `extraCerts` from a response.
    pub fn set_extra_certs_in(&mut self, certs: Vec<Certificate>) {
        self.extra_certs_in = certs;
    }

    /// The private key recovered from an indirect-POP cert response, if any.
    pub fn new_pkey(&self) -> Option<&[u8]> {
        self.new_pkey.as_deref()
    }

    /// Records a recovered private key.
    pub fn set_new_pkey(&mut self, key: Vec<u8>) {
        self.new_pkey = Some(key);
    }

    /// The last `PKIStatusInfo` the session observed.
    pub fn last_status(&self) -> Option<&PKIStatusInfo> {
        self.last_status.as_ref()
    }

    /// Records the latest `PKIStatusInfo`.
    pub fn set_last_status(&mut self, status: PKIStatusInfo) {
        self.last_status = Some(status);
    }

    /// Clears all per-transaction state so the context can start a new
    /// transaction (spec §5: terminal states retain neither nonces nor
    /// transactionID). Identity, options, and seams are untouched.
    pub fn reset_session(&mut self) {
        self.transaction_id = None;
        self.last_sent_sender_nonce = None;
        self.recip_nonce = None;
        self.new_cert = None;
        self.ca_pubs.clear();
        self.extra_certs_in.clear();
        self.new_pkey = None;
        self.last_status = None;
        self.cert_conf_sent = false;
    }
}

/// Fault-injection knobs for `ServerContext` (spec §3 "mock responder"
/// scope): each toggle reproduces one class of misbehavior a conformance
/// suite exercises a client against.
#[derive(Debug, Clone, Default)]
pub struct FaultInjection {
    /// Respond to every request with an ERROR body instead of processing it.
    pub send_error: bool,
    /// Accept and process unprotected requests instead of rejecting them.
    pub accept_unprotected: bool,
    /// Send responses without a `protection` value.
    pub respond_unprotected: bool,
    /// Grant implicit confirmation even when the client did not request it.
    pub grant_implicit_confirm: bool,
    /// Echo a recipNonce that does not match the request's senderNonce.
    pub corrupt_recip_nonce: bool,
    /// Echo a different transactionID than the request carried.
    pub corrupt_transaction_id: bool,
}

/// Server-side state for the in-process mock responder (spec §3, §4.5):
/// the material it hands back, the faults it injects, and the pieces of
/// the outstanding request it must echo across a polling sequence.
pub struct ServerContext {
    /// The responder's own identity, used as the `sender` of every response
    /// (spec §4.5 "build response message with mirrored transactionID").
    pub identity: GeneralName,
    /// Certificate issued for the next accepted cert request.
    pub cert_out: Option<Certificate>,
    /// CA certificates to attach to cert responses.
    pub chain_out: Vec<Certificate>,
    /// Status to report instead of `PKIStatusInfo::accepted()`.
    pub pki_status_out: Option<PKIStatusInfo>,
    /// Fault-injection toggles.
    pub faults: FaultInjection,
    /// Remaining simulated polling rounds before the server issues a final
    /// response (spec §4.5 "simulated polling").
    pub poll_count: u32,
    /// Seconds to tell the client to wait between polls.
    pub check_after_secs: u64,
    /// The request currently being polled for, retained across pollReq
    /// round-trips.
    pub pending_request: Option<Message>,
    /// The certReqId of the last processed cert request, retained so
    /// `process_certConf` can check the client echoed the right one (spec §3
    /// ServerContext "retained certReqId").
    pub retained_cert_req_id: Option<crate::types::CertReqId>,
    /// The crypto seam the server uses to protect/verify messages.
    pub protector: Arc<dyn CertProtector>,
}

impl ServerContext {
    /// Builds a server context that accepts every request outright (no
    /// polling, no faults) using `protector` to protect/verify messages.
    pub fn new(identity: GeneralName, protector: Arc<dyn CertProtector>) -> Self {
        Self {
            identity,
            cert_out: None,
            chain_out: Vec::new(),
            pki_status_out: None,
            faults: FaultInjection::default(),
            poll_count: 0,
            check_after_secs: 1,
            pending_request: None,
            retained_cert_req_id: None,
            protector,
        }
    }

    /// True while the server still wants the client to poll before it will
    /// answer definitively.
    pub fn is_polling(&self) -> bool {
        self.poll_count > 0
    }

    /// Consumes one simulated polling round.
    pub fn tick_poll(&mut self) {
        if self.poll_count > 0 {
            self.poll_count -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::MockProtector;
    use crate::transfer::InProcessTransfer;

    fn dummy_context() -> Context {
        // InProcessTransfer needs a ServerEngine; session-reset tests don't
        // exercise the transfer seam, so an unused server is fine here.
        Context::new(
            GeneralName::DirectoryName("CN=client".into()),
            GeneralName::DirectoryName("CN=server".into()),
            Arc::new(MockProtector::new(b"k".to_vec())),
            Arc::new(crate::transfer::NullTransfer),
            EndpointOptions::default(),
        )
    }

    #[test]
    fn reset_session_clears_transaction_state_but_not_identity() {
        let mut ctx = dummy_context();
        ctx.set_transaction_id(TransactionId::generate());
        ctx.set_last_sent_sender_nonce(Nonce::generate());
        ctx.set_recip_nonce(Nonce::generate());
        ctx.set_new_cert(Certificate::from_der(vec![1, 2, 3]));

        ctx.reset_session();

        assert!(ctx.transaction_id().is_none());
        assert!(ctx.last_sent_sender_nonce().is_none());
        assert!(ctx.recip_nonce().is_none());
        assert!(ctx.new_cert().is_none());
        assert!(ctx.sender_name().is_ok());
    }

    #[test]
    fn non_directory_sender_is_rejected() {
        let mut ctx = dummy_context();
        ctx.identity = GeneralName::Rfc822Name("a@b.com".into());
        assert!(matches!(
            ctx.sender_name(),
            Err(CmpError::SenderGeneralNameTypeNotSupported(_))
        ));
    }

    #[test]
    fn server_context_counts_down_polling() {
        let mut sc = ServerContext::new(
            GeneralName::DirectoryName("CN=server".into()),
            Arc::new(MockProtector::new(b"k".to_vec())),
        );
        sc.poll_count = 2;
        assert!(sc.is_polling());
        sc.tick_poll();
        sc.tick_poll();
        assert!(!sc.is_polling());
    }
}
