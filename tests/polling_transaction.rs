//! Black-box coverage of the polling submode (spec §4.4's `waiting` path),
//! the total-timeout budget that truncates it, and the per-message nonce
//! freshness invariant (spec §4.3, §8) the polling loop must uphold across
//! several outbound messages in one session.

mod common;

use async_trait::async_trait;
use cmp_engine::message::{Message, PkiBody};
use cmp_engine::prelude::*;
use common::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Wraps `InProcessTransfer`, counting PollReq requests that were answered
/// with a PollRep (as opposed to a terminal cert response), so tests can
/// pin the exact number of PollReq/PollRep pairs spec §8's scenarios
/// describe instead of only checking the eventual outcome.
struct PairCountingTransfer {
    inner: InProcessTransfer,
    poll_pairs: AtomicU32,
}

impl PairCountingTransfer {
    fn new(server: Arc<ServerEngine>) -> Self {
        Self { inner: InProcessTransfer::new(server), poll_pairs: AtomicU32::new(0) }
    }

    fn poll_pairs(&self) -> u32 {
        self.poll_pairs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transfer for PairCountingTransfer {
    async fn send(&self, request: &Message) -> cmp_engine::Result<Message> {
        let response = self.inner.send(request).await?;
        if matches!(request.body, PkiBody::PollReq(_)) && matches!(response.body, PkiBody::PollRep(_)) {
            self.poll_pairs.fetch_add(1, Ordering::SeqCst);
        }
        Ok(response)
    }
}

/// Wraps `InProcessTransfer`, recording every outbound message's
/// senderNonce in send order, so a test can assert freshness across the
/// several distinct messages one session sends (spec §4.3, §8 "Nonce
/// freshness").
struct NonceRecordingTransfer {
    inner: InProcessTransfer,
    sent_nonces: Mutex<Vec<Nonce>>,
}

impl NonceRecordingTransfer {
    fn new(server: Arc<ServerEngine>) -> Self {
        Self { inner: InProcessTransfer::new(server), sent_nonces: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Transfer for NonceRecordingTransfer {
    async fn send(&self, request: &Message) -> cmp_engine::Result<Message> {
        self.sent_nonces.lock().unwrap().push(request.header.sender_nonce);
        self.inner.send(request).await
    }
}

fn context_with_transfer(transfer: Arc<dyn Transfer>, options: EndpointOptions) -> Context {
    Context::new(
        client_identity(),
        server_identity(),
        Arc::new(MockProtector::new(SHARED_SECRET.to_vec())),
        transfer,
        options,
    )
}

#[tokio::test]
async fn ir_resolves_after_several_poll_rounds() {
    let mut sc = bare_server_context();
    sc.cert_out = Some(Certificate::from_der(vec![0x10, 0x20]));
    sc.poll_count = 3;
    sc.check_after_secs = 0;
    let server = Arc::new(ServerEngine::new(sc));

    let mut ctx = client_context(server, EndpointOptions::default());
    exec_ir(&mut ctx, &cert_request_params()).await.expect("IR should eventually resolve");

    assert_eq!(ctx.new_cert().unwrap().der(), &[0x10, 0x20]);
}

/// spec §8 scenario 2, literal vector: `pollCount=2, checkAfterTime=1`.
/// Expected: exactly two PollReq/PollRep pairs precede the final IP, and
/// total session wall-time is approximately 2 s.
#[tokio::test]
async fn scenario_2_two_poll_rounds_precede_the_final_ip_in_about_two_seconds() {
    let mut sc = bare_server_context();
    sc.cert_out = Some(Certificate::from_der(vec![0x22, 0x22]));
    sc.poll_count = 2;
    sc.check_after_secs = 1;
    let server = Arc::new(ServerEngine::new(sc));

    let transfer = Arc::new(PairCountingTransfer::new(server));
    let mut ctx = context_with_transfer(transfer.clone(), EndpointOptions::default());

    let started = Instant::now();
    exec_ir(&mut ctx, &cert_request_params()).await.expect("IR should resolve after polling");
    let elapsed = started.elapsed();

    assert_eq!(ctx.new_cert().unwrap().der(), &[0x22, 0x22]);
    assert_eq!(transfer.poll_pairs(), 2, "pollCount=2 must yield exactly two PollReq/PollRep pairs");
    assert!(elapsed >= Duration::from_millis(1900), "two 1s polls should take roughly 2s, took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "polling took implausibly long: {elapsed:?}");
}

/// spec §8 scenario 3, literal vector: `pollCount=4, checkAfterTime=1,
/// totalTimeout=3`. Expected: the session ends with `TotalTimeoutExceeded`
/// and `newCert` is absent — three full 1s polling rounds exhaust the
/// 3-second budget, and the one final poll the budget still allows comes
/// back `waiting` rather than with a certificate.
#[tokio::test]
async fn scenario_3_polling_budget_of_three_seconds_is_exceeded_by_four_rounds() {
    let mut sc = bare_server_context();
    sc.cert_out = Some(Certificate::from_der(vec![0x33]));
    sc.poll_count = 4;
    sc.check_after_secs = 1;
    let server = Arc::new(ServerEngine::new(sc));

    let mut ctx = client_context(
        server,
        EndpointOptions { total_timeout_secs: 3, ..EndpointOptions::default() },
    );
    let result = exec_ir(&mut ctx, &cert_request_params()).await;

    assert!(matches!(result, Err(CmpError::TotalTimeoutExceeded)));
    assert!(ctx.new_cert().is_none(), "a timed-out session must not retain a partial certificate");
}

#[tokio::test]
async fn total_timeout_truncates_polling_and_reports_exceeded() {
    let mut sc = bare_server_context();
    sc.cert_out = Some(Certificate::from_der(vec![0x30]));
    sc.poll_count = 10;
    sc.check_after_secs = 1;
    let server = Arc::new(ServerEngine::new(sc));

    let mut ctx = client_context(
        server,
        EndpointOptions { total_timeout_secs: 1, ..EndpointOptions::default() },
    );
    let result = exec_ir(&mut ctx, &cert_request_params()).await;

    assert!(matches!(result, Err(CmpError::TotalTimeoutExceeded)));
    assert!(ctx.new_cert().is_none(), "a timed-out session must not retain a partial certificate");
}

#[tokio::test]
async fn kur_also_follows_the_polling_submode() {
    let mut sc = bare_server_context();
    sc.cert_out = Some(real_certificate("renewed-subject"));
    sc.poll_count = 1;
    sc.check_after_secs = 0;
    let server = Arc::new(ServerEngine::new(sc));

    let mut ctx = client_context(server, EndpointOptions::default());
    ctx.set_old_cert(real_certificate("original-subject"));
    exec_kur(&mut ctx, &cert_request_params()).await.expect("KUR should resolve after polling");

    assert!(ctx.new_cert().is_some());
}

/// spec §4.3 ("senderNonce: 16 random bytes regenerated for every outbound
/// message") and §8's universal "Nonce freshness" invariant: every message
/// this session sends — the IR and its certConf — must carry a distinct
/// senderNonce, not a value reused from an earlier message.
#[tokio::test]
async fn sender_nonce_is_regenerated_for_every_outbound_message_in_a_session() {
    let mut sc = bare_server_context();
    sc.cert_out = Some(Certificate::from_der(vec![0x55]));
    let server = Arc::new(ServerEngine::new(sc));

    let transfer = Arc::new(NonceRecordingTransfer::new(server));
    let mut ctx = context_with_transfer(transfer.clone(), EndpointOptions::default());

    exec_ir(&mut ctx, &cert_request_params()).await.expect("IR should succeed and send certConf");

    let nonces = transfer.sent_nonces.lock().unwrap();
    assert_eq!(nonces.len(), 2, "the IR and its certConf should both have been sent");
    assert_ne!(nonces[0], nonces[1], "senderNonce must not be reused across distinct outbound messages");
}
