//! Shared fixtures for the CMP engine's black-box integration tests: a
//! client `Context` wired to an in-process `ServerEngine` over a shared
//! `MockProtector`, so every test exercises the real wire codec (encode,
//! decode, protect, verify) without a network.

use cmp_engine::prelude::*;
use std::sync::Arc;

pub const SHARED_SECRET: &[u8] = b"integration-shared-secret";

pub fn server_identity() -> GeneralName {
    GeneralName::DirectoryName("CN=test-ca".into())
}

pub fn client_identity() -> GeneralName {
    GeneralName::DirectoryName("CN=test-client".into())
}

/// A `ServerContext` that accepts outright: no polling, no faults, no cert
/// to hand back yet (callers set `cert_out` before wrapping it in a
/// `ServerEngine`).
pub fn bare_server_context() -> ServerContext {
    ServerContext::new(server_identity(), Arc::new(MockProtector::new(SHARED_SECRET.to_vec())))
}

pub fn server_issuing(cert_der: Vec<u8>) -> Arc<ServerEngine> {
    let mut sc = bare_server_context();
    sc.cert_out = Some(Certificate::from_der(cert_der));
    Arc::new(ServerEngine::new(sc))
}

pub fn client_context(server: Arc<ServerEngine>, options: EndpointOptions) -> Context {
    Context::new(
        client_identity(),
        server_identity(),
        Arc::new(MockProtector::new(SHARED_SECRET.to_vec())),
        Arc::new(InProcessTransfer::new(server)),
        options,
    )
}

/// Builds a real self-signed certificate DER, the same way
/// `cmp_engine`'s own internal test fixture does, for integration tests
/// that need `issuer_and_serial`/`subject` to actually parse (KUR/RR
/// targeting). `rcgen` is a regular dependency of `cmp_engine`, not just a
/// dev-dependency, so it is reachable from this external test crate too.
pub fn real_certificate(subject_cn: &str) -> Certificate {
    use rcgen::{generate_simple_self_signed, CertifiedKey};
    let CertifiedKey { cert, .. } =
        generate_simple_self_signed(vec![subject_cn.to_string()]).expect("self-signed cert generation");
    Certificate::from_der(cert.der().to_vec())
}

pub fn cert_request_params() -> CertRequestParams {
    CertRequestParams {
        subject: "CN=integration-subject".into(),
        sans: vec!["subject@example.com".into()],
        public_key: vec![9, 9, 9, 9],
        popo_value: Some(vec![1, 0, 1]),
    }
}
