//! # cmp-engine — Certificate Management Protocol client and responder
//!
//! Implements the subset of RFC 4210 (CMP) and RFC 4211 (CRMF) needed to run
//! one transaction at a time — IR, CR, KUR, P10CR, RR, certConf, and GENM —
//! over a pluggable transport, plus an in-process mock responder for
//! offline testing against the same state machine a real CA would drive.
//!
//! ## Architecture
//!
//! - [`types`], [`status`], [`header`], [`message`]: the wire-level model —
//!   identifiers, status/failure reporting, the PKIHeader, and the tagged
//!   `PkiBody` union.
//! - [`certs`]: the crypto seam (`CertProtector`) and opaque certificate/CSR
//!   wrappers. Real signing/verification is an external collaborator; this
//!   module only defines the boundary and a deterministic mock for tests.
//! - [`asn1`]: a deterministic length-prefixed codec standing in for a DER
//!   grammar — the seam a real implementation would back with `der`/`rasn`.
//! - [`context`]: `Context` (client session state) and `ServerContext` (mock
//!   responder state).
//! - [`verify`]: inbound message validation shared by the client engine.
//! - [`builders`]: pure functions turning a context plus parameters into a
//!   protected [`message::Message`].
//! - [`client`]: the session engine driving one transaction to completion,
//!   including the polling submode and certificate confirmation.
//! - [`server`]: the state-free-per-request responder engine.
//! - [`transfer`]: the transport seam, plus an in-process adapter connecting
//!   client and server directly for tests.
//! - [`config`]: TOML-loadable engine configuration.
//! - [`error`]: the engine's error taxonomy.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod asn1;
pub mod builders;
pub mod certs;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod header;
pub mod message;
pub mod server;
pub mod status;
pub mod transfer;
pub mod types;
pub mod verify;

pub use error::{CmpError, Result};

/// Convenience re-exports for constructing and driving a session.
pub mod prelude {
    pub use crate::builders::request::CertRequestParams;
    pub use crate::certs::{CertProtector, Certificate, Csr, MockProtector, PopoMethod};
    pub use crate::client::{
        exchange_cert_conf, exchange_error, exec_cr, exec_genm, exec_ir, exec_kur, exec_p10cr, exec_rr,
        RevocationOutcome, SessionState,
    };
    pub use crate::config::{CmpConfig, EndpointOptions, LoggingConfig};
    pub use crate::context::{Context, FaultInjection, ServerContext};
    pub use crate::error::{CmpError, ErrorContext, Result};
    pub use crate::server::ServerEngine;
    pub use crate::status::{render, FailureBit, PKIFailureInfo, PKIStatus, PKIStatusInfo};
    pub use crate::transfer::{InProcessTransfer, NullTransfer, Transfer};
    pub use crate::types::{
        CertReqId, GeneralName, Itav, Nonce, Oid, ReferenceValue, RevocationReason, SecretValue,
        TransactionId,
    };
}
