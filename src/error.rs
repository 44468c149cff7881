//! Error taxonomy for the CMP engine (spec §7).
//!
//! Every fault carries a stable kind plus, where useful, layered free-text
//! context — higher layers append their own context with `.context(...)`
//! instead of discarding the original kind.

use thiserror::Error;

/// Result type alias for CMP engine operations.
pub type Result<T> = std::result::Result<T, CmpError>;

/// Stable, wire-neutral error kinds (spec §7).
#[derive(Error, Debug)]
pub enum CmpError {
    /// A required argument was absent.
    #[error("null argument: {0}")]
    NullArgument(String),

    /// An argument combination is invalid.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// Header's sender `GeneralName` was not a `DirectoryName`.
    #[error("sender GeneralName type not supported: {0}")]
    SenderGeneralNameTypeNotSupported(String),

    /// Response transactionID did not match the session's.
    #[error("transactionID unmatched")]
    TransactionIdUnmatched,

    /// Nonces did not bind request to response.
    #[error("nonces do not match")]
    NoncesDoNotMatch,

    /// Message protection failed cryptographic verification, or an
    /// unprotected message was rejected by the unprotected-exception rules.
    #[error("error validating protection: {0}")]
    ErrorValidatingProtection(String),

    /// The Transfer seam failed to return a response.
    #[error("failed to receive PKIMessage: {0}")]
    FailedToReceivePKIMessage(String),

    /// The Transfer seam failed to send a request.
    #[error("error transferring out: {0}")]
    ErrorTransferringOut(String),

    /// DER decode failure (includes the server's defensive round-trip).
    #[error("error decoding message: {0}")]
    ErrorDecodingMessage(String),

    /// A message body did not match any expected type for the transaction.
    #[error("unexpected PKI body: expected {expected}, got {actual}")]
    UnexpectedPKIBody {
        /// Name of the expected body type.
        expected: String,
        /// Name of the body type actually received.
        actual: String,
    },

    /// The peer returned an ERROR body.
    #[error("PKI body error: {0}")]
    PkiBodyError(String),

    /// A cert-response (IP/CP/KUP) had no CertResponse entries.
    #[error("cert response not found")]
    CertresponseNotFound,

    /// A body that should carry a PKIStatusInfo did not.
    #[error("PKIStatusInfo not found")]
    PKIStatusInfoNotFound,

    /// A body that should carry a CertId did not.
    #[error("CertID not found")]
    CertIDNotFound,

    /// certReqId in a response did not parse or was structurally malformed.
    #[error("bad request ID: {0}")]
    BadRequestID(String),

    /// certReqId in a response did not match the outstanding request.
    #[error("unexpected request ID: expected {expected}, got {actual}")]
    UnexpectedRequestID {
        /// certReqId the client expected to see echoed.
        expected: u32,
        /// certReqId actually echoed.
        actual: u32,
    },

    /// certConf's certHash did not match the server's recomputed hash.
    #[error("wrong cert hash")]
    WrongCertHash,

    /// Server-side revocation policy declined to process the request.
    #[error("request not accepted: {0}")]
    RequestNotAccepted(String),

    /// RP carried a PKIStatus the client's RR mapping does not expect.
    #[error("unexpected PKIStatus: {0}")]
    UnexpectedPKIStatus(String),

    /// RP carried a PKIStatus outside the closed enumeration.
    #[error("unknown PKIStatus: {0}")]
    UnknownPKIStatus(String),

    /// A PKIStatus integer code did not map to the closed enumeration.
    #[error("error parsing PKIStatus: {0}")]
    ErrorParsingPKIStatus(String),

    /// Failed to build an ERROR body.
    #[error("error creating error body: {0}")]
    ErrorCreatingError(String),

    /// Failed to build an IR.
    #[error("error creating IR: {0}")]
    ErrorCreatingIR(String),

    /// Failed to build a CR.
    #[error("error creating CR: {0}")]
    ErrorCreatingCR(String),

    /// Failed to build a KUR.
    #[error("error creating KUR: {0}")]
    ErrorCreatingKUR(String),

    /// Failed to build a P10CR.
    #[error("error creating P10CR: {0}")]
    ErrorCreatingP10CR(String),

    /// Failed to build an RR.
    #[error("error creating RR: {0}")]
    ErrorCreatingRR(String),

    /// Failed to build a GENM.
    #[error("error creating GENM: {0}")]
    ErrorCreatingGENM(String),

    /// Failed to build a certConf.
    #[error("error creating certConf: {0}")]
    ErrorCreatingCertConf(String),

    /// Failed to build a pollRep.
    #[error("error creating pollRep: {0}")]
    ErrorCreatingPollRep(String),

    /// Failed to build a PKIconf.
    #[error("error creating PKIconf: {0}")]
    ErrorCreatingPKIConf(String),

    /// Failed to build a cert response (IP/CP/KUP).
    #[error("error creating cert response: {0}")]
    ErrorCreatingCertRep(String),

    /// The polling budget (`totalTimeout`) would be or was exceeded.
    #[error("total timeout exceeded")]
    TotalTimeoutExceeded,

    /// The requested certificate could not be located for extraction.
    #[error("certificate not found")]
    CertificateNotFound,

    /// The certificate's encoding/type was not one the engine understands.
    #[error("unknown cert type: {0}")]
    UnknownCertType(String),

    /// ASN.1/DER codec failure outside the message round-trip path.
    #[error("ASN.1 error: {0}")]
    Asn1(String),

    /// I/O failure (config loading, transport plumbing).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extension trait implementing the layered "error data" pattern: append
/// free-text context to a fault without discarding its stable kind.
pub trait ErrorContext<T> {
    /// Appends `context` to the error message, preserving the error's kind.
    fn context(self, context: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| match e {
            CmpError::NullArgument(m) => CmpError::NullArgument(format!("{m}: {context}")),
            CmpError::InvalidArgs(m) => CmpError::InvalidArgs(format!("{m}: {context}")),
            CmpError::SenderGeneralNameTypeNotSupported(m) => {
                CmpError::SenderGeneralNameTypeNotSupported(format!("{m}: {context}"))
            }
            CmpError::ErrorValidatingProtection(m) => {
                CmpError::ErrorValidatingProtection(format!("{m}: {context}"))
            }
            CmpError::FailedToReceivePKIMessage(m) => {
                CmpError::FailedToReceivePKIMessage(format!("{m}: {context}"))
            }
            CmpError::ErrorTransferringOut(m) => {
                CmpError::ErrorTransferringOut(format!("{m}: {context}"))
            }
            CmpError::ErrorDecodingMessage(m) => {
                CmpError::ErrorDecodingMessage(format!("{m}: {context}"))
            }
            CmpError::PkiBodyError(m) => CmpError::PkiBodyError(format!("{m}: {context}")),
            CmpError::RequestNotAccepted(m) => {
                CmpError::RequestNotAccepted(format!("{m}: {context}"))
            }
            CmpError::UnexpectedPKIStatus(m) => {
                CmpError::UnexpectedPKIStatus(format!("{m}: {context}"))
            }
            CmpError::UnknownPKIStatus(m) => CmpError::UnknownPKIStatus(format!("{m}: {context}")),
            CmpError::ErrorParsingPKIStatus(m) => {
                CmpError::ErrorParsingPKIStatus(format!("{m}: {context}"))
            }
            CmpError::Asn1(m) => CmpError::Asn1(format!("{m}: {context}")),
            CmpError::UnknownCertType(m) => CmpError::UnknownCertType(format!("{m}: {context}")),
            other => other,
        })
    }
}
