//! Configuration module — centralized options for the CMP engine.
//!
//! Mirrors `cim-keys`'s `Config`: nested structs per concern, `Default`
//! impls documenting the shipped defaults, loadable from TOML.

use crate::certs::PopoMethod;
use crate::error::{CmpError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration, independent of any single `Context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmpConfig {
    /// Per-endpoint protocol options (spec §6 Options table).
    pub endpoint: EndpointOptions,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for CmpConfig {
    fn default() -> Self {
        Self { endpoint: EndpointOptions::default(), logging: LoggingConfig::default() }
    }
}

impl CmpConfig {
    /// Loads configuration from a TOML file, falling back to field-level
    /// defaults for anything the file omits.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| CmpError::InvalidArgs(format!("invalid config: {e}")))
    }
}

/// Logging configuration (ambient stack, spec §2 C11/out-of-scope sinks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string.
    pub filter: String,
    /// Emit JSON-formatted log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

/// Per-endpoint protocol options (spec §6 Options table, §3 Context
/// "Options" bullet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointOptions {
    /// Client advertises and accepts implicit cert confirmation.
    pub implicit_confirm: bool,
    /// Client skips certConf even when the peer did not grant implicit
    /// confirm.
    pub disable_confirm: bool,
    /// Outbound messages carry no protection.
    pub unprotected_send: bool,
    /// Accept unprotected ERROR/PKICONF/rejected-status responses.
    pub unprotected_errors: bool,
    /// Proof-of-possession variant for IR/CR/KUR.
    pub popo_method: PopoMethod,
    /// Session wall-clock bound in seconds; `0` disables the bound.
    pub total_timeout_secs: u64,
    /// Per-transfer bound in seconds, delegated to the Transfer seam.
    pub message_timeout_secs: u64,
    /// Relax verifier policy on signing-cert key usage.
    pub ignore_key_usage: bool,
    /// Permit trust anchors to be supplied via `extraCerts`.
    pub permit_ta_in_extra_certs: bool,
    /// Digest algorithm name used for certConf hashing (e.g. "sha256").
    pub digest_algorithm: String,
    /// Default certificate validity period in days, used by request
    /// builders that populate a CertTemplate validity field.
    pub validity_days: u32,
    /// Default revocation reason used by `build_rr` when the caller does
    /// not override it.
    pub default_revocation_reason: crate::types::RevocationReason,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            implicit_confirm: false,
            disable_confirm: false,
            unprotected_send: false,
            unprotected_errors: false,
            popo_method: PopoMethod::Signature,
            total_timeout_secs: 0,
            message_timeout_secs: 30,
            ignore_key_usage: false,
            permit_ta_in_extra_certs: false,
            digest_algorithm: "sha256".to_string(),
            validity_days: 365,
            default_revocation_reason: crate::types::RevocationReason::Unspecified,
        }
    }
}
