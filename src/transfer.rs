//! Transfer seam (spec §2 C10, §6): the single abstract operation carrying a
//! request `Message` to a peer and back. The real HTTP transport (DER over
//! POST, `application/pkixcmp`) is an external collaborator per spec §1; this
//! module defines the seam and an in-process adapter connecting a
//! `ClientSession` directly to a `ServerEngine` for offline tests.

use crate::error::{CmpError, Result};
use crate::message::Message;
use crate::server::ServerEngine;
use async_trait::async_trait;
use std::sync::Arc;

/// `transfer(request) -> response | TransferError` (spec §6). Implementors
/// own whatever I/O is required; the engines never block on anything else.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Sends `request` and returns the peer's response, or a transfer-layer
    /// failure (network error, non-2xx status, malformed body before even
    /// reaching the CMP decoder).
    async fn send(&self, request: &Message) -> Result<Message>;
}

/// Connects a client session directly to a `ServerEngine` in the same
/// process, DER-round-tripping the message both ways exactly as a real
/// transport would, so the engines cannot depend on shared Rust state.
pub struct InProcessTransfer {
    server: Arc<ServerEngine>,
}

impl InProcessTransfer {
    /// Wraps `server` as a Transfer target.
    pub fn new(server: Arc<ServerEngine>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Transfer for InProcessTransfer {
    async fn send(&self, request: &Message) -> Result<Message> {
        let wire = request
            .encode()
            .map_err(|e| CmpError::ErrorTransferringOut(e.to_string()))?;
        let decoded = Message::decode(&wire)
            .map_err(|e| CmpError::FailedToReceivePKIMessage(e.to_string()))?;
        let response = self.server.handle(&decoded).await?;
        let response_wire = response
            .encode()
            .map_err(|e| CmpError::ErrorTransferringOut(e.to_string()))?;
        Message::decode(&response_wire).map_err(|e| CmpError::FailedToReceivePKIMessage(e.to_string()))
    }
}

/// A `Transfer` that always fails, used only to satisfy `Context`'s
/// constructor in tests that never actually exercise the transport.
pub struct NullTransfer;

#[async_trait]
impl Transfer for NullTransfer {
    async fn send(&self, _request: &Message) -> Result<Message> {
        Err(CmpError::ErrorTransferringOut("NullTransfer never sends".to_string()))
    }
}
