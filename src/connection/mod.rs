//! Transport: ISO-on-TCP framing and the session owning one PLC connection.

use async_trait::async_trait;
use bytes::BytesMut;

use crate::errors::{Error, Fault, Result};

pub(crate) mod iso;
pub mod options;
pub mod tcp;

pub use options::{ConnectionOptions, ConnectionType, FamilyProfile, PlcFamily};
pub use tcp::{SessionState, TransportSession};

/// One request/response round trip with a PLC, one at a time
#[async_trait]
pub(crate) trait Exchange: Send {
    /// Fails with the session's error when no request can be sent
    fn ensure_ready(&self) -> Result<()>;

    /// Negotiated PDU length
    fn pdu_budget(&self) -> u16;

    /// Reference for the next request
    fn next_pdu_reference(&mut self) -> u16;

    /// Send one S7 PDU and return the S7 PDU answering it
    async fn exchange(&mut self, request: BytesMut) -> Result<BytesMut>;

    /// Mark the session unusable until it is reconnected
    fn fault(&mut self, fault: Fault);

    /// Record `e` as the session's fault when it is fatal, then hand it back
    fn poison(&mut self, e: Error) -> Error {
        if let Some(fault) = e.fault() {
            self.fault(fault);
        }
        e
    }
}
