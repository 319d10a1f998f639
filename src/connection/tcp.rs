use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::iso::{
    check_connection_confirm, connection_request, disconnect_request, wrap_data, CotpData,
    TpktHeader,
};
use super::options::ConnectionOptions;
use super::Exchange;
use crate::errors::{Error, Fault, IsoError, Result, TransportError};
use crate::s7_protocol::header::S7ProtocolHeader;
use crate::s7_protocol::negotiate::{decode_setup_response, encode_setup, SetupParams};

/// Fragments accepted for one response before giving up
const MAX_FRAGMENTS: usize = 64;

/// Lifecycle of a [`TransportSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection
    Disconnected,
    /// TCP connect and ISO handshake in progress
    Connecting,
    /// Setup communication in progress
    Negotiating,
    /// Ready for requests
    Ready,
    /// A transport, negotiation or framing error occurred; reconnect to recover
    Faulted,
}

/// Owns one TCP connection to a PLC.
///
/// Performs the ISO-on-TCP handshake and the setup communication, then
/// exchanges one S7 PDU at a time. Exclusive (`&mut`) access serialises
/// requests, the protocol has no pipelining.
#[derive(Debug)]
pub struct TransportSession {
    options: ConnectionOptions,
    stream: Option<TcpStream>,
    state: SessionState,
    fault: Option<Fault>,
    pdu_length: u16,
    max_parallel_jobs: u16,
    pdu_reference: u16,
}

impl TransportSession {
    /// A disconnected session for `options`
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            stream: None,
            state: SessionState::Disconnected,
            fault: None,
            pdu_length: 0,
            max_parallel_jobs: 0,
            pdu_reference: 0,
        }
    }

    /// Open the connection and negotiate the PDU length.
    ///
    /// An already open connection is dropped first, so this also recovers a
    /// faulted session.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on socket, timeout or ISO handshake failures,
    /// [`Error::Negotiation`] when the setup communication is rejected or malformed.
    /// The session is `Faulted` afterwards.
    pub async fn connect(&mut self) -> Result<()> {
        self.stream = None;
        self.fault = None;
        self.state = SessionState::Connecting;
        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let fault = e
                    .fault()
                    .unwrap_or_else(|| Fault::Negotiation(e.to_string()));
                self.mark_faulted(fault);
                Err(e)
            }
        }
    }

    async fn establish(&mut self) -> Result<()> {
        let address = self.options.socket_address();
        debug!(%address, family = ?self.options.family, "connecting");
        let mut stream = match timeout(self.options.connect_timeout, TcpStream::connect(&address))
            .await
        {
            Ok(stream) => stream?,
            Err(_) => return Err(TransportError::ConnectTimeout(address).into()),
        };
        stream.set_nodelay(true)?;

        let request = connection_request(self.options.local_tsap(), self.options.remote_tsap());
        let confirm = timeout(self.options.exchange_timeout, async {
            stream.write_all(&request).await?;
            read_packet(&mut stream).await
        })
        .await
        .map_err(|_| TransportError::DataExchangeTimedOut)??;
        check_connection_confirm(&confirm)?;
        self.stream = Some(stream);

        self.state = SessionState::Negotiating;
        let pdu_reference = self.next_pdu_reference();
        let request = encode_setup(pdu_reference, &SetupParams::proposal(self.options.pdu_length))?;
        let response = self.round_trip(request).await?;
        let params = decode_setup_response(&response)?;
        let mut body = response.as_ref();
        S7ProtocolHeader::decode(&mut body)?
            .is_current_pdu_response(pdu_reference)
            .map_err(|e| Error::Negotiation(e.to_string()))?;

        self.pdu_length = params.pdu_length;
        self.max_parallel_jobs = params.max_amq_callee;
        self.state = SessionState::Ready;
        debug!(
            proposed = self.options.pdu_length,
            negotiated = params.pdu_length,
            max_parallel_jobs = params.max_amq_callee,
            "session ready"
        );
        Ok(())
    }

    /// Send one S7 PDU and return the PDU answering it.
    ///
    /// # Errors
    ///
    /// Fails fast with the remembered error kind while the session is faulted,
    /// with [`TransportError::NotConnected`] before `connect`.
    pub async fn exchange(&mut self, request: BytesMut) -> Result<BytesMut> {
        self.check_ready()?;
        match self.round_trip(request).await {
            Ok(response) => Ok(response),
            Err(e) => Err(self.poison(e)),
        }
    }

    async fn round_trip(&mut self, request: BytesMut) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let frame = wrap_data(&request)?;
        trace!(bytes = request.len(), "sending PDU");

        let response = timeout(self.options.exchange_timeout, async {
            stream.write_all(&frame).await?;
            recv_data(stream).await
        })
        .await
        .map_err(|_| TransportError::DataExchangeTimedOut)??;

        trace!(bytes = response.len(), "received PDU");
        Ok(response)
    }

    fn check_ready(&self) -> Result<()> {
        match (self.state, &self.fault) {
            (SessionState::Ready, _) => Ok(()),
            (SessionState::Faulted, Some(fault)) => Err(fault.clone().into()),
            _ => Err(TransportError::NotConnected.into()),
        }
    }

    /// Negotiated PDU length, 0 before the session is ready
    pub fn pdu_budget(&self) -> u16 {
        self.pdu_length
    }

    /// Parallel jobs the PLC accepts
    pub fn max_parallel_jobs(&self) -> u16 {
        self.max_parallel_jobs
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Options the session was built with
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Last reference handed out
    pub fn pdu_reference(&self) -> u16 {
        self.pdu_reference
    }

    /// Advance the reference counter; wraps from 0xFFFF to 1, never yields 0
    pub fn next_pdu_reference(&mut self) -> u16 {
        self.pdu_reference = match self.pdu_reference.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        self.pdu_reference
    }

    /// Disconnect; sending the COTP disconnect request is best effort.
    ///
    /// Calling it on a closed session does nothing.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let request = disconnect_request();
            let _ = timeout(self.options.exchange_timeout, async {
                stream.write_all(&request).await?;
                stream.shutdown().await
            })
            .await;
            debug!(address = %self.options.socket_address(), "disconnected");
        }
        self.fault = None;
        self.state = SessionState::Disconnected;
    }

    fn mark_faulted(&mut self, fault: Fault) {
        warn!(?fault, "session faulted");
        self.stream = None;
        self.state = SessionState::Faulted;
        self.fault = Some(fault);
    }
}

#[async_trait]
impl Exchange for TransportSession {
    fn ensure_ready(&self) -> Result<()> {
        self.check_ready()
    }

    fn pdu_budget(&self) -> u16 {
        TransportSession::pdu_budget(self)
    }

    fn next_pdu_reference(&mut self) -> u16 {
        TransportSession::next_pdu_reference(self)
    }

    async fn exchange(&mut self, request: BytesMut) -> Result<BytesMut> {
        TransportSession::exchange(self, request).await
    }

    fn fault(&mut self, fault: Fault) {
        self.mark_faulted(fault);
    }
}

/// Read one TPKT packet, returning its payload
async fn read_packet(stream: &mut TcpStream) -> Result<BytesMut> {
    let mut raw = [0u8; TpktHeader::LEN];
    stream.read_exact(&mut raw).await?;
    let header = TpktHeader::decode(raw)?;
    let mut payload = BytesMut::zeroed(header.payload_len());
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Read COTP DT packets until the one flagged end of transmission
async fn recv_data(stream: &mut TcpStream) -> Result<BytesMut> {
    let mut data = BytesMut::new();
    for _ in 0..MAX_FRAGMENTS {
        let packet = read_packet(stream).await?;
        let mut payload = packet.as_ref();
        let cotp = CotpData::decode(&mut payload)?;
        data.put_slice(payload);
        if cotp.is_last() {
            return Ok(data);
        }
    }
    Err(IsoError::TooManyFragments.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::options::PlcFamily;

    fn session() -> TransportSession {
        TransportSession::new(ConnectionOptions::new("127.0.0.1", PlcFamily::S71200))
    }

    #[test]
    fn pdu_reference_wraps_to_one() {
        let mut session = session();
        assert_eq!(session.next_pdu_reference(), 1);
        assert_eq!(session.next_pdu_reference(), 2);
        session.pdu_reference = 0xFFFE;
        assert_eq!(session.next_pdu_reference(), 0xFFFF);
        assert_eq!(session.next_pdu_reference(), 1);
    }

    #[tokio::test]
    async fn exchange_before_connect_is_rejected() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::Disconnected);
        let result = session.exchange(BytesMut::from(&[0x32u8][..])).await;
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::NotConnected))
        ));
        // not connected is not remembered as a fault
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn faulted_session_replays_its_fault() {
        let mut session = session();
        session.state = SessionState::Ready;
        Exchange::fault(&mut session, Fault::Framing("item count mismatch".to_string()));
        assert_eq!(session.state(), SessionState::Faulted);
        for _ in 0..2 {
            let result = session.exchange(BytesMut::new()).await;
            assert!(matches!(result, Err(Error::Framing(msg)) if msg.contains("item count mismatch")));
        }
        session.close().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        session.close().await;
    }

    #[tokio::test]
    async fn refused_connection_faults_the_session() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut session = TransportSession::new(
            ConnectionOptions::new("127.0.0.1", PlcFamily::S7300).with_port(port),
        );
        let e = session.connect().await.unwrap_err();
        assert!(e.is_fatal());
        assert_eq!(session.state(), SessionState::Faulted);
    }
}
