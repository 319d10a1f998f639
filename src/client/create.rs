use crate::connection::{
    options::{ConnectionOptions, FamilyProfile},
    tcp::{SessionState, TransportSession},
};
use crate::convert::Endian;
use crate::errors::Result;

/// Standalone S7 connection
#[derive(Debug)]
pub struct S7Client {
    pub(crate) session: TransportSession,
    profile: FamilyProfile,
}

impl S7Client {
    /// Create new standalone connection to an S7 PLC
    ///```rust, no_run
    /// # tokio_test::block_on(async {
    /// use s7link::{ConnectionOptions, PlcFamily, S7Client};
    ///
    /// // create single s7 client
    /// let options = ConnectionOptions::new("192.168.10.72", PlcFamily::S71200);
    /// let mut client = S7Client::new(options).await?;
    /// # Ok::<(), s7link::errors::Error>(())
    /// # });
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if no connection could be established to the PLC.
    pub async fn new(options: ConnectionOptions) -> Result<Self> {
        let mut client = Self::with_options(options);
        client.connect().await?;
        Ok(client)
    }

    /// Client that connects on the first call to [`S7Client::connect`]
    pub fn with_options(options: ConnectionOptions) -> Self {
        let profile = options.profile();
        Self {
            session: TransportSession::new(options),
            profile,
        }
    }

    /// Connect, or reconnect after the session faulted
    ///
    /// # Errors
    ///
    /// Will return `Error` if no connection could be established to the PLC.
    pub async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    /// Gracefully disconnect from the PLC; does nothing when already closed
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    /// State of the underlying session
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Negotiated PDU length
    pub fn pdu_length(&self) -> u16 {
        self.session.pdu_budget()
    }

    /// Parallel jobs the PLC accepts
    pub fn max_parallel_jobs(&self) -> u16 {
        self.session.max_parallel_jobs()
    }

    /// Options the client was built with
    pub fn options(&self) -> &ConnectionOptions {
        self.session.options()
    }

    /// Capability record of the PLC family
    pub fn profile(&self) -> &FamilyProfile {
        &self.profile
    }

    pub(crate) fn endian(&self) -> Endian {
        self.profile.endian
    }
}
