//! Types for working with errors produced by s7link.

use std::fmt;
use std::io::{Error as IOError, ErrorKind};

use thiserror::Error as ThisError;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure reported by s7link
#[derive(Debug, ThisError)]
pub enum Error {
    /// The address text could not be parsed. Never reaches the wire.
    #[error("invalid address '{input}': {reason}")]
    AddressFormat {
        /// Text handed to the parser
        input: String,
        /// What was wrong with it
        reason: &'static str,
    },
    /// Socket or ISO transport failure. The session is faulted.
    #[error("transport error: {0}")]
    Transport(TransportError),
    /// The PLC rejected or garbled the setup communication. The session is faulted.
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    /// A response violated its own declared lengths or item counts. The session is faulted.
    #[error("protocol framing error: {0}")]
    Framing(String),
    /// The PLC acknowledged the request with an error class/code in the header
    #[error(transparent)]
    Protocol(S7ProtocolError),
    /// At least one item of a strict batch call returned something other than success
    #[error("item {index} failed: {code} (failed items: {failed:?})")]
    Item {
        /// Index of the first failing item
        index: usize,
        /// Return code of the first failing item
        code: ReturnCode,
        /// Indices of all failing items, ascending
        failed: Vec<usize>,
    },
    /// A single item cannot fit into the negotiated PDU even on its own
    #[error("item {index} needs {size} bytes, the negotiated PDU length is {budget}")]
    ItemTooLarge {
        /// Index of the item inside the request list
        index: usize,
        /// Frame size the item alone would produce
        size: usize,
        /// Negotiated PDU length
        budget: u16,
    },
    /// A numeric conversion received fewer bytes than the type needs
    #[error("insufficient data: needed {needed} bytes, available {available} bytes")]
    InsufficientData {
        /// Bytes required by the target type
        needed: usize,
        /// Bytes actually present
        available: usize,
    },
    /// The caller passed an argument the protocol cannot express
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Whether this error invalidated the session it occurred on.
    ///
    /// After a fatal error every call on the same session fails fast until it is reconnected.
    pub fn is_fatal(&self) -> bool {
        self.fault().is_some()
    }

    pub(crate) fn fault(&self) -> Option<Fault> {
        match self {
            Self::Transport(e) => Some(Fault::Transport(e.clone())),
            Self::Negotiation(msg) => Some(Fault::Negotiation(msg.clone())),
            Self::Framing(msg) => Some(Fault::Framing(msg.clone())),
            _ => None,
        }
    }

    pub(crate) fn framing(msg: impl Into<String>) -> Self {
        Self::Framing(msg.into())
    }

    pub(crate) fn address(input: &str, reason: &'static str) -> Self {
        Self::AddressFormat {
            input: input.to_string(),
            reason,
        }
    }
}

impl From<IOError> for Error {
    fn from(e: IOError) -> Self {
        Error::Transport(TransportError::Io(e.kind()))
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<IsoError> for Error {
    fn from(e: IsoError) -> Self {
        Error::Transport(TransportError::Iso(e))
    }
}

/// Failures below the S7 protocol layer
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum TransportError {
    /// Socket level I/O failure
    #[error("IO error: {0}")]
    Io(ErrorKind),
    /// The TCP connection could not be opened in time
    #[error("connecting to '{0}' timed out")]
    ConnectTimeout(String),
    /// Sending a request or receiving its response took too long
    #[error("timeout during data exchange")]
    DataExchangeTimedOut,
    /// No connection has been established, or it was closed
    #[error("session is not connected")]
    NotConnected,
    /// ISO-on-TCP (TPKT/COTP) failure
    #[error("{0}")]
    Iso(IsoError),
}

/// Faults a session remembers so later calls can fail fast with the same kind of error
#[derive(Debug, Clone)]
pub(crate) enum Fault {
    Transport(TransportError),
    Negotiation(String),
    Framing(String),
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Transport(e) => Error::Transport(e),
            Fault::Negotiation(msg) => Error::Negotiation(format!("session faulted: {msg}")),
            Fault::Framing(msg) => Error::Framing(format!("session faulted: {msg}")),
        }
    }
}

/// ISO-on-TCP (RFC 1006 / ISO 8073) errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum IsoError {
    /// The PLC did not confirm the connection request
    #[error("ISO : Connection refused by peer")]
    Connect,
    /// The peer sent a packet with an unexpected PDU type or version
    #[error("ISO : Bad PDU format")]
    InvalidPDU,
    /// A packet shorter than its fixed headers was received
    #[error("ISO : A short packet received")]
    ShortPacket,
    /// The peer kept sending fragments without an EoT flag
    #[error("ISO : Too many packets without EoT flag")]
    TooManyFragments,
    /// The peer sent a disconnect request
    #[error("ISO : Disconnected by peer")]
    Disconnect,
}

/// S7 protocol error carried in the header of an acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7ProtocolError {
    /// Raw error class
    pub class_code: u8,
    /// Error class
    class: &'static str,
    /// Error code
    pub error: u8,
}

impl fmt::Display for S7ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S7 Protocol error: {} (class 0x{:02X}) - error code: 0x{:02X}",
            self.class, self.class_code, self.error
        )
    }
}

impl std::error::Error for S7ProtocolError {}

impl S7ProtocolError {
    pub(crate) fn from_codes(class: u8, code: u8) -> Self {
        Self {
            class_code: class,
            class: match class {
                0x00 => "No error",
                0x81 => "Application relationship error",
                0x82 => "Object definition error",
                0x83 => "No resources available error",
                0x84 => "Error on service processing",
                0x85 => "Error on supplies",
                0x87 => "Access error",
                _ => "Unknown error class",
            },
            error: code,
        }
    }
}

/// Per-item status embedded in the data block of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// The item was read or written
    Success,
    /// Hardware fault
    HardwareFault,
    /// Accessing the object is not allowed
    AccessDenied,
    /// Address out of range
    AddressOutOfRange,
    /// Data type is not supported for this object
    DataTypeMismatch,
    /// Data type or size inconsistent with the object
    DataSizeError,
    /// Requested object does not exist
    ItemNotAvailable,
    /// Any other code
    Other(u8),
}

impl ReturnCode {
    /// Whether the item succeeded
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Wire value of the code
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0xFF,
            Self::HardwareFault => 0x01,
            Self::AccessDenied => 0x03,
            Self::AddressOutOfRange => 0x05,
            Self::DataTypeMismatch => 0x06,
            Self::DataSizeError => 0x07,
            Self::ItemNotAvailable => 0x0A,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::HardwareFault => write!(f, "Hardware fault"),
            Self::AccessDenied => write!(f, "Accessing the object not allowed"),
            Self::AddressOutOfRange => write!(f, "Address out of range"),
            Self::DataTypeMismatch => write!(f, "Data type not supported"),
            Self::DataSizeError => write!(f, "Data type inconsistent"),
            Self::ItemNotAvailable => write!(f, "Object does not exist"),
            Self::Other(code) => write!(f, "Unknown return code 0x{code:02X}"),
        }
    }
}

impl From<u8> for ReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0xFF => Self::Success,
            0x01 => Self::HardwareFault,
            0x03 => Self::AccessDenied,
            0x05 => Self::AddressOutOfRange,
            0x06 => Self::DataTypeMismatch,
            0x07 => Self::DataSizeError,
            0x0A => Self::ItemNotAvailable,
            other => Self::Other(other),
        }
    }
}
