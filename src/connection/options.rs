use std::time::Duration;

use crate::convert::Endian;

/// ISO-on-TCP port
pub const DEFAULT_PORT: u16 = 102;
/// Time allowed for the TCP connect
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Time allowed for sending a request and receiving its response
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(4);

/// Supported PLC devices from the S7 family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlcFamily {
    /// S7-200 behind a CP243 module
    S7200,
    /// S7-200 SMART
    S7200Smart,
    /// S7-300
    S7300,
    /// S7-400
    S7400,
    /// S7-1200.
    ///
    /// You need to activate the [PUT/GET communication](https://cache.industry.siemens.com/dl/files/115/82212115/att_108330/v2/82212115_s7_communication_s7-1500_en.pdf) method in order for this to work
    S71200,
    /// S7-1500.
    ///
    /// You need to activate the [PUT/GET communication](https://cache.industry.siemens.com/dl/files/115/82212115/att_108330/v2/82212115_s7_communication_s7-1500_en.pdf) method in order for this to work
    S71500,
    /// SINUMERIK 828D, gives access to the NCK data as well
    Sinumerik828D,
}

/// What differs between PLC families as far as the client is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyProfile {
    /// Default rack
    pub rack: u8,
    /// Default slot
    pub slot: u8,
    /// PDU length proposed during setup
    pub pdu_length: u16,
    /// Bytes in front of the characters of a PLC string; the last one holds the actual length
    pub string_header_len: u8,
    /// Fixed (local, remote) TSAP pair, replacing the rack/slot derived one
    pub fixed_tsap: Option<(u16, u16)>,
    /// Byte order of numeric payloads
    pub endian: Endian,
}

impl PlcFamily {
    /// Capability record of the family
    pub fn profile(self) -> FamilyProfile {
        let base = FamilyProfile {
            rack: 0,
            slot: 1,
            pdu_length: 240,
            string_header_len: 2,
            fixed_tsap: None,
            endian: Endian::Big,
        };
        match self {
            Self::S7200 => FamilyProfile {
                fixed_tsap: Some((0x4D57, 0x4D57)),
                ..base
            },
            Self::S7200Smart => FamilyProfile {
                string_header_len: 1,
                ..base
            },
            Self::S7300 => FamilyProfile { slot: 2, ..base },
            Self::S7400 => FamilyProfile {
                slot: 3,
                pdu_length: 480,
                ..base
            },
            Self::S71200 => base,
            Self::S71500 => FamilyProfile {
                pdu_length: 960,
                ..base
            },
            Self::Sinumerik828D => FamilyProfile { slot: 0, ..base },
        }
    }
}

/// Connection type encoded in the high byte of the remote TSAP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionType {
    /// Connect to the PLC programming console (Programmiergeräte)
    #[default]
    PG = 1,
    /// Connect to the PLC Siemens HMI panel
    OP = 2,
    /// Basic connection for generic data transfer connection
    Basic = 3,
}

/// Everything needed to open a session.
///
/// Rack, slot and PDU length default to the family's profile.
///
/// ```
/// use std::time::Duration;
/// use s7link::{ConnectionOptions, PlcFamily};
///
/// let options = ConnectionOptions::new("192.168.0.1", PlcFamily::S7300)
///     .with_rack_slot(0, 2)
///     .with_exchange_timeout(Duration::from_secs(2));
/// assert_eq!(options.remote_tsap(), 0x0102);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Host name or IP address of the PLC
    pub host: String,
    /// TCP port
    pub port: u16,
    /// PLC family
    pub family: PlcFamily,
    /// Rack of the CPU
    pub rack: u8,
    /// Slot of the CPU
    pub slot: u8,
    /// Connection type
    pub connection_type: ConnectionType,
    /// PDU length proposed during setup
    pub pdu_length: u16,
    /// Time allowed for the TCP connect
    pub connect_timeout: Duration,
    /// Time allowed per request/response exchange
    pub exchange_timeout: Duration,
}

impl ConnectionOptions {
    /// Options for `host` with the defaults of `family`
    pub fn new(host: impl Into<String>, family: PlcFamily) -> Self {
        let profile = family.profile();
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            family,
            rack: profile.rack,
            slot: profile.slot,
            connection_type: ConnectionType::default(),
            pdu_length: profile.pdu_length,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    /// Use another TCP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use another rack and slot
    pub fn with_rack_slot(mut self, rack: u8, slot: u8) -> Self {
        self.rack = rack;
        self.slot = slot;
        self
    }

    /// Use another connection type
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    /// Propose another PDU length
    pub fn with_pdu_length(mut self, pdu_length: u16) -> Self {
        self.pdu_length = pdu_length;
        self
    }

    /// Use another connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Use another exchange timeout
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Capability record of the configured family
    pub fn profile(&self) -> FamilyProfile {
        self.family.profile()
    }

    /// Calling TSAP
    pub fn local_tsap(&self) -> u16 {
        match self.profile().fixed_tsap {
            Some((local, _)) => local,
            None => 0x0100,
        }
    }

    /// Called TSAP: connection type in the high byte, `rack * 0x20 + slot` in the low byte
    pub fn remote_tsap(&self) -> u16 {
        match self.profile().fixed_tsap {
            Some((_, remote)) => remote,
            None => {
                ((self.connection_type as u16) << 8)
                    + u16::from(self.rack) * 0x20
                    + u16::from(self.slot)
            }
        }
    }

    pub(crate) fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_defaults() {
        let options = ConnectionOptions::new("plc", PlcFamily::S71500);
        assert_eq!((options.rack, options.slot, options.pdu_length), (0, 1, 960));
        assert_eq!(options.port, 102);
        assert_eq!(options.local_tsap(), 0x0100);
        assert_eq!(options.remote_tsap(), 0x0101);
        assert_eq!(options.socket_address(), "plc:102");

        assert_eq!(PlcFamily::S7200Smart.profile().string_header_len, 1);
        assert_eq!(PlcFamily::S7400.profile().string_header_len, 2);
        assert_eq!(PlcFamily::Sinumerik828D.profile().slot, 0);
    }

    #[test]
    fn tsap_follows_rack_slot_and_type() {
        let options = ConnectionOptions::new("plc", PlcFamily::S7400)
            .with_rack_slot(1, 3)
            .with_connection_type(ConnectionType::Basic);
        assert_eq!(options.remote_tsap(), 0x0323);

        let s200 = ConnectionOptions::new("plc", PlcFamily::S7200).with_rack_slot(2, 2);
        assert_eq!((s200.local_tsap(), s200.remote_tsap()), (0x4D57, 0x4D57));
    }
}
