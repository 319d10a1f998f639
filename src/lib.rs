#![warn(missing_docs, unreachable_pub)]
#![deny(
    missing_debug_implementations,
    rust_2018_idioms,
    single_use_lifetimes
)]

/*!
This crate provides an async client for reading and writing data to and from PLC devices of the
Siemens S7 family, and for reading the CNC data of SINUMERIK controllers.

The client speaks S7 communication over ISO-on-TCP (RFC 1006). After connecting it
negotiates the PDU length with the PLC and splits multi-item reads and writes into as
few requests as that length allows, keeping the results in request order.

# Usage

```toml
[dependencies]
s7link = "0.1"
```

# Examples
## Typed access
```rust, no_run
# tokio_test::block_on(async {
use s7link::{ConnectionOptions, PlcFamily, S7Client};

// create single s7 client
let options = ConnectionOptions::new("192.168.0.10", PlcFamily::S71200);
let mut client = S7Client::new(options).await?;

// read some data
let speed = client.read_f32("DB100.DBD4").await?;
client.write_bool("DB100.DBX0.1", speed > 10.0).await?;
let name = client.read_string("DB100.DBB20").await?;
# Ok::<(), s7link::errors::Error>(())
# });
```

## Several addresses at once
```rust, no_run
# tokio_test::block_on(async {
use s7link::{ConnectionOptions, MultiAddressRead, PlcFamily, S7Client};

let mut client = S7Client::new(ConnectionOptions::new("192.168.0.10", PlcFamily::S71500)).await?;

let mut read = MultiAddressRead::new();
read.add_bool("M0.0")?.add_bytes("DB1.DBB0", 16)?;
// `None` for every item the PLC could not read
let values = client.read_multi_unsafe(&read).await?;
# Ok::<(), s7link::errors::Error>(())
# });
```

# Errors

Transport, negotiation and framing errors leave the session faulted: every following call
fails fast with the same kind of error until [`S7Client::connect`] is called again.
Rejected items and invalid arguments leave the session usable.
*/

mod client;
pub mod connection;
pub mod convert;
pub mod errors;
pub mod s7_protocol;

pub use client::create::S7Client;
pub use client::{MultiAddressRead, MultiAddressWrite};
pub use connection::{
    ConnectionOptions, ConnectionType, FamilyProfile, PlcFamily, SessionState, TransportSession,
};
pub use convert::Endian;
pub use errors::{Error, ReturnCode};
pub use s7_protocol::{
    parse_address, Address, Area, BlockType, DataItem, DataVariableType, FileSystem, NckArea,
    NckItem, NckModule, RequestItem, StandardItem, VariableType,
};
