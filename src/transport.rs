//! Serial transport: opening a modem's serial port and framing it with
//! [`crate::codec::AtCodec`]. Grounded on the teacher's use of
//! `tokio_file_unix`/`tokio_io` to wrap a raw fd in an async stream;
//! `tokio-serial` replaces both with one maintained async serial crate
//! (teacher predates it).
use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::codec::AtCodec;
use crate::errors::{GatewayError, GatewayResult};

/// Default line speed for the modems this gateway targets. Overridden per
/// device only if a future device profile needs it; out of scope for
/// now (modem discovery/capability negotiation is a non-goal).
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How long a single AT command waits for a terminating response line
/// before the session treats it as [`GatewayError::ModemTimeout`].
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open `path` at [`DEFAULT_BAUD_RATE`], 8 data bits / no parity / 1 stop
/// bit (8N1), and frame it with [`AtCodec`].
#[instrument(skip_all, fields(port = %path))]
pub fn open(path: &str) -> GatewayResult<Framed<SerialStream, AtCodec>> {
    let port = tokio_serial::new(path, DEFAULT_BAUD_RATE)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .timeout(RESPONSE_TIMEOUT)
        .open_native_async()
        .map_err(|e| GatewayError::SerialIo(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    debug!("serial port opened");
    Ok(Framed::new(port, AtCodec))
}
