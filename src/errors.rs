//! Error handling.
//!
//! `GatewayError` realizes the error taxonomy: `PduMalformed`, `ModemRejected`,
//! `ModemTimeout`, `SerialIo`, `InvalidMsisdn`, and `NoActiveDevices`, plus the
//! lower-level AT/parse faults that feed into them. Handling for each kind is
//! documented at the call site that raises it, not here.
use std::io;
use thiserror::Error;

use crate::at::AtResultCode;

/// Errors raised by the PDU codec, AT/session layer, inbound handler, and
/// campaign dispatcher.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// An inbound or constructed PDU failed a structural check (truncated
    /// field, impossible length, bad hex).
    #[error("malformed PDU: {0}")]
    PduMalformed(&'static str),

    /// The modem replied `ERROR` or `+CMS ERROR: n` to a send.
    #[error("modem rejected command: {line}")]
    ModemRejected { line: String },

    /// No terminating response arrived within the read timeout.
    #[error("modem did not respond in time")]
    ModemTimeout,

    /// Serial port open/read/write failure.
    #[error("serial I/O error: {0}")]
    SerialIo(#[from] io::Error),

    /// MSISDN failed E.164 normalization.
    #[error("invalid MSISDN: {0}")]
    InvalidMsisdn(String),

    /// The dispatcher found zero active devices at the start of a run.
    #[error("no active devices available")]
    NoActiveDevices,

    /// An AT result code other than `OK` was returned for a request that
    /// expected success.
    #[error("AT error: {0:?}")]
    AtFault(AtResultCode),

    /// The line-oriented AT response grammar failed to parse a line.
    #[error("failed to parse AT response line: {0}")]
    ParseFault(String),

    /// A named `InformationResponse` was expected in a command's reply but
    /// never arrived.
    #[error("expected a {0} response")]
    ExpectedResponse(String),

    /// The background session task has exited; no further requests can be
    /// serviced.
    #[error("modem session task is no longer running")]
    SessionClosed,
}

/// Standard result type alias used throughout the crate.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error type returned by externally-implemented ports (persistence,
/// notification). The core never matches on its internals; it only logs and
/// moves on, since the concrete error type belongs to whatever store or
/// transport the external implementer chose.
pub type PortError = Box<dyn std::error::Error + Send + Sync + 'static>;
