//! Types for dealing with AT commands and replies.
use std::fmt;

use thiserror::Error;

use crate::error_codes::CmsError;
use crate::errors::{GatewayError, GatewayResult};

/// An AT result code, which indicates the completion of a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtResultCode {
    /// Command executed without failure.
    #[error("a command is executed, and there is no error")]
    Ok,
    /// Connection established.
    #[error("a connection is established")]
    Connect,
    /// Incoming call.
    #[error("an incoming call is originated")]
    Ring,
    /// Connection terminated.
    #[error("a connection is terminated")]
    NoCarrier,
    /// Generic error (rather unhelpful).
    #[error("a generic error occurred")]
    Error,
    /// CME error (= generic error), with an opaque numeric code.
    #[error("an error occurred: code {0}")]
    CmeError(u32),
    /// Typed CMS error (= SMS-related error) that uses one of the
    /// available error codes.
    #[error("an SMS-related error occurred: {0}")]
    CmsError(#[source] CmsError),
    /// CMS error given as string, because of modem configuration.
    #[error("an unknown SMS-related error occurred: {0}")]
    CmsErrorString(String),
    /// Unknown CMS error code.
    #[error("an unknown SMS-related error occurred: code {0}")]
    CmsErrorUnknown(u32),
    /// No dialtone.
    #[error("there is no dialtone")]
    NoDialtone,
    /// Recipient busy.
    #[error("recipient is busy")]
    Busy,
    /// No answer.
    #[error("no reply (timeout occurred)")]
    NoAnswer,
    /// Command not supported.
    #[error("command not supported")]
    CommandNotSupported,
    /// Too many parameters.
    #[error("too many parameters")]
    TooManyParameters,
}

impl AtResultCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, AtResultCode::Ok)
    }

    /// Reconstruct the literal line the modem sent for this result code
    /// (`"ERROR"`, `"+CMS ERROR: 42"`, ...), the form §4.3/§7's
    /// `ModemRejected{line}` records as a failed attempt's `error_code`.
    pub fn as_wire_line(&self) -> String {
        match self {
            AtResultCode::Ok => "OK".to_string(),
            AtResultCode::Connect => "CONNECT".to_string(),
            AtResultCode::Ring => "RING".to_string(),
            AtResultCode::NoCarrier => "NO CARRIER".to_string(),
            AtResultCode::Error => "ERROR".to_string(),
            AtResultCode::CmeError(n) => format!("+CME ERROR: {n}"),
            AtResultCode::CmsError(e) => format!("+CMS ERROR: {}", *e as u32),
            AtResultCode::CmsErrorString(s) => format!("+CMS ERROR: {s}"),
            AtResultCode::CmsErrorUnknown(n) => format!("+CMS ERROR: {n}"),
            AtResultCode::NoDialtone => "NO DIALTONE".to_string(),
            AtResultCode::Busy => "BUSY".to_string(),
            AtResultCode::NoAnswer => "NO ANSWER".to_string(),
            AtResultCode::CommandNotSupported => "COMMAND NOT SUPPORT".to_string(),
            AtResultCode::TooManyParameters => "TOO MANY PARAMETERS".to_string(),
        }
    }
}

/// Any of a set of types used in AT commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtValue {
    /// A string-type value - text surrounded by "quotation marks".
    String(String),
    /// An integer.
    Integer(u32),
    /// A range of integers.
    Range((u32, u32)),
    /// Some untyped value - usually 'bareword' strings, i.e. strings that
    /// aren't surrounded in "quotation marks".
    Unknown(String),
    /// An empty value, corresponding to nothing at all.
    Empty,
    /// A bracketed array.
    BracketedArray(Vec<AtValue>),
    /// A non-bracketed array.
    Array(Vec<AtValue>),
}

macro_rules! at_value_impl {
    ($atv:ident, $($var:ident, $refmeth:ident, $mutmeth:ident, $asmeth:ident, $ty:ty),*) => {
        /// Methods to extract various types out of an `AtValue`. If the
        /// value is not of the desired type, `GatewayError::ParseFault` is
        /// returned.
        ///
        /// - `as_x` methods take `self`, and return either the type or an error.
        /// - `get_x` methods take `&self`, and return a `&` reference.
        /// - `get_x_mut` methods take `&mut self`, and return a `&mut` reference.
        impl $atv {
            $(
                pub fn $refmeth(&self) -> GatewayResult<&$ty> {
                    if let $atv::$var(ref i) = *self {
                        Ok(i)
                    } else {
                        Err(GatewayError::ParseFault(format!("expected {}", stringify!($var))))
                    }
                }
                pub fn $mutmeth(&mut self) -> GatewayResult<&mut $ty> {
                    if let $atv::$var(ref mut i) = *self {
                        Ok(i)
                    } else {
                        Err(GatewayError::ParseFault(format!("expected {}", stringify!($var))))
                    }
                }
                pub fn $asmeth(self) -> GatewayResult<$ty> {
                    if let $atv::$var(i) = self {
                        Ok(i)
                    } else {
                        Err(GatewayError::ParseFault(format!("expected {}", stringify!($var))))
                    }
                }
            )*
        }
    }
}
at_value_impl!(AtValue,
               String, get_string, get_string_mut, as_string, String,
               Integer, get_integer, get_integer_mut, as_integer, u32,
               Range, get_range, get_range_mut, as_range, (u32, u32),
               Unknown, get_unknown, get_unknown_mut, as_unknown, String,
               BracketedArray, get_bracketed_array, get_bracketed_array_mut, as_bracketed_array, Vec<AtValue>,
               Array, get_array, get_array_mut, as_array, Vec<AtValue>);

/// Writes the `AtValue` out, as it would appear on the command line.
impl fmt::Display for AtValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::AtValue::*;
        match *self {
            String(ref st) => write!(f, "\"{}\"", st)?,
            Integer(i) => write!(f, "{}", i)?,
            Range((a, b)) => write!(f, "{}-{}", a, b)?,
            Unknown(ref st) => write!(f, "{}", st)?,
            Empty => {}
            BracketedArray(ref val) => {
                write!(f, "(")?;
                for (i, val) in val.iter().enumerate() {
                    let c = if i == 0 { "" } else { "," };
                    write!(f, "{}{}", c, val)?;
                }
                write!(f, ")")?;
            }
            Array(ref val) => {
                for (i, val) in val.iter().enumerate() {
                    let c = if i == 0 { "" } else { "," };
                    write!(f, "{}{}", c, val)?;
                }
            }
        }
        Ok(())
    }
}

/// One of possibly many response lines to an AT command.
///
/// One `AtResponse` always corresponds to one line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtResponse {
    /// An information response issued as a result of a command.
    ///
    /// Corresponds to `<param>: <response>`.
    InformationResponse { param: String, response: AtValue },
    /// An AT result code, indicating the completion of a command.
    ResultCode(AtResultCode),
    /// Some other unknown response.
    Unknown(String),
}

/// The complete set of responses to an issued AT command.
#[derive(Debug, Clone)]
pub struct AtResponsePacket {
    /// The various `AtResponse`s issued.
    ///
    /// Note that this will only contain 'expected' `InformationResponse`s,
    /// as well as any `Unknown` responses. 'Expected' values are values
    /// that were expected as a result of the command issued - see the
    /// `AtCommand` documentation.
    pub responses: Vec<AtResponse>,
    /// The final result code for this command.
    pub status: AtResultCode,
}

impl AtResponsePacket {
    /// Extracts the value of an `InformationResponse` that has a given `resp`
    /// as its `param`, if such a response exists.
    ///
    /// Also invokes `self.assert_ok()?`, to verify that the response was successful.
    pub fn extract_named_response_opt(&self, resp: &str) -> GatewayResult<Option<&AtValue>> {
        self.assert_ok()?;
        for r in self.responses.iter() {
            if let AtResponse::InformationResponse {
                ref param,
                ref response,
            } = *r
            {
                if resp == param {
                    return Ok(Some(response));
                }
            }
        }
        Ok(None)
    }

    /// Like `extract_named_response_opt`, but fails with
    /// `GatewayError::ExpectedResponse` if the named response doesn't
    /// actually exist.
    pub fn extract_named_response(&self, resp: &str) -> GatewayResult<&AtValue> {
        match self.extract_named_response_opt(resp)? {
            Some(val) => Ok(val),
            None => Err(GatewayError::ExpectedResponse(resp.into())),
        }
    }

    /// Returns `GatewayError::AtFault(self.status.clone())` if the status
    /// code was not `Ok`.
    pub fn assert_ok(&self) -> GatewayResult<()> {
        if self.status.is_ok() {
            Ok(())
        } else {
            Err(GatewayError::AtFault(self.status.clone()))
        }
    }
}

/// An AT command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// Either execute a non-basic command named `param` with `value` as
    /// argument, or set the current value of `param` to `value`.
    ///
    /// Corresponds to `AT<param>=<value>`.
    Equals { param: String, value: AtValue },
    /// Execute a non-basic command, with the name of `command`.
    ///
    /// Corresponds to `AT<command>`.
    Execute { command: String },
    /// Read the current value of `param`.
    ///
    /// Corresponds to `AT<param>?`.
    Read { param: String },
    /// Return the available value range of `param`.
    ///
    /// Corresponds to `AT<param>=?`.
    Test { param: String },
    /// Execute a basic command, where `command` indicates a single letter
    /// (A-Z) or the `&` symbol and a single letter, with an optional number
    /// parameter.
    ///
    /// Corresponds to `AT<command>[<number>]`.
    Basic {
        command: String,
        number: Option<usize>,
    },
    /// Just send some raw text.
    Text {
        text: String,
        /// The set of 'expected' `InformationResponse`s to this command.
        expected: Vec<String>,
    },
}

impl AtCommand {
    /// Get the set of 'expected' `InformationResponse`s for this command.
    ///
    /// Used to filter out URCs (Unsolicited Response Codes): commands only
    /// get `InformationResponse`s that match their `expected()` array, so
    /// everything else can be assumed to be a URC.
    ///
    /// - For `Equals`, `Read`, and `Test`, this is `vec![param]`.
    /// - For `Execute` and `Basic`, this is `vec![command]`.
    /// - For `Text`, this is `expected`.
    pub fn expected(&self) -> Vec<String> {
        match *self {
            AtCommand::Equals { ref param, .. } => vec![param.clone()],
            AtCommand::Execute { ref command } => vec![command.clone()],
            AtCommand::Read { ref param } => vec![param.clone()],
            AtCommand::Test { ref param } => vec![param.clone()],
            AtCommand::Basic { ref command, .. } => vec![command.clone()],
            AtCommand::Text { ref expected, .. } => expected.clone(),
        }
    }
}

/// Writes the `AtCommand` out, as it would appear on the command line.
impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::AtCommand::*;
        match *self {
            Equals {
                ref param,
                ref value,
            } => write!(f, "AT{}={}", param, value)?,
            Execute { ref command } => write!(f, "AT{}", command)?,
            Read { ref param } => write!(f, "AT{}?", param)?,
            Test { ref param } => write!(f, "AT{}=?", param)?,
            Basic {
                ref command,
                ref number,
            } => {
                write!(f, "AT{}", command)?;
                if let Some(n) = *number {
                    write!(f, "{}", n)?;
                }
            }
            Text { ref text, .. } => write!(f, "{}", text)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn result_code_is_ok() {
        assert!(AtResultCode::Ok.is_ok());
        assert!(!AtResultCode::Error.is_ok());
    }

    #[test]
    fn wire_line_reconstructs_modem_text() {
        assert_eq!(AtResultCode::Error.as_wire_line(), "ERROR");
        assert_eq!(AtResultCode::CmsErrorUnknown(42).as_wire_line(), "+CMS ERROR: 42");
    }

    #[test]
    fn command_display() {
        assert_eq!(
            AtCommand::Equals {
                param: "+CMGF".into(),
                value: AtValue::Integer(0)
            }
            .to_string(),
            "AT+CMGF=0"
        );
        assert_eq!(
            AtCommand::Basic {
                command: "Z".into(),
                number: None
            }
            .to_string(),
            "ATZ"
        );
    }

    #[test]
    fn assert_ok_surfaces_at_fault() {
        let packet = AtResponsePacket {
            responses: vec![],
            status: AtResultCode::Error,
        };
        assert!(matches!(
            packet.assert_ok(),
            Err(GatewayError::AtFault(AtResultCode::Error))
        ));
    }

    #[test]
    fn extract_named_response_missing_is_expected_response_error() {
        let packet = AtResponsePacket {
            responses: vec![],
            status: AtResultCode::Ok,
        };
        assert!(matches!(
            packet.extract_named_response("+CMGS"),
            Err(GatewayError::ExpectedResponse(_))
        ));
    }
}
