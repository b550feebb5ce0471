//! The Tokio codec used to frame the line-oriented AT protocol over the
//! serial transport.
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::at::{AtCommand, AtResponse};
use crate::errors::GatewayError;
use crate::parse;

/// Encodes AT commands into text to be sent to a modem, and decodes its
/// responses into AT responses.
pub struct AtCodec;

impl Decoder for AtCodec {
    type Item = Vec<AtResponse>;
    type Error = GatewayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        trace!(bytes = src.len(), "decoding AT response buffer");
        match parse::responses(src) {
            Ok((rest, data)) => {
                if data.is_empty() {
                    return Ok(None);
                }
                let consumed = src.len() - rest.len();
                src.advance(consumed);
                Ok(Some(data))
            }
            Err(nom::Err::Incomplete(_)) => Ok(None),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(
                GatewayError::ParseFault(format!("{:?}", e.code)),
            ),
        }
    }
}

impl Encoder<AtCommand> for AtCodec {
    type Error = GatewayError;

    fn encode(&mut self, item: AtCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        trace!(command = %item, "sending AT command");
        let data = format!("\r\n{}\r\n", item);
        let bytes = data.as_bytes();
        if bytes.len() > dst.remaining_mut() {
            dst.reserve(bytes.len());
        }
        dst.put_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_command_with_crlf_framing() {
        let mut codec = AtCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(
                AtCommand::Equals {
                    param: "+CMGF".into(),
                    value: crate::at::AtValue::Integer(0),
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(&buf[..], b"\r\nAT+CMGF=0\r\n");
    }

    #[test]
    fn decodes_complete_line_and_leaves_partial_buffered() {
        let mut codec = AtCodec;
        let mut buf = BytesMut::from(&b"OK\r\npartial"[..]);
        let result = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            result,
            vec![AtResponse::ResultCode(crate::at::AtResultCode::Ok)]
        );
        assert_eq!(&buf[..], b"partial");
    }

    #[test]
    fn encodes_text_command_verbatim_with_ctrl_z() {
        let mut codec = AtCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(
                AtCommand::Text {
                    text: "AT+CMGS=2\n0011\x1A".into(),
                    expected: vec!["+CMGS".into()],
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(&buf[..], b"\r\nAT+CMGS=2\n0011\x1A\r\n");
    }
}
