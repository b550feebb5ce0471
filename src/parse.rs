//! A nom grammar for the line-oriented AT command/response protocol.
//!
//! Ported from `named!`-macro nom 3 style to nom 7 function combinators;
//! the grammar itself (quoted strings, bracketed/bare arrays, integer
//! ranges, numeric vs. named result codes) is unchanged from the teacher.
use std::char::{decode_utf16, REPLACEMENT_CHARACTER};
use std::convert::TryFrom;
use std::str;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_until};
use nom::character::complete::{line_ending, none_of, not_line_ending, one_of};
use nom::combinator::{map, map_res, opt, value};
use nom::multi::{count, many0, many1};
use nom::sequence::{delimited, preceded, terminated};
use nom::IResult;

use crate::at::*;
use crate::error_codes::CmsError;

/// Decode an AT "string" value's bytes as ASCII, replacing any non-ASCII
/// byte with `?` (mirrors the lossy-ASCII decode the teacher used the
/// `encoding` crate for; dropped that dependency — this is the entire
/// decode).
fn ascii_lossy(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if b < 0x80 { b as char } else { '?' })
        .collect()
}

pub fn parse_string(input: &[u8]) -> IResult<&[u8], String> {
    map(
        delimited(tag("\""), take_until("\""), tag("\"")),
        ascii_lossy,
    )(input)
}

pub fn parse_ucs2_string(input: &[u8]) -> IResult<&[u8], String> {
    map(
        delimited(
            tag("\""),
            many0(map_res(count(one_of("0123456789ABCDEF"), 4), |data: Vec<char>| {
                let st: String = data.into_iter().collect();
                u16::from_str_radix(&st, 16)
            })),
            tag("\""),
        ),
        |data: Vec<u16>| {
            decode_utf16(data.into_iter())
                .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
                .collect::<String>()
        },
    )(input)
}

pub fn parse_integer(input: &[u8]) -> IResult<&[u8], u32> {
    map_res(many1(one_of("0123456789")), |data: Vec<char>| {
        let st: String = data.into_iter().collect();
        st.parse()
    })(input)
}

pub fn parse_range(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    let (input, i1) = parse_integer(input)?;
    let (input, _) = tag("-")(input)?;
    let (input, i2) = parse_integer(input)?;
    Ok((input, (i1, i2)))
}

pub fn parse_unknown(input: &[u8]) -> IResult<&[u8], String> {
    map(many1(none_of(",")), |data| data.into_iter().collect())(input)
}

pub fn parse_value(input: &[u8]) -> IResult<&[u8], AtValue> {
    let (input, first) = parse_single_value(input)?;
    let (input, others) = many0(preceded(tag(","), parse_single_value))(input)?;
    let value = if others.is_empty() {
        first
    } else {
        let mut ret = vec![first];
        ret.extend(others);
        AtValue::Array(ret)
    };
    Ok((input, value))
}

pub fn parse_bracketed_array(input: &[u8]) -> IResult<&[u8], AtValue> {
    map(
        delimited(tag("("), parse_value, tag(")")),
        |v| match v {
            AtValue::Array(ret) => AtValue::BracketedArray(ret),
            AtValue::Empty => AtValue::BracketedArray(vec![]),
            x => AtValue::BracketedArray(vec![x]),
        },
    )(input)
}

pub fn parse_empty(input: &[u8]) -> IResult<&[u8], ()> {
    nom::combinator::success(())(input)
}

pub fn parse_single_value(input: &[u8]) -> IResult<&[u8], AtValue> {
    alt((
        parse_bracketed_array,
        map(parse_string, AtValue::String),
        map(parse_range, AtValue::Range),
        map(parse_integer, AtValue::Integer),
        map(parse_unknown, AtValue::Unknown),
        map(parse_empty, |_| AtValue::Empty),
    ))(input)
}

pub fn parse_information_response(input: &[u8]) -> IResult<&[u8], (String, AtValue)> {
    let (input, param) = take_until(":")(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, _) = opt(tag(" "))(input)?;
    let (input, response) = parse_value(input)?;
    let param = str::from_utf8(param).unwrap_or_default().to_string();
    Ok((input, (param, response)))
}

pub fn parse_response_code(input: &[u8]) -> IResult<&[u8], AtResultCode> {
    alt((
        value(AtResultCode::Ok, tag("OK")),
        value(AtResultCode::Connect, tag("CONNECT")),
        value(AtResultCode::Ring, tag("RING")),
        value(AtResultCode::NoCarrier, tag("NO CARRIER")),
        value(AtResultCode::Error, tag("ERROR")),
        value(AtResultCode::NoDialtone, tag("NO DIALTONE")),
        value(AtResultCode::Busy, tag("BUSY")),
        value(AtResultCode::NoAnswer, tag("NO ANSWER")),
        value(AtResultCode::CommandNotSupported, tag("COMMAND NOT SUPPORT")),
        value(AtResultCode::TooManyParameters, tag("TOO MANY PARAMETERS")),
        map_res(parse_information_response, |(p, r)| {
            if p == "+CME ERROR" {
                if let AtValue::Integer(r) = r {
                    return Ok(AtResultCode::CmeError(r));
                }
            }
            if p == "+CMS ERROR" {
                if let AtValue::Integer(r) = r {
                    return Ok(match CmsError::try_from(r) {
                        Ok(e) => AtResultCode::CmsError(e),
                        Err(_) => AtResultCode::CmsErrorUnknown(r),
                    });
                } else if let AtValue::Unknown(s) = r {
                    return Ok(AtResultCode::CmsErrorString(s));
                }
            }
            Err("not a recognized information response")
        }),
    ))(input)
}

pub fn parse_response_line(input: &[u8]) -> IResult<&[u8], AtResponse> {
    alt((
        map(parse_response_code, AtResponse::ResultCode),
        map(parse_information_response, |(param, response)| {
            AtResponse::InformationResponse { param, response }
        }),
        map_res(not_line_ending, |s: &[u8]| {
            let st = str::from_utf8(s).map_err(|_| ())?.trim();
            if st.is_empty() {
                return Err(());
            }
            Ok(AtResponse::Unknown(st.to_string()))
        }),
    ))(input)
}

/// Parse every line of a multi-line AT reply, dropping blank lines.
pub fn responses(input: &[u8]) -> IResult<&[u8], Vec<AtResponse>> {
    map(
        many1(terminated(
            opt(non_empty_line_content(parse_response_line)),
            line_ending,
        )),
        |res| res.into_iter().flatten().collect(),
    )(input)
}

/// Run `parser` against one line's content (everything up to, but not
/// including, the line ending), failing if the parser doesn't consume the
/// whole line.
fn non_empty_line_content<'a, O>(
    mut parser: impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], O> {
    move |input: &'a [u8]| {
        let (rest, line) = take_till(|c| c == b'\r' || c == b'\n')(input)?;
        let (_, out) = parser(line)?;
        Ok((rest, out))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::at::AtValue::*;

    #[test]
    fn value_string() {
        assert_eq!(
            parse_string(b"\"testing\"").unwrap(),
            (&[] as &[_], "testing".into())
        );
        assert_eq!(
            parse_value(b"\"testing\"").unwrap(),
            (&[] as &[_], AtValue::String("testing".into()))
        );
    }

    #[test]
    fn value_integer() {
        assert_eq!(parse_integer(b"9001").unwrap(), (&[] as &[_], 9001));
        assert_eq!(
            parse_value(b"9001").unwrap(),
            (&[] as &[_], AtValue::Integer(9001))
        );
    }

    #[test]
    fn value_range() {
        assert_eq!(parse_range(b"2-9001").unwrap(), (&[] as &[_], (2, 9001)));
        assert_eq!(
            parse_value(b"2-9001").unwrap(),
            (&[] as &[_], AtValue::Range((2, 9001)))
        );
    }

    #[test]
    fn value_empty() {
        assert_eq!(parse_empty(b"").unwrap(), (&[] as &[_], ()));
        assert_eq!(parse_value(b"").unwrap(), (&[] as &[_], AtValue::Empty));
    }

    #[test]
    fn value_unknown() {
        assert_eq!(
            parse_unknown(b"invalid").unwrap(),
            (&[] as &[_], "invalid".into())
        );
        assert_eq!(
            parse_value(b"invalid").unwrap(),
            (&[] as &[_], AtValue::Unknown("invalid".into()))
        );
    }

    #[test]
    fn value_complex() {
        assert_eq!(
            parse_value(b"3,0,15,\"GSM\",(),(0-3),,(0-1),invalid,(0-2,15),(\"GSM\",\"IRA\")")
                .unwrap(),
            (
                &[] as &[_],
                Array(vec![
                    Integer(3),
                    Integer(0),
                    Integer(15),
                    String("GSM".into()),
                    BracketedArray(vec![]),
                    BracketedArray(vec![Range((0, 3))]),
                    Empty,
                    BracketedArray(vec![Range((0, 1))]),
                    Unknown("invalid".into()),
                    BracketedArray(vec![Range((0, 2)), Integer(15)]),
                    BracketedArray(vec![String("GSM".into()), String("IRA".into())]),
                ])
            )
        )
    }

    #[test]
    fn response_code_named() {
        assert_eq!(
            parse_response_code(b"OK").unwrap(),
            (&[] as &[_], AtResultCode::Ok)
        );
        assert_eq!(
            parse_response_code(b"NO CARRIER").unwrap(),
            (&[] as &[_], AtResultCode::NoCarrier)
        );
    }

    #[test]
    fn response_code_cms_error_known() {
        assert_eq!(
            parse_response_code(b"+CMS ERROR: 42").unwrap(),
            (&[] as &[_], AtResultCode::CmsError(CmsError::Congestion))
        );
    }

    #[test]
    fn response_code_cms_error_unknown() {
        assert_eq!(
            parse_response_code(b"+CMS ERROR: 9999").unwrap(),
            (&[] as &[_], AtResultCode::CmsErrorUnknown(9999))
        );
    }

    #[test]
    fn multi_line_responses_skip_blanks() {
        let input = b"\r\n+CMGS: 12\r\n\r\nOK\r\n";
        let (_, resps) = responses(input).unwrap();
        assert_eq!(
            resps,
            vec![
                AtResponse::InformationResponse {
                    param: "+CMGS".into(),
                    response: AtValue::Integer(12)
                },
                AtResponse::ResultCode(AtResultCode::Ok),
            ]
        );
    }
}
