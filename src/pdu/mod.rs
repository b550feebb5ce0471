//! SMS PDU codec: SMS-SUBMIT encoding, SMS-DELIVER and SMS-STATUS-REPORT
//! decoding, per 3GPP TS 23.040. Grounded on the teacher's `pdu.rs` /
//! `gsm_encoding` module pair, restructured into one submodule per concern
//! and rebuilt against the narrower basic-alphabet/segmentation rules this
//! gateway's data model specifies (see SPEC_FULL.md §4).
pub mod address;
pub mod gsm7;
pub mod hex;
pub mod ucs2;
pub mod udh;

use rand::Rng;

use crate::errors::GatewayError;
use udh::ConcatHeader;

const DCS_GSM7BIT: u8 = 0x00;
const DCS_UCS2: u8 = 0x08;

const GSM7_SINGLE_LIMIT: usize = 160;
const GSM7_SEGMENT_LIMIT: usize = 153;
const UCS2_SINGLE_LIMIT: usize = 70;
const UCS2_SEGMENT_LIMIT: usize = 67;

/// Character encoding chosen for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gsm7Bit,
    Ucs2,
}

impl Encoding {
    fn dcs(self) -> u8 {
        match self {
            Encoding::Gsm7Bit => DCS_GSM7BIT,
            Encoding::Ucs2 => DCS_UCS2,
        }
    }
}

/// One wire-ready SMS-SUBMIT PDU, hex-encoded, alongside the metadata the
/// session layer and dispatcher need to track it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSegment {
    /// Full PDU as uppercase hex, SMSC-length octet included.
    pub pdu_hex: String,
    /// Octet length of the TPDU (excludes the leading SMSC-length octet),
    /// the value `AT+CMGS=<len>` expects.
    pub tpdu_len: usize,
    pub encoding: Encoding,
    /// Shared across every segment of one logical message; `None` for an
    /// unsegmented send.
    pub concat_reference: Option<u8>,
    pub segment_index: u8,
    pub segment_total: u8,
}

/// Build the SMS-SUBMIT PDU(s) needed to deliver `text` to `number`.
///
/// Chooses GSM 7-bit when every character is in the basic set, else
/// UCS-2; splits into multiple concatenated segments once the single-PDU
/// character budget (160 GSM7bit / 70 UCS-2) is exceeded.
pub fn encode_submit(number: &str, text: &str) -> Vec<SubmitSegment> {
    let (toa, addr_octets, addr_len) = address::encode_octets(number);
    let chunks = split_text(text);
    let concat_reference = if chunks.len() > 1 {
        Some(rand::thread_rng().gen::<u8>())
    } else {
        None
    };
    let total = chunks.len() as u8;

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let index = (i + 1) as u8;
            let udhi = concat_reference.is_some();
            let (user_data, udl) = build_user_data(&chunk, udhi, concat_reference, total, index);
            let first_octet: u8 = if udhi { 0x41 } else { 0x01 };

            let mut tpdu = Vec::new();
            tpdu.push(first_octet);
            tpdu.push(0x00); // message reference, left to the modem
            tpdu.push(addr_len as u8);
            tpdu.push(toa);
            tpdu.extend(&addr_octets);
            tpdu.push(0x00); // protocol identifier
            tpdu.push(chunk.encoding.dcs());
            tpdu.push(udl);
            tpdu.extend(user_data);

            let tpdu_len = tpdu.len();
            let mut pdu = vec![0x00]; // SMSC: use the one configured on the SIM
            pdu.extend(tpdu);

            SubmitSegment {
                pdu_hex: hex::encode(&pdu),
                tpdu_len,
                encoding: chunk.encoding,
                concat_reference,
                segment_index: index,
                segment_total: total,
            }
        })
        .collect()
}

struct Chunk {
    text: String,
    encoding: Encoding,
}

fn split_text(text: &str) -> Vec<Chunk> {
    if gsm7::is_basic_set(text) {
        let char_count = text.chars().count();
        if char_count <= GSM7_SINGLE_LIMIT {
            vec![Chunk {
                text: text.to_string(),
                encoding: Encoding::Gsm7Bit,
            }]
        } else {
            chunk_chars(text, GSM7_SEGMENT_LIMIT)
                .into_iter()
                .map(|text| Chunk {
                    text,
                    encoding: Encoding::Gsm7Bit,
                })
                .collect()
        }
    } else {
        let char_count = text.chars().count();
        if char_count <= UCS2_SINGLE_LIMIT {
            vec![Chunk {
                text: text.to_string(),
                encoding: Encoding::Ucs2,
            }]
        } else {
            chunk_chars(text, UCS2_SEGMENT_LIMIT)
                .into_iter()
                .map(|text| Chunk {
                    text,
                    encoding: Encoding::Ucs2,
                })
                .collect()
        }
    }
}

fn chunk_chars(text: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(n).map(|c| c.iter().collect()).collect()
}

fn build_user_data(
    chunk: &Chunk,
    udhi: bool,
    reference: Option<u8>,
    total: u8,
    index: u8,
) -> (Vec<u8>, u8) {
    match chunk.encoding {
        Encoding::Gsm7Bit => {
            let septets = gsm7::to_septets(&chunk.text);
            if !udhi {
                let packed = gsm7::pack(&septets, 0);
                return (packed, septets.len() as u8);
            }
            let header = ConcatHeader {
                reference: reference.expect("udhi implies a shared reference") as u16,
                total,
                index,
            };
            let header_bytes = header.to_bytes();
            let header_bits = header_bytes.len() * 8;
            let padding = (7 - (header_bits % 7)) % 7;
            let udl = ((header_bits + padding + septets.len() * 7) / 7) as u8;
            let mut data = header_bytes.to_vec();
            data.extend(gsm7::pack(&septets, padding));
            (data, udl)
        }
        Encoding::Ucs2 => {
            let body = ucs2::encode(&chunk.text);
            if !udhi {
                let udl = body.len() as u8;
                return (body, udl);
            }
            let header = ConcatHeader {
                reference: reference.expect("udhi implies a shared reference") as u16,
                total,
                index,
            };
            let mut data = header.to_bytes().to_vec();
            data.extend(body);
            let udl = data.len() as u8;
            (data, udl)
        }
    }
}

/// The TP-MTI bits (first octet, bits 0-1) of an inbound PDU, which in the
/// SC-to-MS direction this gateway always receives in distinguish
/// SMS-DELIVER (`00`) from SMS-STATUS-REPORT (`10`); used to pick which
/// of [`parse_deliver`]/[`parse_status_report`] applies before either is
/// attempted, since both parse far enough into an unrelated PDU type to
/// produce a plausible-looking but wrong result instead of an error.
pub fn inbound_mti(hex_str: &str) -> Result<u8, GatewayError> {
    let bytes = hex::decode(hex_str)?;
    let smsc_len = read_u8(&bytes, 0)? as usize;
    let first_octet = read_u8(&bytes, 1 + smsc_len)?;
    Ok(first_octet & 0x03)
}

pub const MTI_STATUS_REPORT: u8 = 0x02;

/// A decoded SMS-DELIVER TPDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverPdu {
    pub originating_address: String,
    pub text: String,
    pub concat: Option<ConcatHeader>,
}

/// Parse an inbound SMS-DELIVER PDU, given as hex text (as reported by
/// `+CMT:`).
pub fn parse_deliver(hex_str: &str) -> Result<DeliverPdu, GatewayError> {
    let bytes = hex::decode(hex_str)?;
    let mut idx = 0usize;
    let smsc_len = read_u8(&bytes, idx)? as usize;
    idx += 1 + smsc_len;

    let first_octet = read_u8(&bytes, idx)?;
    idx += 1;
    let udhi = first_octet & 0x40 != 0;

    let addr_len = read_u8(&bytes, idx)?;
    idx += 1;
    let toa = read_u8(&bytes, idx)?;
    idx += 1;
    let addr_octets = address::octets_for_digit_count(addr_len);
    let addr_bytes = read_slice(&bytes, idx, addr_octets)?;
    idx += addr_octets;
    let originating_address = address::decode(addr_len, toa, addr_bytes);

    idx += 1; // protocol identifier
    let dcs = read_u8(&bytes, idx)?;
    idx += 1;
    idx += 7; // service centre time stamp

    let udl = read_u8(&bytes, idx)?;
    idx += 1;
    let user_data = &bytes[idx.min(bytes.len())..];

    let encoding = if dcs & 0x08 != 0 {
        Encoding::Ucs2
    } else {
        Encoding::Gsm7Bit
    };

    let (concat, text) = match encoding {
        Encoding::Gsm7Bit => {
            let mut septets = gsm7::unpack(user_data, 0, udl as usize);
            let concat = if udhi && !user_data.is_empty() {
                let udhl = user_data[0] as usize;
                let skip = ((udhl + 1) * 8 + 6) / 7;
                let header = ConcatHeader::find_in(user_data);
                if skip <= septets.len() {
                    septets.drain(0..skip);
                }
                header
            } else {
                None
            };
            (concat, gsm7::from_septets(&septets))
        }
        Encoding::Ucs2 => {
            if udhi && !user_data.is_empty() {
                let udhl = user_data[0] as usize;
                let header = ConcatHeader::find_in(user_data);
                let skip = (udhl + 1).min(user_data.len());
                (header, ucs2::decode(&user_data[skip..]))
            } else {
                (None, ucs2::decode(user_data))
            }
        }
    };

    Ok(DeliverPdu {
        originating_address,
        text,
        concat,
    })
}

/// Final delivery outcome reported in an SMS-STATUS-REPORT, per TS
/// 23.040 §9.2.3.15 status byte ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
    Unknown(u8),
}

/// A decoded SMS-STATUS-REPORT TPDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Message reference as reported, leading zeros stripped (but never
    /// collapsed to an empty string).
    pub reference: String,
    pub status: DeliveryStatus,
}

/// Parse an inbound SMS-STATUS-REPORT PDU, as reported by `+CDS:`.
pub fn parse_status_report(hex_str: &str) -> Result<StatusReport, GatewayError> {
    let bytes = hex::decode(hex_str)?;
    let mut idx = 0usize;
    let smsc_len = read_u8(&bytes, idx)? as usize;
    idx += 1 + smsc_len;

    idx += 1; // first octet
    let mr = read_u8(&bytes, idx)?;
    idx += 1;

    let addr_len = read_u8(&bytes, idx)?;
    idx += 1;
    idx += 1; // type of address
    idx += address::octets_for_digit_count(addr_len);
    idx += 7; // service centre time stamp
    idx += 7; // discharge time
    let status = read_u8(&bytes, idx)?;

    Ok(StatusReport {
        reference: normalize_reference(&format!("{mr:02X}")),
        status: classify_status(status),
    })
}

fn classify_status(status: u8) -> DeliveryStatus {
    if status < 0x20 {
        DeliveryStatus::Delivered
    } else if status >= 0x40 {
        DeliveryStatus::Failed(format!("{status:02X}"))
    } else {
        DeliveryStatus::Unknown(status)
    }
}

/// Strip leading zeros from a hex reference, keeping at least one digit,
/// so `"00"` and `"0"` normalize the same as `"0"` rather than `""`.
pub fn normalize_reference(hex_ref: &str) -> String {
    let trimmed = hex_ref.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn read_u8(bytes: &[u8], idx: usize) -> Result<u8, GatewayError> {
    bytes
        .get(idx)
        .copied()
        .ok_or(GatewayError::PduMalformed("PDU truncated"))
}

fn read_slice(bytes: &[u8], idx: usize, len: usize) -> Result<&[u8], GatewayError> {
    if idx + len > bytes.len() {
        return Err(GatewayError::PduMalformed("PDU truncated"));
    }
    Ok(&bytes[idx..idx + len])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_short_gsm7_message() {
        let segs = encode_submit("+15551234567", "Hello");
        assert_eq!(segs.len(), 1);
        let seg = &segs[0];
        assert_eq!(seg.encoding, Encoding::Gsm7Bit);
        assert_eq!(seg.concat_reference, None);
        assert!(seg.pdu_hex.contains("5155214365F7"));
        assert!(seg.pdu_hex.ends_with("0005C8329BFD06"));
    }

    #[test]
    fn encodes_ucs2_message_when_non_basic() {
        let segs = encode_submit("+15551234567", "héllo");
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].encoding, Encoding::Ucs2);
        // DCS=08 followed by UDL=0x0A (10 octets for 5 UTF-16BE chars)
        assert!(segs[0].pdu_hex.contains("080A"));
    }

    #[test]
    fn splits_long_gsm7_message_into_two_segments() {
        let text = "A".repeat(200);
        let segs = encode_submit("+15551234567", &text);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].segment_total, 2);
        assert_eq!(segs[0].segment_index, 1);
        assert_eq!(segs[1].segment_index, 2);
        assert!(segs[0].concat_reference.is_some());
        assert_eq!(segs[0].concat_reference, segs[1].concat_reference);
        // first-octet 0x41 marks UDHI set; appears right after the SMSC byte
        assert!(segs[0].pdu_hex.starts_with("0041"));
    }

    #[test]
    fn submit_then_deliver_round_trips_short_message() {
        let segs = encode_submit("+15551234567", "Hello");
        // SUBMIT and DELIVER share TP-field layout from the address onward;
        // reuse parse_deliver by flipping only the first octet (DELIVER:
        // bit2 clear + no-validity-period submit bit patterns aren't part
        // of the address/user-data region this test cares about).
        let hex = segs[0].pdu_hex.clone();
        let bytes = hex::decode(&hex).unwrap();
        let mut deliver_bytes = bytes.clone();
        deliver_bytes[1] = 0x00; // SMS-DELIVER first octet, no UDHI
        let deliver_hex = hex::encode(&deliver_bytes);
        let parsed = parse_deliver(&deliver_hex).unwrap();
        assert_eq!(parsed.originating_address, "+15551234567");
        assert_eq!(parsed.text, "Hello");
        assert_eq!(parsed.concat, None);
    }

    #[test]
    fn classifies_status_ranges() {
        assert_eq!(classify_status(0x00), DeliveryStatus::Delivered);
        assert_eq!(classify_status(0x1F), DeliveryStatus::Delivered);
        assert_eq!(classify_status(0x40), DeliveryStatus::Failed("40".into()));
        assert_eq!(classify_status(0x30), DeliveryStatus::Unknown(0x30));
    }

    #[test]
    fn normalizes_reference_without_collapsing_to_empty() {
        assert_eq!(normalize_reference("00"), "0");
        assert_eq!(normalize_reference("0A"), "A");
        assert_eq!(normalize_reference("FF"), "FF");
    }

    #[test]
    fn inbound_mti_distinguishes_deliver_from_status_report() {
        let segs = encode_submit("+15551234567", "Hello");
        let mut bytes = hex::decode(&segs[0].pdu_hex).unwrap();
        bytes[1] = 0x00; // SMS-DELIVER
        assert_eq!(inbound_mti(&hex::encode(&bytes)).unwrap(), 0x00);
        bytes[1] = 0x02; // SMS-STATUS-REPORT
        assert_eq!(inbound_mti(&hex::encode(&bytes)).unwrap(), MTI_STATUS_REPORT);
    }
}
