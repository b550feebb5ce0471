//! UCS-2 (big-endian UTF-16) encoding, used whenever message text escapes
//! the GSM 7-bit basic set. Rust's `encode_utf16`/`decode_utf16` already do
//! the code-unit conversion; this module only handles the big-endian byte
//! order the air interface expects (dropped the teacher's `encoding` crate
//! dependency — this is two lines of std, not an ecosystem gap).
use std::char::decode_utf16;

/// Encode `text` as big-endian UTF-16 bytes.
pub fn encode(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

/// Decode big-endian UTF-16 bytes back to a string. Unpaired surrogates
/// are replaced with U+FFFD rather than rejected — a malformed inbound PDU
/// shouldn't take down the whole decode.
pub fn decode(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_ascii_subset_as_big_endian_pairs() {
        assert_eq!(encode("hello"), b"\x00h\x00e\x00l\x00l\x00o".to_vec());
    }

    #[test]
    fn round_trip_with_non_ascii() {
        let text = "héllo";
        assert_eq!(decode(&encode(text)), text);
    }

    #[test]
    fn decode_replaces_unpaired_surrogate() {
        let bytes = [0xD8, 0x00]; // high surrogate with no following low surrogate
        assert_eq!(decode(&bytes), "\u{FFFD}");
    }
}
