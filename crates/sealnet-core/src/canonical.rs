//! Canonical encoding for capabilities
//!
//! A strict subset of CBOR (RFC 8949) with exactly three item kinds:
//! - Arrays (major type 4)
//! - Byte strings (major type 2)
//! - Text strings (major type 3)
//!
//! Lengths are always written in shortest form and definite-length items
//! only. Decoding rejects anything an encoder would not have produced, so
//! equal values always have equal bytes.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::limits;

const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;

// =============================================================================
// ENCODING
// =============================================================================

fn write_header(out: &mut Vec<u8>, major: u8, len: u64) {
    let major = major << 5;
    if len < 24 {
        out.push(major | len as u8);
    } else if len <= u8::MAX as u64 {
        out.push(major | 24);
        out.push(len as u8);
    } else if len <= u16::MAX as u64 {
        out.push(major | 25);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else if len <= u32::MAX as u64 {
        out.push(major | 26);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    } else {
        out.push(major | 27);
        out.extend_from_slice(&len.to_be_bytes());
    }
}

pub fn write_array_header(out: &mut Vec<u8>, len: usize) {
    write_header(out, MAJOR_ARRAY, len as u64);
}

pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_header(out, MAJOR_BYTES, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

pub fn write_text(out: &mut Vec<u8>, text: &str) {
    write_header(out, MAJOR_TEXT, text.len() as u64);
    out.extend_from_slice(text.as_bytes());
}

/// Array of text strings in `BTreeSet` order (byte-lexicographic)
pub fn write_text_set(out: &mut Vec<u8>, set: &BTreeSet<String>) {
    write_array_header(out, set.len());
    for item in set {
        write_text(out, item);
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Strict decoder over untrusted bytes
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::malformed(format!("truncated {}", what)));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read one header, checking major type and shortest-form length.
    fn header(&mut self, expected_major: u8, what: &str) -> Result<u64> {
        let initial = self.take(1, what)?[0];
        let major = initial >> 5;
        if major != expected_major {
            return Err(Error::malformed(format!(
                "{}: expected major type {}, found {}",
                what, expected_major, major
            )));
        }

        let (len, min) = match initial & 0x1f {
            info @ 0..=23 => return Ok(info as u64),
            24 => (self.take(1, what)?[0] as u64, 24),
            25 => {
                let b = self.take(2, what)?;
                (u16::from_be_bytes([b[0], b[1]]) as u64, u8::MAX as u64 + 1)
            }
            26 => {
                let b = self.take(4, what)?;
                (
                    u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as u64,
                    u16::MAX as u64 + 1,
                )
            }
            27 => {
                let b = self.take(8, what)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                (u64::from_be_bytes(arr), u32::MAX as u64 + 1)
            }
            other => {
                return Err(Error::malformed(format!(
                    "{}: unsupported additional info {}",
                    what, other
                )))
            }
        };

        if len < min {
            return Err(Error::malformed(format!("{}: non-shortest length", what)));
        }
        Ok(len)
    }

    fn bounded_len(&mut self, major: u8, field: &'static str, limit: usize) -> Result<usize> {
        let len = self.header(major, field)?;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        limits::check(field, len, limit)?;
        Ok(len)
    }

    /// Array header; the declared count is checked against `limit`.
    pub fn array(&mut self, field: &'static str, limit: usize) -> Result<usize> {
        self.bounded_len(MAJOR_ARRAY, field, limit)
    }

    /// Byte string; the declared length is checked before slicing.
    pub fn bytes(&mut self, field: &'static str, limit: usize) -> Result<&'a [u8]> {
        let len = self.bounded_len(MAJOR_BYTES, field, limit)?;
        self.take(len, field)
    }

    /// Text string; the declared length is checked before slicing.
    pub fn text(&mut self, field: &'static str, limit: usize) -> Result<&'a str> {
        let len = self.bounded_len(MAJOR_TEXT, field, limit)?;
        let raw = self.take(len, field)?;
        std::str::from_utf8(raw).map_err(|_| Error::malformed(format!("{}: invalid UTF-8", field)))
    }

    /// Array of strictly ascending, distinct text strings
    pub fn text_set(
        &mut self,
        field: &'static str,
        max_items: usize,
        max_item_len: usize,
    ) -> Result<BTreeSet<String>> {
        let count = self.array(field, max_items)?;
        let mut set = BTreeSet::new();
        let mut previous: Option<&str> = None;
        for _ in 0..count {
            let item = self.text(field, max_item_len)?;
            if let Some(prev) = previous {
                if item.as_bytes() <= prev.as_bytes() {
                    return Err(Error::malformed(format!(
                        "{}: members not sorted and distinct",
                        field
                    )));
                }
            }
            previous = Some(item);
            set.insert(item.to_owned());
        }
        Ok(set)
    }

    /// Fail unless every byte was consumed
    pub fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::malformed(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortest_form_headers() {
        let cases: [(usize, &[u8]); 5] = [
            (0, &[0x80]),
            (23, &[0x97]),
            (24, &[0x98, 24]),
            (256, &[0x99, 0x01, 0x00]),
            (65_536, &[0x9a, 0x00, 0x01, 0x00, 0x00]),
        ];
        for (len, expected) in cases {
            let mut out = Vec::new();
            write_array_header(&mut out, len);
            assert_eq!(out, expected, "len {}", len);
        }
    }

    #[test]
    fn test_text_and_bytes() {
        let mut out = Vec::new();
        write_text(&mut out, "alice");
        write_bytes(&mut out, &[1, 2]);
        assert_eq!(hex::encode(&out), "65616c696365420102");

        let mut dec = Decoder::new(&out);
        assert_eq!(dec.text("owner", 64).unwrap(), "alice");
        assert_eq!(dec.bytes("pointer", 64).unwrap(), &[1, 2]);
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn test_non_shortest_rejected() {
        // "a" with a one-byte length that fits in the initial byte
        let input = [0x78, 0x01, b'a'];
        let mut dec = Decoder::new(&input);
        assert!(matches!(
            dec.text("owner", 64),
            Err(Error::MalformedCapability(_))
        ));
    }

    #[test]
    fn test_wrong_major_type() {
        let mut out = Vec::new();
        write_bytes(&mut out, b"alice");
        let mut dec = Decoder::new(&out);
        assert!(matches!(
            dec.text("owner", 64),
            Err(Error::MalformedCapability(_))
        ));
    }

    #[test]
    fn test_indefinite_length_rejected() {
        let input = [0x9f, 0xff];
        let mut dec = Decoder::new(&input);
        assert!(dec.array("readers", 10).is_err());
    }

    #[test]
    fn test_declared_length_checked_before_slicing() {
        // Text header claiming 2^32 bytes, no content behind it
        let input = [0x7b, 0, 0, 0, 1, 0, 0, 0, 0];
        let mut dec = Decoder::new(&input);
        assert!(matches!(
            dec.text("owner", 64),
            Err(Error::SizeLimitExceeded { field: "owner", limit: 64, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let input = [0x62, 0xc3, 0x28];
        let mut dec = Decoder::new(&input);
        assert!(matches!(
            dec.text("owner", 64),
            Err(Error::MalformedCapability(_))
        ));
    }

    #[test]
    fn test_text_set_order() {
        let set: BTreeSet<String> = ["b", "a", "c"].iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        write_text_set(&mut out, &set);

        let mut dec = Decoder::new(&out);
        assert_eq!(dec.text_set("readers", 10, 64).unwrap(), set);

        let mut unsorted = Vec::new();
        write_array_header(&mut unsorted, 2);
        write_text(&mut unsorted, "b");
        write_text(&mut unsorted, "a");
        assert!(Decoder::new(&unsorted).text_set("readers", 10, 64).is_err());

        let mut duplicate = Vec::new();
        write_array_header(&mut duplicate, 2);
        write_text(&mut duplicate, "a");
        write_text(&mut duplicate, "a");
        assert!(Decoder::new(&duplicate).text_set("readers", 10, 64).is_err());
    }

    #[test]
    fn test_trailing_bytes() {
        let input = [0x80, 0x00];
        let mut dec = Decoder::new(&input);
        assert_eq!(dec.array("readers", 10).unwrap(), 0);
        assert!(dec.finish().is_err());
    }
}
