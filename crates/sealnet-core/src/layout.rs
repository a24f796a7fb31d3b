//! Length-prefixed binary layouts (credentials and file pointers)
//!
//! Each field is `[u32 big-endian length][bytes]`. Declared lengths are
//! checked against a ceiling before the field is sliced.

use crate::error::{Error, Result};
use crate::limits;

/// Append a length-prefixed field
pub(crate) fn write_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Cursor over untrusted input
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    malformed: fn(String) -> Error,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8], malformed: fn(String) -> Error) -> Self {
        Self {
            buf,
            pos: 0,
            malformed,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub(crate) fn u32_be(&mut self, field: &str) -> Result<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err((self.malformed)(format!("truncated {}", field)));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read `[len][bytes]`, rejecting `len > limit` before slicing.
    pub(crate) fn field(&mut self, field: &'static str, limit: usize) -> Result<&'a [u8]> {
        let len = self.u32_be(field)? as usize;
        limits::check(field, len, limit)?;
        self.take(len, field)
    }

    /// Fail unless every byte was consumed
    pub(crate) fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err((self.malformed)(format!("{} trailing bytes", self.remaining())));
        }
        Ok(())
    }
}
