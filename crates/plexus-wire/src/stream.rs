//! Low-level byte reading and writing.
//!
//! Everything on the wire is little-endian. Writing goes straight into a
//! caller-owned `Vec<u8>` through [`bytes::BufMut`]; reading goes through
//! [`WireReader`], which checks the remaining length before every access so
//! a short or hostile buffer turns into [`WireError::Truncated`] instead of
//! a panic (`bytes::Buf` panics on underflow).

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::WireError;

/// Maximum byte length of a length-prefixed string.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A bounds-checked cursor over a borrowed byte buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    rest: &'a [u8],
    len: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            rest: buf,
            len: buf.len(),
        }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.len - self.rest.len()
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    fn ensure(&self, needed: usize) -> Result<(), WireError> {
        if self.rest.len() < needed {
            return Err(WireError::Truncated {
                needed,
                remaining: self.rest.len(),
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        self.ensure(1)?;
        Ok(self.rest.get_u8())
    }

    pub fn get_u16(&mut self) -> Result<u16, WireError> {
        self.ensure(2)?;
        Ok(self.rest.get_u16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        self.ensure(4)?;
        Ok(self.rest.get_u32_le())
    }

    pub fn get_f64(&mut self) -> Result<f64, WireError> {
        self.ensure(8)?;
        Ok(self.rest.get_f64_le())
    }

    /// Reads a one-byte boolean. Any non-zero byte is `true`.
    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.get_u8()? != 0)
    }

    /// Borrows the next `n` bytes.
    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.ensure(n)?;
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    /// Reads a `u16` length prefix followed by UTF-8 bytes.
    pub fn get_string(&mut self) -> Result<String, WireError> {
        let len = self.get_u16()? as usize;
        let raw = self.get_bytes(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidString)
    }

    pub fn get_uuid(&mut self) -> Result<Uuid, WireError> {
        let raw = self.get_bytes(16)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(raw);
        Ok(Uuid::from_bytes(bytes))
    }

    /// Reads a count prefix and rejects counts that cannot possibly fit in
    /// the remaining bytes, given the smallest encoding of one element.
    ///
    /// This keeps a forged count from driving a huge allocation.
    pub fn get_count(
        &mut self,
        prefix_u8: bool,
        min_elem_len: usize,
        field: &'static str,
    ) -> Result<usize, WireError> {
        let count = if prefix_u8 {
            self.get_u8()? as usize
        } else {
            self.get_u32()? as usize
        };
        if count.saturating_mul(min_elem_len.max(1)) > self.remaining() {
            return Err(WireError::InvalidLength { field, len: count });
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Writer helpers
// ---------------------------------------------------------------------------

pub fn put_bool(out: &mut Vec<u8>, value: bool) {
    out.put_u8(u8::from(value));
}

/// Writes a `u16` length prefix followed by the string's UTF-8 bytes.
pub fn put_string(
    out: &mut Vec<u8>,
    value: &str,
    field: &'static str,
) -> Result<(), WireError> {
    if value.len() > MAX_STRING_LEN {
        return Err(WireError::FieldTooLong {
            field,
            len: value.len(),
            max: MAX_STRING_LEN,
        });
    }
    out.put_u16_le(value.len() as u16);
    out.put_slice(value.as_bytes());
    Ok(())
}

pub fn put_uuid(out: &mut Vec<u8>, value: &Uuid) {
    out.put_slice(value.as_bytes());
}

/// Writes a `u8` element count, failing if `len` does not fit.
pub fn put_count_u8(
    out: &mut Vec<u8>,
    len: usize,
    field: &'static str,
) -> Result<(), WireError> {
    let count = u8::try_from(len).map_err(|_| WireError::FieldTooLong {
        field,
        len,
        max: u8::MAX as usize,
    })?;
    out.put_u8(count);
    Ok(())
}

/// Writes a `u32` element count, failing if `len` does not fit.
pub fn put_count_u32(
    out: &mut Vec<u8>,
    len: usize,
    field: &'static str,
) -> Result<(), WireError> {
    let count = u32::try_from(len).map_err(|_| WireError::FieldTooLong {
        field,
        len,
        max: u32::MAX as usize,
    })?;
    out.put_u32_le(count);
    Ok(())
}
