//! A complete net message: class index, header and body.
//!
//! ```text
//! transient:  [u16 class][NetHeader][body, base layer first]
//! persisted:  [u16 class][header ContentFlags + fields][per-layer ContentFlags + fields]
//! ```

use bytes::BufMut;

use crate::stream::WireReader;
use crate::{ClassIndex, NetBody, NetFlags, NetHeader, WireError, WireLayer};

bitflags::bitflags! {
    /// How much of a buffer this instance has already parsed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PeekStatus: u8 {
        const BASE = 1 << 0;
        const PAYLOAD = 1 << 1;
    }
}

/// Options for [`NetMessage::peek_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeekOptions {
    /// Parse the class index and header only.
    pub base_only: bool,
    /// Parse again even if this instance already did the requested work.
    pub force: bool,
    /// Header flags that must be present for the peek to succeed.
    pub required: NetFlags,
}

impl PeekOptions {
    pub fn base_only() -> Self {
        Self {
            base_only: true,
            ..Self::default()
        }
    }

    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn requiring(required: NetFlags) -> Self {
        Self {
            required,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetMessage {
    pub header: NetHeader,
    pub body: NetBody,
    peek_status: PeekStatus,
    base_len: usize,
    total_len: usize,
}

impl NetMessage {
    /// A message with an empty header around `body`.
    pub fn new(body: NetBody) -> Self {
        Self::with_header(NetHeader::default(), body)
    }

    pub fn with_header(header: NetHeader, body: NetBody) -> Self {
        Self {
            header,
            body,
            peek_status: PeekStatus::empty(),
            base_len: 0,
            total_len: 0,
        }
    }

    pub fn class_index(&self) -> ClassIndex {
        self.body.class_index()
    }

    pub fn peek_status(&self) -> PeekStatus {
        self.peek_status
    }

    // -----------------------------------------------------------------------
    // Transient format
    // -----------------------------------------------------------------------

    /// Appends the transient encoding to `out` and returns the number of
    /// bytes written.
    ///
    /// A body that cannot be encoded (a string or list over its length
    /// prefix) writes nothing and returns 0.
    pub fn poke_buffer(&self, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        match self.poke_into(out) {
            Ok(()) => out.len() - start,
            Err(e) => {
                out.truncate(start);
                tracing::debug!(class = %self.class_index(), error = %e, "failed to poke message");
                0
            }
        }
    }

    /// The transient encoding as a fresh buffer.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::new();
        self.poke_into(&mut out)?;
        Ok(out)
    }

    fn poke_into(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.put_u16_le(self.class_index().0);
        self.header.poke(out);
        self.body.poke(out)
    }

    /// Parses `buf` into this instance and returns the bytes consumed, or 0
    /// on any failure. On failure the instance is left unchanged.
    ///
    /// Work already done by an earlier peek is not repeated unless
    /// `opts.force` is set; the earlier length is returned instead.
    pub fn peek_buffer(&mut self, buf: &[u8], opts: PeekOptions) -> usize {
        match self.decode_with(buf, opts) {
            Ok(len) => len,
            Err(e) => {
                tracing::debug!(class = %self.class_index(), error = %e, "failed to peek message");
                0
            }
        }
    }

    /// Full, non-forced peek with the failure reason kept.
    pub fn decode(&mut self, buf: &[u8]) -> Result<usize, WireError> {
        self.decode_with(buf, PeekOptions::default())
    }

    pub fn decode_with(&mut self, buf: &[u8], opts: PeekOptions) -> Result<usize, WireError> {
        if !opts.force {
            if opts.base_only && self.peek_status.contains(PeekStatus::BASE) {
                return Ok(self.base_len);
            }
            if self.peek_status.contains(PeekStatus::BASE | PeekStatus::PAYLOAD) {
                return Ok(self.total_len);
            }
        }

        let mut r = WireReader::new(buf);
        self.check_class(&mut r)?;
        let header = NetHeader::peek(&mut r)?;
        let missing = opts.required.difference(header.flags());
        if !missing.is_empty() {
            return Err(WireError::MissingField(missing));
        }
        let base_len = r.consumed();

        if opts.base_only {
            self.header = header;
            self.base_len = base_len;
            self.peek_status.insert(PeekStatus::BASE);
            return Ok(base_len);
        }

        let mut body = self.body.clone();
        body.peek(&mut r)?;
        self.header = header;
        self.body = body;
        self.base_len = base_len;
        self.total_len = r.consumed();
        self.peek_status = PeekStatus::BASE | PeekStatus::PAYLOAD;
        Ok(self.total_len)
    }

    fn check_class(&self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        let found = ClassIndex(r.get_u16()?);
        if found != self.class_index() {
            return Err(WireError::ClassMismatch {
                expected: self.class_index(),
                found,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persisted format
    // -----------------------------------------------------------------------

    /// Appends the persisted encoding.
    pub fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.put_u16_le(self.class_index().0);
        self.header.write_version(out);
        self.body.write_version(out)
    }

    /// Reads the persisted encoding and returns the bytes consumed. Fields
    /// the writer did not record are reset to their defaults.
    pub fn read_version(&mut self, buf: &[u8]) -> Result<usize, WireError> {
        let mut r = WireReader::new(buf);
        self.check_class(&mut r)?;
        let header = NetHeader::read_version(&mut r)?;
        let mut body = self.body.clone();
        body.read_version(&mut r)?;
        self.header = header;
        self.body = body;
        Ok(r.consumed())
    }
}
