//! Error types for the wire layer.
//!
//! Every failure here means "this buffer is not something we can
//! interpret". None of them are fatal: the caller drops the datagram and
//! moves on. The public entry points ([`NetMessage::peek_buffer`] and
//! [`NetMessageRegistry::create_and_read`]) collapse these into "zero bytes
//! consumed" / `None`; the `Result`-returning forms keep the detail for
//! logging and tests.
//!
//! [`NetMessage::peek_buffer`]: crate::NetMessage::peek_buffer
//! [`NetMessageRegistry::create_and_read`]: crate::NetMessageRegistry::create_and_read

use crate::{ClassIndex, NetFlags};

/// Errors that can occur while poking or peeking wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The buffer ended before a field could be read.
    #[error("buffer truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The header declared a protocol version other than ours.
    #[error("protocol version mismatch: got {major}.{minor}, expected {expected_major}.{expected_minor}")]
    VersionMismatch {
        major: u8,
        minor: u8,
        expected_major: u8,
        expected_minor: u8,
    },

    /// The leading class index is not in the registry.
    #[error("unregistered class index {0}")]
    UnregisteredClass(ClassIndex),

    /// The bytes belong to a different class than the instance peeking them.
    #[error("class mismatch: instance is {expected}, buffer holds {found}")]
    ClassMismatch {
        expected: ClassIndex,
        found: ClassIndex,
    },

    /// A peek required header fields the buffer does not carry.
    #[error("required header fields missing: {0:?}")]
    MissingField(NetFlags),

    /// A length-prefixed string was not valid UTF-8.
    #[error("string field is not valid utf-8")]
    InvalidString,

    /// A length or count prefix is implausible for the bytes that follow.
    #[error("invalid length {len} for {field}")]
    InvalidLength { field: &'static str, len: usize },

    /// A field is too large for its length prefix.
    #[error("{field} is {len} long, wire limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}
