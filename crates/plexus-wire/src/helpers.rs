//! Field groups shared by several message classes.
//!
//! These are not messages on their own. They are written inline by the
//! layers that embed them, in both the transient and persisted formats.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::stream::{put_string, WireReader};
use crate::WireError;

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Identifies a loadable room/page: a sequence number plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub sequence: u32,
    pub flags: u16,
}

impl Location {
    pub const WIRE_LEN: usize = 6;

    pub fn new(sequence: u32, flags: u16) -> Self {
        Self { sequence, flags }
    }

    pub fn poke(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.sequence);
        out.put_u16_le(self.flags);
    }

    pub fn peek(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            sequence: r.get_u32()?,
            flags: r.get_u16()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Uoid
// ---------------------------------------------------------------------------

/// Clone identity attached to a [`Uoid`] for spawned copies of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloneId {
    pub clone_id: u16,
    pub clone_player_id: u32,
}

/// Unique object id: where an object lives, what it is, and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Uoid {
    pub location: Location,
    pub class_type: u16,
    pub object_id: u32,
    pub object_name: String,
    pub clone: Option<CloneId>,
}

const UOID_HAS_CLONE_IDS: u8 = 0x01;

impl Uoid {
    /// Smallest possible encoding (no clone ids, empty name).
    pub const MIN_WIRE_LEN: usize = 1 + Location::WIRE_LEN + 2 + 4 + 2;

    pub fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let contents = if self.clone.is_some() {
            UOID_HAS_CLONE_IDS
        } else {
            0
        };
        out.put_u8(contents);
        self.location.poke(out);
        out.put_u16_le(self.class_type);
        out.put_u32_le(self.object_id);
        put_string(out, &self.object_name, "object name")?;
        if let Some(clone) = self.clone {
            out.put_u16_le(clone.clone_id);
            out.put_u32_le(clone.clone_player_id);
        }
        Ok(())
    }

    pub fn peek(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        let contents = r.get_u8()?;
        let location = Location::peek(r)?;
        let class_type = r.get_u16()?;
        let object_id = r.get_u32()?;
        let object_name = r.get_string()?;
        let clone = if contents & UOID_HAS_CLONE_IDS != 0 {
            Some(CloneId {
                clone_id: r.get_u16()?,
                clone_player_id: r.get_u32()?,
            })
        } else {
            None
        };
        Ok(Self {
            location,
            class_type,
            object_id,
            object_name,
            clone,
        })
    }
}

// ---------------------------------------------------------------------------
// StreamHelper
// ---------------------------------------------------------------------------

/// How the bytes in a [`StreamHelper`] are packed.
///
/// The codec does not compress or decompress; it carries the tag so the
/// application layer can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    None,
    Failed,
    Zlib,
    DontCompress,
    /// A tag this build does not know; kept so re-poking is lossless.
    Other(u8),
}

impl Compression {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Failed => 1,
            Self::Zlib => 2,
            Self::DontCompress => 3,
            Self::Other(b) => b,
        }
    }

    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::None,
            1 => Self::Failed,
            2 => Self::Zlib,
            3 => Self::DontCompress,
            other => Self::Other(other),
        }
    }
}

/// An opaque, length-prefixed blob of application bytes.
///
/// ```text
/// [u32 uncompressed length][u8 compression][u32 stream length][bytes]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StreamHelper {
    pub uncompressed_len: u32,
    pub compression: Compression,
    pub data: Vec<u8>,
}

impl StreamHelper {
    pub const MIN_WIRE_LEN: usize = 4 + 1 + 4;

    /// Wraps uncompressed bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            uncompressed_len: data.len() as u32,
            compression: Compression::None,
            data,
        }
    }

    pub fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let len = u32::try_from(self.data.len()).map_err(|_| {
            WireError::FieldTooLong {
                field: "stream",
                len: self.data.len(),
                max: u32::MAX as usize,
            }
        })?;
        out.put_u32_le(self.uncompressed_len);
        out.put_u8(self.compression.to_byte());
        out.put_u32_le(len);
        out.put_slice(&self.data);
        Ok(())
    }

    pub fn peek(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        let uncompressed_len = r.get_u32()?;
        let compression = Compression::from_byte(r.get_u8()?);
        let len = r.get_u32()? as usize;
        let data = r.get_bytes(len)?.to_vec();
        Ok(Self {
            uncompressed_len,
            compression,
            data,
        })
    }
}
