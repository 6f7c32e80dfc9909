//! The variable-length net message header.
//!
//! ```text
//! [u16 class index]                      (written by NetMessage)
//! [u32 NetFlags]
//! [u8 major][u8 minor]                   if HAS_VERSION
//! [u32 secs][u32 micros]                 if HAS_TIME_SENT
//! [u32 context]                          if HAS_CONTEXT
//! [u32 transaction id]                   if HAS_TRANSACTION_ID
//! [u32 player id]                        if HAS_PLAYER_ID
//! [16 bytes account uuid]                if HAS_ACCT_UUID
//! ```
//!
//! The optional fields live in `Option`s and the presence bits of the flag
//! word are derived from them when poking, so the flag-to-field mapping has
//! exactly one source: [`NetHeader::poke`] and [`NetHeader::peek`] below.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BufMut;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::ContentFlags;
use crate::stream::{put_uuid, WireReader};
use crate::WireError;

/// Protocol major version compiled into this build.
pub const PROTOCOL_VER_MAJOR: u8 = 12;
/// Protocol minor version compiled into this build.
pub const PROTOCOL_VER_MINOR: u8 = 6;

// ---------------------------------------------------------------------------
// NetFlags
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// The header's 32-bit flag word.
    ///
    /// The `HAS_*` bits select optional header fields; the rest are routing
    /// hints carried for the server and the receiving client.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct NetFlags: u32 {
        const HAS_TIME_SENT = 1 << 0;
        const HAS_GAME_MSG_RECEIVERS = 1 << 1;
        const ECHO_BACK_TO_SENDER = 1 << 2;
        const REQUEST_P2P = 1 << 3;
        const ALLOW_TIME_OUT = 1 << 4;
        const INDIRECT_MEMBER = 1 << 5;
        const PUBLIC_IP_CLIENT = 1 << 6;
        const HAS_CONTEXT = 1 << 7;
        const ASK_VAULT_FOR_GAME_STATE = 1 << 8;
        const HAS_TRANSACTION_ID = 1 << 9;
        const NEW_SDL_STATE = 1 << 10;
        const INITIAL_AGE_STATE_REQUEST = 1 << 11;
        const HAS_PLAYER_ID = 1 << 12;
        const USE_RELEVANCE_REGIONS = 1 << 13;
        const HAS_ACCT_UUID = 1 << 14;
        const INTER_AGE_ROUTING = 1 << 15;
        const HAS_VERSION = 1 << 16;
        const IS_SYSTEM_MESSAGE = 1 << 17;
        const NEEDS_RELIABLE_SEND = 1 << 18;
        const ROUTE_TO_ALL_PLAYERS = 1 << 19;
    }
}

impl NetFlags {
    /// Bits that are derived from which optional fields are present.
    pub const PRESENCE: Self = Self::HAS_VERSION
        .union(Self::HAS_TIME_SENT)
        .union(Self::HAS_CONTEXT)
        .union(Self::HAS_TRANSACTION_ID)
        .union(Self::HAS_PLAYER_ID)
        .union(Self::HAS_ACCT_UUID);
}

// ---------------------------------------------------------------------------
// ProtocolVersion / UnifiedTime
// ---------------------------------------------------------------------------

/// A major/minor protocol version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    /// The version this build speaks.
    pub const CURRENT: Self = Self {
        major: PROTOCOL_VER_MAJOR,
        minor: PROTOCOL_VER_MINOR,
    };
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Wall-clock timestamp as seconds + microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UnifiedTime {
    pub secs: u32,
    pub micros: u32,
}

impl UnifiedTime {
    /// Encoded size in bytes.
    pub const WIRE_LEN: usize = 8;

    pub fn new(secs: u32, micros: u32) -> Self {
        Self { secs, micros }
    }

    /// The current system time. Times before the epoch clamp to zero.
    pub fn now() -> Self {
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: since.as_secs() as u32,
            micros: since.subsec_micros(),
        }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        let secs = secs.max(0.0);
        let whole = secs.trunc();
        Self {
            secs: whole as u32,
            micros: ((secs - whole) * 1_000_000.0) as u32 % 1_000_000,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.micros as f64 / 1_000_000.0
    }

    pub fn poke(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.secs);
        out.put_u32_le(self.micros);
    }

    pub fn peek(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            secs: r.get_u32()?,
            micros: r.get_u32()?,
        })
    }
}

// ---------------------------------------------------------------------------
// NetHeader
// ---------------------------------------------------------------------------

/// Bits of the header's persisted [`ContentFlags`].
mod persisted {
    pub const FLAGS: u32 = 0;
    pub const TIME_SENT: u32 = 1;
    pub const CONTEXT: u32 = 2;
    pub const TRANSACTION_ID: u32 = 3;
    pub const PLAYER_ID: u32 = 4;
    pub const ACCT_UUID: u32 = 5;
}

/// Fields shared by every net message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetHeader {
    /// Non-presence flag bits. Presence bits are derived, see [`Self::flags`].
    flags: NetFlags,
    pub version: Option<ProtocolVersion>,
    pub time_sent: Option<UnifiedTime>,
    pub context: Option<u32>,
    pub transaction_id: Option<u32>,
    pub player_id: Option<u32>,
    pub acct_uuid: Option<Uuid>,
}

impl NetHeader {
    /// A header stamped with this build's protocol version.
    pub fn versioned() -> Self {
        Self {
            version: Some(ProtocolVersion::CURRENT),
            ..Self::default()
        }
    }

    /// The flag word as it goes on the wire.
    pub fn flags(&self) -> NetFlags {
        let mut flags = self.flags;
        flags.set(NetFlags::HAS_VERSION, self.version.is_some());
        flags.set(NetFlags::HAS_TIME_SENT, self.time_sent.is_some());
        flags.set(NetFlags::HAS_CONTEXT, self.context.is_some());
        flags.set(NetFlags::HAS_TRANSACTION_ID, self.transaction_id.is_some());
        flags.set(NetFlags::HAS_PLAYER_ID, self.player_id.is_some());
        flags.set(NetFlags::HAS_ACCT_UUID, self.acct_uuid.is_some());
        flags
    }

    /// Sets routing bits. Presence bits in `flags` are ignored; set the
    /// matching field instead.
    pub fn insert_flags(&mut self, flags: NetFlags) {
        self.flags.insert(flags.difference(NetFlags::PRESENCE));
    }

    pub fn remove_flags(&mut self, flags: NetFlags) {
        self.flags.remove(flags);
    }

    pub fn poke(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.flags().bits());
        if let Some(version) = self.version {
            out.put_u8(version.major);
            out.put_u8(version.minor);
        }
        if let Some(time) = self.time_sent {
            time.poke(out);
        }
        if let Some(context) = self.context {
            out.put_u32_le(context);
        }
        if let Some(trans) = self.transaction_id {
            out.put_u32_le(trans);
        }
        if let Some(player) = self.player_id {
            out.put_u32_le(player);
        }
        if let Some(uuid) = &self.acct_uuid {
            put_uuid(out, uuid);
        }
    }

    /// Reads a header (everything after the class index).
    ///
    /// A declared version that differs from ours aborts the parse; the
    /// rest of the buffer must not be interpreted.
    pub fn peek(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        let word = NetFlags::from_bits_retain(r.get_u32()?);
        let mut header = Self {
            flags: word.difference(NetFlags::PRESENCE),
            ..Self::default()
        };

        if word.contains(NetFlags::HAS_VERSION) {
            let major = r.get_u8()?;
            let minor = r.get_u8()?;
            if major != PROTOCOL_VER_MAJOR || minor != PROTOCOL_VER_MINOR {
                return Err(WireError::VersionMismatch {
                    major,
                    minor,
                    expected_major: PROTOCOL_VER_MAJOR,
                    expected_minor: PROTOCOL_VER_MINOR,
                });
            }
            header.version = Some(ProtocolVersion { major, minor });
        }
        if word.contains(NetFlags::HAS_TIME_SENT) {
            header.time_sent = Some(UnifiedTime::peek(r)?);
        }
        if word.contains(NetFlags::HAS_CONTEXT) {
            header.context = Some(r.get_u32()?);
        }
        if word.contains(NetFlags::HAS_TRANSACTION_ID) {
            header.transaction_id = Some(r.get_u32()?);
        }
        if word.contains(NetFlags::HAS_PLAYER_ID) {
            header.player_id = Some(r.get_u32()?);
        }
        if word.contains(NetFlags::HAS_ACCT_UUID) {
            header.acct_uuid = Some(r.get_uuid()?);
        }
        Ok(header)
    }

    /// Persisted form. The protocol version is not saved: persisted data is
    /// versioned by its content flags, not by the transport protocol.
    pub fn write_version(&self, out: &mut Vec<u8>) {
        let mut content = ContentFlags::new();
        content.set(persisted::FLAGS);
        content.set_if(persisted::TIME_SENT, self.time_sent.is_some());
        content.set_if(persisted::CONTEXT, self.context.is_some());
        content.set_if(persisted::TRANSACTION_ID, self.transaction_id.is_some());
        content.set_if(persisted::PLAYER_ID, self.player_id.is_some());
        content.set_if(persisted::ACCT_UUID, self.acct_uuid.is_some());
        content.write(out);

        out.put_u32_le(self.flags.bits());
        if let Some(time) = self.time_sent {
            time.poke(out);
        }
        if let Some(context) = self.context {
            out.put_u32_le(context);
        }
        if let Some(trans) = self.transaction_id {
            out.put_u32_le(trans);
        }
        if let Some(player) = self.player_id {
            out.put_u32_le(player);
        }
        if let Some(uuid) = &self.acct_uuid {
            put_uuid(out, uuid);
        }
    }

    pub fn read_version(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        let content = ContentFlags::read(r)?;
        let mut header = Self::default();
        if content.is_set(persisted::FLAGS) {
            header.flags = NetFlags::from_bits_retain(r.get_u32()?)
                .difference(NetFlags::PRESENCE);
        }
        if content.is_set(persisted::TIME_SENT) {
            header.time_sent = Some(UnifiedTime::peek(r)?);
        }
        if content.is_set(persisted::CONTEXT) {
            header.context = Some(r.get_u32()?);
        }
        if content.is_set(persisted::TRANSACTION_ID) {
            header.transaction_id = Some(r.get_u32()?);
        }
        if content.is_set(persisted::PLAYER_ID) {
            header.player_id = Some(r.get_u32()?);
        }
        if content.is_set(persisted::ACCT_UUID) {
            header.acct_uuid = Some(r.get_uuid()?);
        }
        Ok(header)
    }
}
