//! Binary wire protocol for Plexus net messages.
//!
//! This crate defines how a message looks on the network and on disk:
//!
//! - **Header** ([`NetHeader`], [`NetFlags`]): the variable-length prefix
//!   shared by every class. Optional fields are selected by flag bits.
//! - **Bodies** ([`NetBody`] and the layer structs): each class is a stack
//!   of layers written base first. See [`WireLayer`].
//! - **Messages** ([`NetMessage`]): class index + header + body, in the
//!   transient format (`poke_buffer`/`peek_buffer`) and the persisted
//!   format (`write_version`/`read_version`).
//! - **Registry** ([`NetMessageRegistry`]): turns raw bytes back into a
//!   message by looking up the leading [`ClassIndex`].
//!
//! # Architecture
//!
//! The wire layer knows nothing about dispatch or connections. It only
//! turns messages into bytes and back.
//!
//! ```text
//! Dispatcher (Message) → Bridge → Wire (NetMessage ↔ bytes) → Transport
//! ```
//!
//! All multi-byte integers are little-endian.

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod body;
mod content;
mod error;
mod game;
mod header;
mod helpers;
mod layer;
mod message;
mod object;
mod registry;
mod rooms;
mod stream;
mod voice;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use body::NetBody;
pub use content::ContentFlags;
pub use error::WireError;
pub use game::{GameMessage, GameMessageDirected, LoadClone};
pub use header::{
    NetFlags, NetHeader, ProtocolVersion, UnifiedTime, PROTOCOL_VER_MAJOR, PROTOCOL_VER_MINOR,
};
pub use helpers::{CloneId, Compression, Location, StreamHelper, Uoid};
pub use layer::WireLayer;
pub use message::{NetMessage, PeekOptions, PeekStatus};
pub use object::{ObjectMsg, PlayerPage, SdlState, SdlStateBcast, StreamedObject};
pub use registry::{BodyConstructor, ClassIndex, NetMessageRegistry};
pub use rooms::{GameStateRequest, PagingFlags, PagingRoom, RoomEntry, RoomsList};
pub use stream::{WireReader, MAX_STRING_LEN};
pub use voice::{MembersListReq, Voice};
