//! Class indices and the constructor registry used to rebuild messages
//! from bytes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::{GameMessage, GameMessageDirected, LoadClone};
use crate::message::{NetMessage, PeekOptions};
use crate::object::{PlayerPage, SdlState, SdlStateBcast};
use crate::rooms::{GameStateRequest, PagingRoom};
use crate::stream::WireReader;
use crate::voice::{MembersListReq, Voice};
use crate::{NetBody, WireError};

// ---------------------------------------------------------------------------
// ClassIndex
// ---------------------------------------------------------------------------

/// Stable numeric identifier of a message class. It is the first field of
/// every buffer, so its values must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassIndex(pub u16);

impl ClassIndex {
    pub const PAGING_ROOM: Self = Self(0x0101);
    pub const GAME_STATE_REQUEST: Self = Self(0x0102);
    pub const SDL_STATE: Self = Self(0x0110);
    pub const SDL_STATE_BCAST: Self = Self(0x0111);
    pub const GAME_MESSAGE: Self = Self(0x0120);
    pub const GAME_MESSAGE_DIRECTED: Self = Self(0x0121);
    pub const LOAD_CLONE: Self = Self(0x0122);
    pub const VOICE: Self = Self(0x0130);
    pub const PLAYER_PAGE: Self = Self(0x0140);
    pub const MEMBERS_LIST_REQ: Self = Self(0x0150);
}

impl fmt::Display for ClassIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// NetMessageRegistry
// ---------------------------------------------------------------------------

/// Builds an empty body of one class.
pub type BodyConstructor = fn() -> NetBody;

/// Class index → constructor table.
///
/// A buffer can only be turned back into a message if its leading class
/// index is registered here.
#[derive(Debug, Clone, Default)]
pub struct NetMessageRegistry {
    constructors: HashMap<ClassIndex, BodyConstructor>,
}

impl NetMessageRegistry {
    /// An empty registry. Nothing can be reconstructed until classes are
    /// registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in class.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ClassIndex::PAGING_ROOM, || PagingRoom::default().into());
        registry.register(ClassIndex::GAME_STATE_REQUEST, || {
            GameStateRequest::default().into()
        });
        registry.register(ClassIndex::SDL_STATE, || SdlState::default().into());
        registry.register(ClassIndex::SDL_STATE_BCAST, || {
            SdlStateBcast::default().into()
        });
        registry.register(ClassIndex::GAME_MESSAGE, || GameMessage::default().into());
        registry.register(ClassIndex::GAME_MESSAGE_DIRECTED, || {
            GameMessageDirected::default().into()
        });
        registry.register(ClassIndex::LOAD_CLONE, || LoadClone::default().into());
        registry.register(ClassIndex::VOICE, || Voice::default().into());
        registry.register(ClassIndex::PLAYER_PAGE, || PlayerPage::default().into());
        registry.register(ClassIndex::MEMBERS_LIST_REQ, || MembersListReq.into());
        registry
    }

    /// Registers (or replaces) the constructor for `class`.
    pub fn register(&mut self, class: ClassIndex, constructor: BodyConstructor) {
        if self.constructors.insert(class, constructor).is_some() {
            tracing::debug!(%class, "replaced class constructor");
        }
    }

    /// Returns true if `class` was registered.
    pub fn unregister(&mut self, class: ClassIndex) -> bool {
        self.constructors.remove(&class).is_some()
    }

    pub fn is_registered(&self, class: ClassIndex) -> bool {
        self.constructors.contains_key(&class)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// A fresh, unpeeked message of `class`.
    pub fn create(&self, class: ClassIndex) -> Option<NetMessage> {
        let constructor = self.constructors.get(&class)?;
        Some(NetMessage::new(constructor()))
    }

    /// Reconstructs a message from a transient buffer.
    ///
    /// Returns `None` for an empty or truncated buffer, an unregistered
    /// class, or a protocol version mismatch.
    pub fn create_and_read(&self, bytes: &[u8]) -> Option<NetMessage> {
        match self.try_create_and_read(bytes) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, len = bytes.len(), "dropping unreadable buffer");
                None
            }
        }
    }

    /// [`Self::create_and_read`] with the failure reason kept.
    pub fn try_create_and_read(&self, bytes: &[u8]) -> Result<NetMessage, WireError> {
        let mut msg = self.create_for(bytes)?;
        msg.decode_with(bytes, PeekOptions::default())?;
        Ok(msg)
    }

    /// Reconstructs a message from the persisted format.
    pub fn create_and_read_version(&self, bytes: &[u8]) -> Option<NetMessage> {
        let result = self.create_for(bytes).and_then(|mut msg| {
            msg.read_version(bytes)?;
            Ok(msg)
        });
        match result {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, len = bytes.len(), "dropping unreadable persisted message");
                None
            }
        }
    }

    /// Instantiates the class named by the buffer's leading index.
    fn create_for(&self, bytes: &[u8]) -> Result<NetMessage, WireError> {
        let class = ClassIndex(WireReader::new(bytes).get_u16()?);
        self.create(class)
            .ok_or(WireError::UnregisteredClass(class))
    }
}
