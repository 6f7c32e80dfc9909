//! Messages about a single scene object.
//!
//! ```text
//! ObjectMsg ── StreamedObject ── SdlState ── SdlStateBcast
//!     └── (PlayerPage embeds a Uoid directly)
//! ```

use crate::content::ContentFlags;
use crate::helpers::{StreamHelper, Uoid};
use crate::stream::{put_bool, WireReader};
use crate::{WireError, WireLayer};

/// Base layer: the object a message is about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectMsg {
    pub uoid: Uoid,
}

impl WireLayer for ObjectMsg {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.uoid.poke(out)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.uoid = Uoid::peek(r)?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let mut content = ContentFlags::new();
        content.set(0);
        content.write(out);
        self.uoid.poke(out)
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        let content = ContentFlags::read(r)?;
        self.uoid = if content.is_set(0) {
            Uoid::peek(r)?
        } else {
            Uoid::default()
        };
        Ok(())
    }
}

/// An object message carrying an opaque stream of state bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamedObject {
    pub object: ObjectMsg,
    pub stream: StreamHelper,
}

impl WireLayer for StreamedObject {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.object.poke(out)?;
        self.stream.poke(out)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.object.peek(r)?;
        self.stream = StreamHelper::peek(r)?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.object.write_version(out)?;
        let mut content = ContentFlags::new();
        content.set(0);
        content.write(out);
        self.stream.poke(out)
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.object.read_version(r)?;
        let content = ContentFlags::read(r)?;
        self.stream = if content.is_set(0) {
            StreamHelper::peek(r)?
        } else {
            StreamHelper::default()
        };
        Ok(())
    }
}

mod sdl_bits {
    pub const IS_INITIAL_STATE: u32 = 0;
    pub const PERSIST_ON_SERVER: u32 = 1;
    pub const IS_AVATAR_STATE: u32 = 2;
}

/// A synchronized-state record for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdlState {
    pub streamed: StreamedObject,
    pub is_initial_state: bool,
    pub persist_on_server: bool,
    pub is_avatar_state: bool,
}

impl Default for SdlState {
    fn default() -> Self {
        Self {
            streamed: StreamedObject::default(),
            is_initial_state: false,
            persist_on_server: true,
            is_avatar_state: false,
        }
    }
}

impl WireLayer for SdlState {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.streamed.poke(out)?;
        put_bool(out, self.is_initial_state);
        put_bool(out, self.persist_on_server);
        put_bool(out, self.is_avatar_state);
        Ok(())
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.streamed.peek(r)?;
        self.is_initial_state = r.get_bool()?;
        self.persist_on_server = r.get_bool()?;
        self.is_avatar_state = r.get_bool()?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.streamed.write_version(out)?;
        let mut content = ContentFlags::new();
        content.set(sdl_bits::IS_INITIAL_STATE);
        content.set(sdl_bits::PERSIST_ON_SERVER);
        content.set(sdl_bits::IS_AVATAR_STATE);
        content.write(out);
        put_bool(out, self.is_initial_state);
        put_bool(out, self.persist_on_server);
        put_bool(out, self.is_avatar_state);
        Ok(())
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.streamed.read_version(r)?;
        let content = ContentFlags::read(r)?;
        let defaults = Self::default();
        self.is_initial_state = if content.is_set(sdl_bits::IS_INITIAL_STATE) {
            r.get_bool()?
        } else {
            defaults.is_initial_state
        };
        self.persist_on_server = if content.is_set(sdl_bits::PERSIST_ON_SERVER) {
            r.get_bool()?
        } else {
            defaults.persist_on_server
        };
        self.is_avatar_state = if content.is_set(sdl_bits::IS_AVATAR_STATE) {
            r.get_bool()?
        } else {
            defaults.is_avatar_state
        };
        Ok(())
    }
}

/// An [`SdlState`] the server rebroadcasts to everyone in the age.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdlStateBcast {
    pub state: SdlState,
}

impl WireLayer for SdlStateBcast {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.state.poke(out)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.state.peek(r)
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.state.write_version(out)?;
        ContentFlags::new().write(out);
        Ok(())
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.state.read_version(r)?;
        ContentFlags::read(r)?;
        Ok(())
    }
}

/// A player's avatar page being loaded or unloaded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerPage {
    pub unload: bool,
    pub uoid: Uoid,
}

impl WireLayer for PlayerPage {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        put_bool(out, self.unload);
        self.uoid.poke(out)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.unload = r.get_bool()?;
        self.uoid = Uoid::peek(r)?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let mut content = ContentFlags::new();
        content.set(0);
        content.set(1);
        content.write(out);
        put_bool(out, self.unload);
        self.uoid.poke(out)
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        let content = ContentFlags::read(r)?;
        self.unload = content.is_set(0) && r.get_bool()?;
        self.uoid = if content.is_set(1) {
            Uoid::peek(r)?
        } else {
            Uoid::default()
        };
        Ok(())
    }
}
