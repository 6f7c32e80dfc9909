//! Game messages: a dispatcher message streamed over the network.
//!
//! ```text
//! GameMessage ── GameMessageDirected
//!      └──────── LoadClone
//! ```

use bytes::BufMut;

use crate::content::ContentFlags;
use crate::header::UnifiedTime;
use crate::helpers::{StreamHelper, Uoid};
use crate::stream::{put_bool, put_count_u8, WireReader};
use crate::{WireError, WireLayer};

mod game_bits {
    pub const STREAM: u32 = 0;
    pub const DELIVERY_TIME: u32 = 1;
}

/// An application message, already streamed to bytes by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameMessage {
    pub stream: StreamHelper,
    /// When the receiver should deliver it, if not immediately.
    pub delivery_time: Option<UnifiedTime>,
}

impl GameMessage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            stream: StreamHelper::from_bytes(bytes),
            delivery_time: None,
        }
    }
}

impl WireLayer for GameMessage {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.stream.poke(out)?;
        match self.delivery_time {
            Some(time) => {
                out.put_u8(1);
                time.poke(out);
            }
            None => out.put_u8(0),
        }
        Ok(())
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.stream = StreamHelper::peek(r)?;
        self.delivery_time = if r.get_bool()? {
            Some(UnifiedTime::peek(r)?)
        } else {
            None
        };
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let mut content = ContentFlags::new();
        content.set(game_bits::STREAM);
        content.set_if(game_bits::DELIVERY_TIME, self.delivery_time.is_some());
        content.write(out);
        self.stream.poke(out)?;
        if let Some(time) = self.delivery_time {
            time.poke(out);
        }
        Ok(())
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        let content = ContentFlags::read(r)?;
        self.stream = if content.is_set(game_bits::STREAM) {
            StreamHelper::peek(r)?
        } else {
            StreamHelper::default()
        };
        self.delivery_time = if content.is_set(game_bits::DELIVERY_TIME) {
            Some(UnifiedTime::peek(r)?)
        } else {
            None
        };
        Ok(())
    }
}

fn poke_player_ids(out: &mut Vec<u8>, ids: &[u32]) -> Result<(), WireError> {
    put_count_u8(out, ids.len(), "receivers")?;
    for id in ids {
        out.put_u32_le(*id);
    }
    Ok(())
}

fn peek_player_ids(r: &mut WireReader<'_>) -> Result<Vec<u32>, WireError> {
    let count = r.get_count(true, 4, "receivers")?;
    (0..count).map(|_| r.get_u32()).collect()
}

/// A game message addressed to specific players instead of everyone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameMessageDirected {
    pub game: GameMessage,
    pub receivers: Vec<u32>,
}

impl WireLayer for GameMessageDirected {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.game.poke(out)?;
        poke_player_ids(out, &self.receivers)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.game.peek(r)?;
        self.receivers = peek_player_ids(r)?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.game.write_version(out)?;
        let mut content = ContentFlags::new();
        content.set(0);
        content.write(out);
        poke_player_ids(out, &self.receivers)
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.game.read_version(r)?;
        let content = ContentFlags::read(r)?;
        self.receivers = if content.is_set(0) {
            peek_player_ids(r)?
        } else {
            Vec::new()
        };
        Ok(())
    }
}

mod clone_bits {
    pub const UOID: u32 = 0;
    pub const IS_PLAYER: u32 = 1;
    pub const IS_LOADING: u32 = 2;
    pub const IS_INITIAL_STATE: u32 = 3;
}

/// Spawns or removes a clone of an object on every client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadClone {
    pub game: GameMessage,
    pub uoid: Uoid,
    pub is_player: bool,
    pub is_loading: bool,
    pub is_initial_state: bool,
}

impl Default for LoadClone {
    fn default() -> Self {
        Self {
            game: GameMessage::default(),
            uoid: Uoid::default(),
            is_player: true,
            is_loading: true,
            is_initial_state: false,
        }
    }
}

impl WireLayer for LoadClone {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.game.poke(out)?;
        self.uoid.poke(out)?;
        put_bool(out, self.is_player);
        put_bool(out, self.is_loading);
        put_bool(out, self.is_initial_state);
        Ok(())
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.game.peek(r)?;
        self.uoid = Uoid::peek(r)?;
        self.is_player = r.get_bool()?;
        self.is_loading = r.get_bool()?;
        self.is_initial_state = r.get_bool()?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.game.write_version(out)?;
        let mut content = ContentFlags::new();
        content.set(clone_bits::UOID);
        content.set(clone_bits::IS_PLAYER);
        content.set(clone_bits::IS_LOADING);
        content.set(clone_bits::IS_INITIAL_STATE);
        content.write(out);
        self.uoid.poke(out)?;
        put_bool(out, self.is_player);
        put_bool(out, self.is_loading);
        put_bool(out, self.is_initial_state);
        Ok(())
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.game.read_version(r)?;
        let content = ContentFlags::read(r)?;
        let defaults = Self::default();
        self.uoid = if content.is_set(clone_bits::UOID) {
            Uoid::peek(r)?
        } else {
            defaults.uoid
        };
        self.is_player = if content.is_set(clone_bits::IS_PLAYER) {
            r.get_bool()?
        } else {
            defaults.is_player
        };
        self.is_loading = if content.is_set(clone_bits::IS_LOADING) {
            r.get_bool()?
        } else {
            defaults.is_loading
        };
        self.is_initial_state = if content.is_set(clone_bits::IS_INITIAL_STATE) {
            r.get_bool()?
        } else {
            defaults.is_initial_state
        };
        Ok(())
    }
}
