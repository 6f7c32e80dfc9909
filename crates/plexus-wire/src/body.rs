//! The closed set of message bodies the registry can construct.

use crate::game::{GameMessage, GameMessageDirected, LoadClone};
use crate::object::{PlayerPage, SdlState, SdlStateBcast};
use crate::rooms::{GameStateRequest, PagingRoom};
use crate::stream::WireReader;
use crate::voice::{MembersListReq, Voice};
use crate::{ClassIndex, WireError, WireLayer};

/// A concrete message body, one variant per registered class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetBody {
    PagingRoom(PagingRoom),
    GameStateRequest(GameStateRequest),
    SdlState(SdlState),
    SdlStateBcast(SdlStateBcast),
    GameMessage(GameMessage),
    GameMessageDirected(GameMessageDirected),
    LoadClone(LoadClone),
    Voice(Voice),
    PlayerPage(PlayerPage),
    MembersListReq(MembersListReq),
}

/// Expands `$body` once per variant with `$inner` bound to the payload.
macro_rules! each_variant {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            NetBody::PagingRoom($inner) => $body,
            NetBody::GameStateRequest($inner) => $body,
            NetBody::SdlState($inner) => $body,
            NetBody::SdlStateBcast($inner) => $body,
            NetBody::GameMessage($inner) => $body,
            NetBody::GameMessageDirected($inner) => $body,
            NetBody::LoadClone($inner) => $body,
            NetBody::Voice($inner) => $body,
            NetBody::PlayerPage($inner) => $body,
            NetBody::MembersListReq($inner) => $body,
        }
    };
}

impl NetBody {
    pub fn class_index(&self) -> ClassIndex {
        match self {
            NetBody::PagingRoom(_) => ClassIndex::PAGING_ROOM,
            NetBody::GameStateRequest(_) => ClassIndex::GAME_STATE_REQUEST,
            NetBody::SdlState(_) => ClassIndex::SDL_STATE,
            NetBody::SdlStateBcast(_) => ClassIndex::SDL_STATE_BCAST,
            NetBody::GameMessage(_) => ClassIndex::GAME_MESSAGE,
            NetBody::GameMessageDirected(_) => ClassIndex::GAME_MESSAGE_DIRECTED,
            NetBody::LoadClone(_) => ClassIndex::LOAD_CLONE,
            NetBody::Voice(_) => ClassIndex::VOICE,
            NetBody::PlayerPage(_) => ClassIndex::PLAYER_PAGE,
            NetBody::MembersListReq(_) => ClassIndex::MEMBERS_LIST_REQ,
        }
    }

    /// Class name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            NetBody::PagingRoom(_) => "PagingRoom",
            NetBody::GameStateRequest(_) => "GameStateRequest",
            NetBody::SdlState(_) => "SdlState",
            NetBody::SdlStateBcast(_) => "SdlStateBcast",
            NetBody::GameMessage(_) => "GameMessage",
            NetBody::GameMessageDirected(_) => "GameMessageDirected",
            NetBody::LoadClone(_) => "LoadClone",
            NetBody::Voice(_) => "Voice",
            NetBody::PlayerPage(_) => "PlayerPage",
            NetBody::MembersListReq(_) => "MembersListReq",
        }
    }

    /// The game-message layer, for the three classes built on it.
    pub fn game_message(&self) -> Option<&GameMessage> {
        match self {
            NetBody::GameMessage(msg) => Some(msg),
            NetBody::GameMessageDirected(msg) => Some(&msg.game),
            NetBody::LoadClone(msg) => Some(&msg.game),
            _ => None,
        }
    }
}

impl WireLayer for NetBody {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        each_variant!(self, inner => inner.poke(out))
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        each_variant!(self, inner => inner.peek(r))
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        each_variant!(self, inner => inner.write_version(out))
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        each_variant!(self, inner => inner.read_version(r))
    }
}

macro_rules! impl_from_body {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for NetBody {
                fn from(body: $variant) -> Self {
                    NetBody::$variant(body)
                }
            }
        )*
    };
}

impl_from_body!(
    PagingRoom,
    GameStateRequest,
    SdlState,
    SdlStateBcast,
    GameMessage,
    GameMessageDirected,
    LoadClone,
    Voice,
    PlayerPage,
    MembersListReq,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_message_layer_is_shared() {
        let directed = NetBody::from(GameMessageDirected {
            game: GameMessage::new(vec![3]),
            receivers: vec![1],
        });
        assert_eq!(
            directed.game_message().map(|g| g.stream.data.clone()),
            Some(vec![3])
        );
        assert!(NetBody::from(MembersListReq).game_message().is_none());
    }

    #[test]
    fn test_class_index_matches_variant() {
        let body = NetBody::from(Voice::default());
        assert_eq!(body.class_index(), ClassIndex::VOICE);
        assert_eq!(body.name(), "Voice");
    }
}
