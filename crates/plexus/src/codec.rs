//! Turning dispatch [`Message`]s into game-message streams and back.
//!
//! The stream inside a [`GameMessage`] is:
//!
//! ```text
//! [u16 class][u32 broadcast flags][u8 has_sender][u32 sender]?[payload…]
//! ```
//!
//! A scheduled timestamp travels in the game message's delivery time.
//! Explicit receivers travel as the key list of a
//! [`GameMessageDirected`]. The payload bytes are whatever the class's
//! registered [`WirePayload`] writes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::BufMut;
use plexus_dispatch::{
    BroadcastFlags, Message, MessageKind, MsgClass, ReceiverDirectory, ReceiverKey,
};
use plexus_wire::{GameMessage, GameMessageDirected, NetBody, UnifiedTime, WireError, WireReader};

use crate::PlexusError;

/// A payload type that can cross the network.
pub trait WirePayload: MessageKind + Sized {
    fn encode_payload(&self, out: &mut Vec<u8>) -> Result<(), WireError>;

    /// Reads the payload back. Trailing bytes are left unread.
    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, WireError>;
}

type Payload = Arc<dyn Any + Send + Sync>;
type EncodeFn = fn(&(dyn Any + Send + Sync), &mut Vec<u8>) -> Option<Result<(), WireError>>;
type DecodeFn = fn(&mut WireReader<'_>) -> Result<Payload, WireError>;

#[derive(Clone, Copy)]
struct PayloadCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

fn encode_erased<T: WirePayload>(
    payload: &(dyn Any + Send + Sync),
    out: &mut Vec<u8>,
) -> Option<Result<(), WireError>> {
    payload.downcast_ref::<T>().map(|p| p.encode_payload(out))
}

fn decode_erased<T: WirePayload>(r: &mut WireReader<'_>) -> Result<Payload, WireError> {
    Ok(Arc::new(T::decode_payload(r)?))
}

fn encode_signal(payload: &(dyn Any + Send + Sync), _out: &mut Vec<u8>) -> Option<Result<(), WireError>> {
    payload.is::<()>().then_some(Ok(()))
}

fn decode_signal(_r: &mut WireReader<'_>) -> Result<Payload, WireError> {
    Ok(Arc::new(()))
}

/// Per-class payload codecs. Only registered classes can be propagated.
#[derive(Clone, Default)]
pub struct PayloadCodecs {
    codecs: HashMap<MsgClass, PayloadCodec>,
}

impl PayloadCodecs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` for `T::CLASS`, replacing any earlier codec.
    pub fn register<T: WirePayload>(&mut self) -> &mut Self {
        self.insert(
            T::CLASS,
            PayloadCodec {
                encode: encode_erased::<T>,
                decode: decode_erased::<T>,
            },
        )
    }

    /// Registers a class whose messages carry no payload
    /// (built with [`Message::signal`]).
    pub fn register_signal(&mut self, class: MsgClass) -> &mut Self {
        self.insert(
            class,
            PayloadCodec {
                encode: encode_signal,
                decode: decode_signal,
            },
        )
    }

    fn insert(&mut self, class: MsgClass, codec: PayloadCodec) -> &mut Self {
        if self.codecs.insert(class, codec).is_some() {
            tracing::debug!(%class, "replaced payload codec");
        }
        self
    }

    pub fn contains(&self, class: MsgClass) -> bool {
        self.codecs.contains_key(&class)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    fn get(&self, class: MsgClass) -> Result<PayloadCodec, PlexusError> {
        self.codecs
            .get(&class)
            .copied()
            .ok_or(PlexusError::UnknownPayload(class))
    }
}

/// Streams `msg` into a net body: a [`GameMessageDirected`] when it names
/// receivers and is not a broadcast, a plain [`GameMessage`] otherwise.
pub fn encode_message(msg: &Message, codecs: &PayloadCodecs) -> Result<NetBody, PlexusError> {
    let class = msg.class();
    let codec = codecs.get(class)?;

    let mut stream = Vec::new();
    stream.put_u16_le(class.0);
    stream.put_u32_le(msg.flags().bits());
    match msg.sender() {
        Some(sender) => {
            stream.put_u8(1);
            stream.put_u32_le(sender.0);
        }
        None => stream.put_u8(0),
    }
    (codec.encode)(msg.payload_any(), &mut stream).ok_or(PlexusError::PayloadType(class))??;

    let mut game = GameMessage::new(stream);
    if msg.timestamp() > 0.0 {
        game.delivery_time = Some(UnifiedTime::from_secs_f64(msg.timestamp()));
    }

    let directed = !msg.has_flags(BroadcastFlags::BCAST_BY_EXACT_TYPE) && !msg.receivers().is_empty();
    Ok(if directed {
        NetBody::GameMessageDirected(GameMessageDirected {
            game,
            receivers: msg.receivers().iter().map(|h| h.key().0).collect(),
        })
    } else {
        NetBody::GameMessage(game)
    })
}

/// Rebuilds a message from a received body.
///
/// Receiver keys the directory does not know (or whose receivers are gone)
/// are dropped from the address list.
pub fn decode_message(
    body: &NetBody,
    codecs: &PayloadCodecs,
    directory: &ReceiverDirectory,
) -> Result<Message, PlexusError> {
    let (game, receivers): (&GameMessage, &[u32]) = match body {
        NetBody::GameMessage(game) => (game, &[]),
        NetBody::GameMessageDirected(directed) => (&directed.game, &directed.receivers),
        other => return Err(PlexusError::NotAGameMessage(other.name())),
    };

    let mut r = WireReader::new(&game.stream.data);
    let class = MsgClass(r.get_u16()?);
    let flags = BroadcastFlags::from_bits_retain(r.get_u32()?);
    let sender = match r.get_u8()? {
        0 => None,
        _ => Some(ReceiverKey(r.get_u32()?)),
    };
    let payload = (codecs.get(class)?.decode)(&mut r)?;
    if r.remaining() > 0 {
        tracing::debug!(%class, trailing = r.remaining(), "ignoring trailing payload bytes");
    }

    let mut msg = Message::from_parts(class, payload).with_flags(flags);
    if let Some(sender) = sender {
        msg = msg.sent_by(sender);
    }
    if let Some(at) = game.delivery_time {
        msg = msg.at(at.as_secs_f64());
    }
    for &key in receivers {
        match directory.handle(ReceiverKey(key)) {
            Some(handle) => msg = msg.to(handle),
            None => tracing::debug!(%class, key, "unknown receiver key, skipping"),
        }
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_dispatch::{Dispatcher, MessageRef, Receiver};

    #[derive(Debug, PartialEq)]
    struct Chat {
        text: String,
    }

    impl MessageKind for Chat {
        const CLASS: MsgClass = MsgClass(0x0500);
    }

    impl WirePayload for Chat {
        fn encode_payload(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
            out.put_u16_le(self.text.len() as u16);
            out.put_slice(self.text.as_bytes());
            Ok(())
        }

        fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, WireError> {
            Ok(Self {
                text: r.get_string()?,
            })
        }
    }

    struct Nop;

    impl Receiver for Nop {
        fn msg_receive(&self, _msg: &MessageRef, _d: &Dispatcher) -> bool {
            true
        }
    }

    const PING: MsgClass = MsgClass(0x0501);

    fn codecs() -> PayloadCodecs {
        let mut codecs = PayloadCodecs::new();
        codecs.register::<Chat>().register_signal(PING);
        codecs
    }

    #[test]
    fn test_broadcast_becomes_plain_game_message() {
        let msg = Message::new(Chat { text: "hi".into() })
            .broadcast()
            .sent_by(ReceiverKey(9));
        let body = encode_message(&msg, &codecs()).unwrap();
        let NetBody::GameMessage(game) = &body else {
            panic!("expected a plain game message, got {}", body.name());
        };
        assert!(game.delivery_time.is_none());

        let back = decode_message(&body, &codecs(), &ReceiverDirectory::new()).unwrap();
        assert_eq!(back.class(), Chat::CLASS);
        assert_eq!(back.flags(), msg.flags());
        assert_eq!(back.sender(), Some(ReceiverKey(9)));
        assert_eq!(back.payload::<Chat>(), Some(&Chat { text: "hi".into() }));
    }

    #[test]
    fn test_addressed_message_is_directed() {
        let directory = ReceiverDirectory::new();
        let nop = Arc::new(Nop);
        let known = directory.insert(ReceiverKey(4), &nop);
        let msg = Message::signal(PING)
            .to(known)
            .to(plexus_dispatch::ReceiverHandle::new(ReceiverKey(5), &nop));

        let body = encode_message(&msg, &codecs()).unwrap();
        let NetBody::GameMessageDirected(directed) = &body else {
            panic!("expected a directed game message");
        };
        assert_eq!(directed.receivers, vec![4, 5]);

        // Key 5 is not in the directory.
        let back = decode_message(&body, &codecs(), &directory).unwrap();
        let keys: Vec<_> = back.receivers().iter().map(|h| h.key()).collect();
        assert_eq!(keys, vec![ReceiverKey(4)]);
        assert!(back.payload::<()>().is_some());
    }

    #[test]
    fn test_timestamp_rides_in_delivery_time() {
        let msg = Message::signal(PING).broadcast().at(12.25);
        let body = encode_message(&msg, &codecs()).unwrap();
        assert_eq!(
            body.game_message().and_then(|g| g.delivery_time),
            Some(UnifiedTime::new(12, 250_000))
        );
        let back = decode_message(&body, &codecs(), &ReceiverDirectory::new()).unwrap();
        assert_eq!(back.timestamp(), 12.25);
    }

    #[test]
    fn test_unregistered_class_is_rejected() {
        let msg = Message::signal(MsgClass(0x0999)).broadcast();
        assert!(matches!(
            encode_message(&msg, &codecs()),
            Err(PlexusError::UnknownPayload(MsgClass(0x0999)))
        ));
    }

    #[test]
    fn test_payload_type_mismatch_is_rejected() {
        let msg = Message::from_parts(Chat::CLASS, Arc::new(17u32)).broadcast();
        assert!(matches!(
            encode_message(&msg, &codecs()),
            Err(PlexusError::PayloadType(_))
        ));
    }

    #[test]
    fn test_truncated_stream_is_wire_error() {
        let body = NetBody::GameMessage(GameMessage::new(vec![0x00, 0x05, 0x00]));
        assert!(matches!(
            decode_message(&body, &codecs(), &ReceiverDirectory::new()),
            Err(PlexusError::Wire(WireError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_non_game_body_is_rejected() {
        let body = NetBody::MembersListReq(plexus_wire::MembersListReq);
        assert!(matches!(
            decode_message(&body, &codecs(), &ReceiverDirectory::new()),
            Err(PlexusError::NotAGameMessage(_))
        ));
    }
}
