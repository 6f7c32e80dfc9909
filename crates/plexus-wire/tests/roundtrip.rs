//! Property tests for the transient wire format.
//!
//! For every class: poke → create_and_read → poke must reproduce the same
//! bytes, and no prefix of a valid buffer may be accepted.

use plexus_wire::*;
use proptest::prelude::*;
use uuid::Uuid;

// ===========================================================================
// Strategies
// ===========================================================================

fn location() -> impl Strategy<Value = Location> {
    (any::<u32>(), any::<u16>()).prop_map(|(s, f)| Location::new(s, f))
}

fn uoid() -> impl Strategy<Value = Uoid> {
    (
        location(),
        any::<u16>(),
        any::<u32>(),
        "[a-zA-Z0-9_ ]{0,16}",
        proptest::option::of((any::<u16>(), any::<u32>())),
    )
        .prop_map(|(location, class_type, object_id, object_name, clone)| Uoid {
            location,
            class_type,
            object_id,
            object_name,
            clone: clone.map(|(clone_id, clone_player_id)| CloneId {
                clone_id,
                clone_player_id,
            }),
        })
}

fn compression() -> impl Strategy<Value = Compression> {
    prop_oneof![
        Just(Compression::None),
        Just(Compression::Failed),
        Just(Compression::Zlib),
        Just(Compression::DontCompress),
        (4u8..=255).prop_map(Compression::Other),
    ]
}

fn stream_helper() -> impl Strategy<Value = StreamHelper> {
    (
        any::<u32>(),
        compression(),
        proptest::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(uncompressed_len, compression, data)| StreamHelper {
            uncompressed_len,
            compression,
            data,
        })
}

fn unified_time() -> impl Strategy<Value = UnifiedTime> {
    (any::<u32>(), 0u32..1_000_000).prop_map(|(s, us)| UnifiedTime::new(s, us))
}

fn rooms() -> impl Strategy<Value = RoomsList> {
    proptest::collection::vec((location(), "[a-zA-Z]{0,12}"), 0..6).prop_map(|rooms| RoomsList {
        rooms: rooms
            .into_iter()
            .map(|(location, name)| RoomEntry { location, name })
            .collect(),
    })
}

fn game_message() -> impl Strategy<Value = GameMessage> {
    (stream_helper(), proptest::option::of(unified_time()))
        .prop_map(|(stream, delivery_time)| GameMessage {
            stream,
            delivery_time,
        })
}

fn sdl_state() -> impl Strategy<Value = SdlState> {
    (uoid(), stream_helper(), any::<[bool; 3]>()).prop_map(|(uoid, stream, bools)| SdlState {
        streamed: StreamedObject {
            object: ObjectMsg { uoid },
            stream,
        },
        is_initial_state: bools[0],
        persist_on_server: bools[1],
        is_avatar_state: bools[2],
    })
}

fn player_ids() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(any::<u32>(), 0..8)
}

fn body() -> impl Strategy<Value = NetBody> {
    prop_oneof![
        (rooms(), any::<u8>()).prop_map(|(rooms, bits)| NetBody::from(PagingRoom {
            rooms,
            paging_flags: PagingFlags::from_bits_retain(bits),
        })),
        rooms().prop_map(|rooms| NetBody::from(GameStateRequest { rooms })),
        sdl_state().prop_map(NetBody::from),
        sdl_state().prop_map(|state| NetBody::from(SdlStateBcast { state })),
        game_message().prop_map(NetBody::from),
        (game_message(), player_ids()).prop_map(|(game, receivers)| {
            NetBody::from(GameMessageDirected { game, receivers })
        }),
        (game_message(), uoid(), any::<[bool; 3]>()).prop_map(|(game, uoid, b)| {
            NetBody::from(LoadClone {
                game,
                uoid,
                is_player: b[0],
                is_loading: b[1],
                is_initial_state: b[2],
            })
        }),
        (
            any::<u8>(),
            any::<u8>(),
            player_ids(),
            proptest::collection::vec(any::<u8>(), 0..64)
        )
            .prop_map(|(flags, frames, receivers, data)| NetBody::from(Voice {
                flags,
                frames,
                receivers,
                data,
            })),
        (any::<bool>(), uoid()).prop_map(|(unload, uoid)| NetBody::from(PlayerPage { unload, uoid })),
        Just(NetBody::from(MembersListReq)),
    ]
}

fn header() -> impl Strategy<Value = NetHeader> {
    (
        any::<u32>(),
        any::<bool>(),
        proptest::option::of(unified_time()),
        proptest::option::of(any::<u32>()),
        proptest::option::of(any::<u32>()),
        proptest::option::of(any::<u32>()),
        proptest::option::of(any::<[u8; 16]>()),
    )
        .prop_map(|(bits, versioned, time_sent, context, trans, player, uuid)| {
            let mut header = if versioned {
                NetHeader::versioned()
            } else {
                NetHeader::default()
            };
            header.insert_flags(NetFlags::from_bits_retain(bits));
            header.time_sent = time_sent;
            header.context = context;
            header.transaction_id = trans;
            header.player_id = player;
            header.acct_uuid = uuid.map(Uuid::from_bytes);
            header
        })
}

fn message() -> impl Strategy<Value = NetMessage> {
    (header(), body()).prop_map(|(header, body)| NetMessage::with_header(header, body))
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #[test]
    fn poke_peek_poke_is_identical(msg in message()) {
        let registry = NetMessageRegistry::with_builtin();
        let mut first = Vec::new();
        let written = msg.poke_buffer(&mut first);
        prop_assert_eq!(written, first.len());

        let read = registry.create_and_read(&first).expect("valid buffer");
        prop_assert_eq!(&read.header, &msg.header);
        prop_assert_eq!(&read.body, &msg.body);

        let mut second = Vec::new();
        read.poke_buffer(&mut second);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn peek_consumes_exactly_what_poke_wrote(msg in message(), trailing in proptest::collection::vec(any::<u8>(), 0..8)) {
        let mut bytes = msg.encode().unwrap();
        let len = bytes.len();
        bytes.extend_from_slice(&trailing);

        let mut read = NetMessage::new(msg.body.clone());
        prop_assert_eq!(read.peek_buffer(&bytes, PeekOptions::forced()), len);
    }

    #[test]
    fn truncated_buffers_are_rejected(msg in message(), cut in any::<prop::sample::Index>()) {
        let registry = NetMessageRegistry::with_builtin();
        let bytes = msg.encode().unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(registry.create_and_read(&bytes[..cut]).is_none());
    }

    #[test]
    fn random_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let registry = NetMessageRegistry::with_builtin();
        let _ = registry.create_and_read(&bytes);
        let _ = registry.create_and_read_version(&bytes);
    }
}

// ===========================================================================
// Edge cases
// ===========================================================================

#[test]
fn test_empty_buffer_is_none() {
    let registry = NetMessageRegistry::with_builtin();
    assert!(registry.create_and_read(&[]).is_none());
    assert!(registry.create_and_read(&[0x20]).is_none());
}

#[test]
fn test_unregistered_class_is_none() {
    let registry = NetMessageRegistry::with_builtin();
    let mut bytes = NetMessage::new(MembersListReq.into()).encode().unwrap();
    bytes[0] = 0x77;
    bytes[1] = 0x77;
    assert_eq!(
        registry.try_create_and_read(&bytes).unwrap_err(),
        WireError::UnregisteredClass(ClassIndex(0x7777))
    );
    assert!(registry.create_and_read(&bytes).is_none());
}

#[test]
fn test_version_mismatch_is_rejected() {
    let registry = NetMessageRegistry::with_builtin();
    let mut header = NetHeader::versioned();
    header.version = Some(ProtocolVersion {
        major: PROTOCOL_VER_MAJOR,
        minor: PROTOCOL_VER_MINOR + 1,
    });
    let msg = NetMessage::with_header(header, GameMessage::new(vec![1]).into());
    let bytes = msg.encode().unwrap();

    assert!(registry.create_and_read(&bytes).is_none());
    let mut read = NetMessage::new(GameMessage::default().into());
    assert_eq!(read.peek_buffer(&bytes, PeekOptions::default()), 0);
}

#[test]
fn test_current_version_is_accepted() {
    let registry = NetMessageRegistry::with_builtin();
    let msg = NetMessage::with_header(NetHeader::versioned(), MembersListReq.into());
    let bytes = msg.encode().unwrap();
    let read = registry.create_and_read(&bytes).unwrap();
    assert_eq!(read.header.version, Some(ProtocolVersion::CURRENT));
    assert!(read.header.flags().contains(NetFlags::HAS_VERSION));
}

#[test]
fn test_forged_receiver_count_is_rejected() {
    let registry = NetMessageRegistry::with_builtin();
    let msg = NetMessage::new(
        GameMessageDirected {
            game: GameMessage::default(),
            receivers: vec![1],
        }
        .into(),
    );
    let mut bytes = msg.encode().unwrap();
    // Count byte sits right before the single 4-byte receiver id.
    let count_at = bytes.len() - 5;
    bytes[count_at] = 200;
    assert!(registry.create_and_read(&bytes).is_none());
}
