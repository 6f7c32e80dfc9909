//! Room paging messages.

use bytes::BufMut;

use crate::content::ContentFlags;
use crate::helpers::Location;
use crate::stream::{put_count_u32, put_string, WireReader};
use crate::{WireError, WireLayer};

/// One room in a [`RoomsList`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomEntry {
    pub location: Location,
    pub name: String,
}

/// Base layer for messages that name a set of rooms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomsList {
    pub rooms: Vec<RoomEntry>,
}

const ROOM_ENTRY_MIN_LEN: usize = Location::WIRE_LEN + 2;

impl RoomsList {
    fn poke_rooms(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        put_count_u32(out, self.rooms.len(), "rooms")?;
        for room in &self.rooms {
            room.location.poke(out);
            put_string(out, &room.name, "room name")?;
        }
        Ok(())
    }

    fn peek_rooms(r: &mut WireReader<'_>) -> Result<Vec<RoomEntry>, WireError> {
        let count = r.get_count(false, ROOM_ENTRY_MIN_LEN, "rooms")?;
        let mut rooms = Vec::with_capacity(count);
        for _ in 0..count {
            let location = Location::peek(r)?;
            let name = r.get_string()?;
            rooms.push(RoomEntry { location, name });
        }
        Ok(rooms)
    }
}

impl WireLayer for RoomsList {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.poke_rooms(out)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.rooms = Self::peek_rooms(r)?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let mut content = ContentFlags::new();
        content.set(0);
        content.write(out);
        self.poke_rooms(out)
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        let content = ContentFlags::read(r)?;
        self.rooms = if content.is_set(0) {
            Self::peek_rooms(r)?
        } else {
            Vec::new()
        };
        Ok(())
    }
}

bitflags::bitflags! {
    /// What a [`PagingRoom`] asks the server to do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PagingFlags: u8 {
        const PAGING_OUT = 1 << 0;
        const RESET_LIST = 1 << 1;
        const REQUEST_STATE = 1 << 2;
        const FINAL_ROOM_IN_AGE = 1 << 3;
    }
}

/// A client paging rooms in or out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PagingRoom {
    pub rooms: RoomsList,
    pub paging_flags: PagingFlags,
}

impl WireLayer for PagingRoom {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.rooms.poke(out)?;
        out.put_u8(self.paging_flags.bits());
        Ok(())
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.rooms.peek(r)?;
        self.paging_flags = PagingFlags::from_bits_retain(r.get_u8()?);
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.rooms.write_version(out)?;
        let mut content = ContentFlags::new();
        content.set(0);
        content.write(out);
        out.put_u8(self.paging_flags.bits());
        Ok(())
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.rooms.read_version(r)?;
        let content = ContentFlags::read(r)?;
        self.paging_flags = if content.is_set(0) {
            PagingFlags::from_bits_retain(r.get_u8()?)
        } else {
            PagingFlags::empty()
        };
        Ok(())
    }
}

/// A client asking for the current state of a set of rooms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameStateRequest {
    pub rooms: RoomsList,
}

impl WireLayer for GameStateRequest {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.rooms.poke(out)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.rooms.peek(r)
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.rooms.write_version(out)?;
        ContentFlags::new().write(out);
        Ok(())
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.rooms.read_version(r)?;
        ContentFlags::read(r)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PagingRoom {
        PagingRoom {
            rooms: RoomsList {
                rooms: vec![
                    RoomEntry {
                        location: Location::new(1, 0),
                        name: "City".into(),
                    },
                    RoomEntry {
                        location: Location::new(2, 4),
                        name: "Harbor".into(),
                    },
                ],
            },
            paging_flags: PagingFlags::PAGING_OUT | PagingFlags::FINAL_ROOM_IN_AGE,
        }
    }

    #[test]
    fn test_paging_room_writes_rooms_before_flags() {
        let msg = sample();
        let mut out = Vec::new();
        msg.poke(&mut out).unwrap();
        assert_eq!(&out[..4], &[2, 0, 0, 0]);
        assert_eq!(*out.last().unwrap(), msg.paging_flags.bits());
    }

    #[test]
    fn test_paging_room_peek_replaces_fields() {
        let msg = sample();
        let mut out = Vec::new();
        msg.poke(&mut out).unwrap();

        let mut read = PagingRoom {
            rooms: RoomsList {
                rooms: vec![RoomEntry::default(); 5],
            },
            paging_flags: PagingFlags::RESET_LIST,
        };
        read.peek(&mut WireReader::new(&out)).unwrap();
        assert_eq!(read, msg);
    }

    #[test]
    fn test_paging_room_versioned_round_trip() {
        let msg = sample();
        let mut out = Vec::new();
        msg.write_version(&mut out).unwrap();

        let mut read = PagingRoom::default();
        read.read_version(&mut WireReader::new(&out)).unwrap();
        assert_eq!(read, msg);
    }

    #[test]
    fn test_versioned_rooms_absent_reads_as_empty() {
        // Base layer wrote no fields, paging layer wrote its flags.
        let mut out = Vec::new();
        ContentFlags::new().write(&mut out);
        let mut paging = ContentFlags::new();
        paging.set(0);
        paging.write(&mut out);
        out.push(PagingFlags::REQUEST_STATE.bits());

        let mut read = sample();
        read.read_version(&mut WireReader::new(&out)).unwrap();
        assert!(read.rooms.rooms.is_empty());
        assert_eq!(read.paging_flags, PagingFlags::REQUEST_STATE);
    }
}
