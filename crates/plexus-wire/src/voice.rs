//! Voice chat frames and the member-list request.

use bytes::BufMut;

use crate::content::ContentFlags;
use crate::stream::{put_count_u8, WireReader};
use crate::{WireError, WireLayer};

mod voice_bits {
    pub const FLAGS: u32 = 0;
    pub const FRAMES: u32 = 1;
    pub const RECEIVERS: u32 = 2;
    pub const DATA: u32 = 3;
}

/// A packet of encoded voice frames.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Voice {
    pub flags: u8,
    pub frames: u8,
    pub receivers: Vec<u32>,
    pub data: Vec<u8>,
}

impl Voice {
    fn poke_receivers(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        put_count_u8(out, self.receivers.len(), "receivers")?;
        for id in &self.receivers {
            out.put_u32_le(*id);
        }
        Ok(())
    }

    fn peek_receivers(r: &mut WireReader<'_>) -> Result<Vec<u32>, WireError> {
        let count = r.get_count(true, 4, "receivers")?;
        (0..count).map(|_| r.get_u32()).collect()
    }

    fn poke_data(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let len = u16::try_from(self.data.len()).map_err(|_| {
            WireError::FieldTooLong {
                field: "voice data",
                len: self.data.len(),
                max: u16::MAX as usize,
            }
        })?;
        out.put_u16_le(len);
        out.put_slice(&self.data);
        Ok(())
    }

    fn peek_data(r: &mut WireReader<'_>) -> Result<Vec<u8>, WireError> {
        let len = r.get_u16()? as usize;
        Ok(r.get_bytes(len)?.to_vec())
    }
}

impl WireLayer for Voice {
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.put_u8(self.flags);
        out.put_u8(self.frames);
        self.poke_receivers(out)?;
        self.poke_data(out)
    }

    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        self.flags = r.get_u8()?;
        self.frames = r.get_u8()?;
        self.receivers = Self::peek_receivers(r)?;
        self.data = Self::peek_data(r)?;
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let mut content = ContentFlags::new();
        content.set(voice_bits::FLAGS);
        content.set(voice_bits::FRAMES);
        content.set_if(voice_bits::RECEIVERS, !self.receivers.is_empty());
        content.set(voice_bits::DATA);
        content.write(out);

        out.put_u8(self.flags);
        out.put_u8(self.frames);
        if !self.receivers.is_empty() {
            self.poke_receivers(out)?;
        }
        self.poke_data(out)
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        let content = ContentFlags::read(r)?;
        self.flags = if content.is_set(voice_bits::FLAGS) {
            r.get_u8()?
        } else {
            0
        };
        self.frames = if content.is_set(voice_bits::FRAMES) {
            r.get_u8()?
        } else {
            0
        };
        self.receivers = if content.is_set(voice_bits::RECEIVERS) {
            Self::peek_receivers(r)?
        } else {
            Vec::new()
        };
        self.data = if content.is_set(voice_bits::DATA) {
            Self::peek_data(r)?
        } else {
            Vec::new()
        };
        Ok(())
    }
}

/// Asks the server for the list of players in the age. Has no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MembersListReq;

impl WireLayer for MembersListReq {
    fn poke(&self, _out: &mut Vec<u8>) -> Result<(), WireError> {
        Ok(())
    }

    fn peek(&mut self, _r: &mut WireReader<'_>) -> Result<(), WireError> {
        Ok(())
    }

    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        ContentFlags::new().write(out);
        Ok(())
    }

    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError> {
        ContentFlags::read(r)?;
        Ok(())
    }
}
