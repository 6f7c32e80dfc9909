//! Per-level field presence for the persisted format.
//!
//! The transient wire format decides which optional header fields follow
//! from the header's [`NetFlags`](crate::NetFlags) word. The persisted
//! format is versioned independently: every layer of a message writes its
//! own `ContentFlags` bit-vector ahead of its fields, one bit per field it
//! actually wrote. A reader only reads the fields whose bits are set, so a
//! save made before a field existed still loads, and bits a newer writer set
//! beyond what this reader knows are ignored.
//!
//! Encoding: `[u32 word count][u32 words...]`, little-endian, bit `n` lives
//! in word `n / 32`.

use bytes::BufMut;

use crate::stream::WireReader;
use crate::WireError;

/// Upper bound on words accepted from a stream (2048 field bits).
const MAX_WORDS: usize = 64;

/// A growable bit-vector recording which fields a layer wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFlags {
    words: Vec<u32>,
}

impl ContentFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `bit`, growing the vector as needed.
    pub fn set(&mut self, bit: u32) {
        let word = (bit / 32) as usize;
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 32);
    }

    /// Sets `bit` only when `present` is true.
    pub fn set_if(&mut self, bit: u32, present: bool) {
        if present {
            self.set(bit);
        }
    }

    pub fn is_set(&self, bit: u32) -> bool {
        self.words
            .get((bit / 32) as usize)
            .is_some_and(|w| w & (1 << (bit % 32)) != 0)
    }

    /// True if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.words.len() as u32);
        for word in &self.words {
            out.put_u32_le(*word);
        }
    }

    pub fn read(r: &mut WireReader<'_>) -> Result<Self, WireError> {
        let count = r.get_u32()? as usize;
        if count > MAX_WORDS {
            return Err(WireError::InvalidLength {
                field: "content flags",
                len: count,
            });
        }
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(r.get_u32()?);
        }
        Ok(Self { words })
    }
}
