//! The per-layer codec contract.
//!
//! Message classes are built by composition: an `SdlState` holds a
//! `StreamedObject`, which holds an `ObjectMsg`. Each layer implements
//! [`WireLayer`] and, in every method, calls the layer it wraps *first* and
//! only then appends its own fields. Both formats depend on that order; a
//! layer that writes before its parent shifts every field after it.

use crate::stream::WireReader;
use crate::WireError;

/// Serialization of one layer of a message body.
pub trait WireLayer {
    /// Appends this layer (parent first) in the transient wire format.
    fn poke(&self, out: &mut Vec<u8>) -> Result<(), WireError>;

    /// Reads this layer (parent first) from the transient wire format,
    /// replacing every field.
    fn peek(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError>;

    /// Appends this layer in the persisted format: parent first, then this
    /// layer's `ContentFlags` and the fields it marks present.
    fn write_version(&self, out: &mut Vec<u8>) -> Result<(), WireError>;

    /// Reads this layer from the persisted format. Fields whose content bit
    /// is clear are reset to their defaults.
    fn read_version(&mut self, r: &mut WireReader<'_>) -> Result<(), WireError>;
}
