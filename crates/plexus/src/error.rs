//! Unified error type for Plexus.

use plexus_dispatch::MsgClass;
use plexus_transport::TransportError;
use plexus_wire::WireError;

use crate::config::ConfigError;

/// Top-level error wrapping every crate-specific error.
///
/// `#[from]` on the wrapped variants lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum PlexusError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No payload codec is registered for the class.
    #[error("no payload codec for class {0}")]
    UnknownPayload(MsgClass),

    /// The payload is not the type registered for its class.
    #[error("payload of class {0} does not match its codec")]
    PayloadType(MsgClass),

    /// A net message body that cannot carry a dispatch message.
    #[error("{0} does not carry a dispatch message")]
    NotAGameMessage(&'static str),
}
