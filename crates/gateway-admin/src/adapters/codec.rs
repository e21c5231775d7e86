//! Envelope and body encoding.
//!
//! Wire format (inside one length-delimited frame):
//!
//! ```text
//! Envelope {
//!     message_type:     u8
//!     protocol_version: u16
//!     body:             bytes   (bincode-encoded message body)
//!     signature:        bytes
//! }
//! ```

use crate::domain::{AdminError, Envelope};
use bincode::Options;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Upper bound on any decoded message, independent of the frame limit.
pub const MAX_MESSAGE_LEN: u64 = 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_MESSAGE_LEN)
        .reject_trailing_bytes()
}

/// Encode an envelope into a frame payload.
pub fn encode_envelope(envelope: &Envelope) -> Result<Bytes, AdminError> {
    Ok(Bytes::from(options().serialize(envelope)?))
}

/// Decode a frame payload into an envelope. The body stays opaque.
pub fn decode_envelope(frame: &[u8]) -> Result<Envelope, AdminError> {
    Ok(options().deserialize(frame)?)
}

/// Encode a message body.
pub fn encode_body<T: Serialize>(body: &T) -> Result<Vec<u8>, AdminError> {
    Ok(options().serialize(body)?)
}

/// Decode a message body. Only call this on a verified envelope.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AdminError> {
    Ok(options().deserialize(body)?)
}
