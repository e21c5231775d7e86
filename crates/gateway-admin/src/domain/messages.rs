//! # Wire Messages
//!
//! Typed views of the admin key-installation exchange. The envelope keeps
//! the body as opaque bytes so the type tag and signature can be checked
//! before anything in the body is trusted.

use super::entities::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Envelope format version spoken by this client.
pub const PROTOCOL_VERSION: u16 = 1;

/// Message type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Admin → gateway: install this key.
    AdminAcceptKeyChallenge = 0x30,
    /// Gateway → admin: key accepted or not.
    AdminAcceptKeyResponse = 0x31,
}

impl MessageType {
    /// Wire tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x30 => Some(MessageType::AdminAcceptKeyChallenge),
            0x31 => Some(MessageType::AdminAcceptKeyResponse),
            _ => None,
        }
    }
}

/// Outer wire structure shared by every message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Raw type tag. Unknown tags survive decoding so they can be reported.
    pub message_type: u8,
    /// Envelope format version.
    pub protocol_version: u16,
    /// Encoded body, untrusted until the signature verifies.
    pub body: Vec<u8>,
    /// Signature over [`Envelope::signing_payload`].
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Unsigned envelope around an encoded body.
    pub fn unsigned(message_type: MessageType, body: Vec<u8>) -> Self {
        Self {
            message_type: message_type.as_u8(),
            protocol_version: PROTOCOL_VERSION,
            body,
            signature: Vec::new(),
        }
    }

    /// Bytes covered by the signature: type tag, version, then body.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(3 + self.body.len());
        payload.push(self.message_type);
        payload.extend_from_slice(&self.protocol_version.to_be_bytes());
        payload.extend_from_slice(&self.body);
        payload
    }

    /// Whether a signature has been attached.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

/// Body of the admin accept-key challenge.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AcceptKeyChallenge {
    /// Gateway the key is meant for.
    #[zeroize(skip)]
    pub node_id: NodeId,
    /// Hex-encoded private key the gateway will operate with.
    pub private_key: String,
    /// Encoded key version.
    pub key_version: u32,
}

impl std::fmt::Debug for AcceptKeyChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptKeyChallenge")
            .field("node_id", &self.node_id)
            .field("key_version", &self.key_version)
            .finish_non_exhaustive()
    }
}

/// Body of the gateway's accept-key response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptKeyResponse {
    /// Whether the gateway installed the key.
    pub key_accepted: bool,
}

/// A signed challenge ready to send.
///
/// The envelope body carries the private key being installed. It is wiped
/// on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct ProvisioningRequest {
    /// Gateway the request targets.
    pub target_node_id: NodeId,
    /// Encoded key version carried in the body.
    pub key_version: u32,
    /// Signed envelope.
    pub envelope: Envelope,
}

impl Drop for ProvisioningRequest {
    fn drop(&mut self) {
        self.envelope.body.zeroize();
    }
}

impl fmt::Debug for ProvisioningRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningRequest")
            .field("target_node_id", &self.target_node_id)
            .field("key_version", &self.key_version)
            .field("body_len", &self.envelope.body.len())
            .finish_non_exhaustive()
    }
}

/// A response that passed the type check and signature verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningResponse {
    /// Always [`MessageType::AdminAcceptKeyResponse`].
    pub message_type: MessageType,
    /// Decoded acceptance outcome.
    pub key_accepted: bool,
    /// The verified signature.
    pub signature: Vec<u8>,
}
