//! # Domain Entities
//!
//! Gateway identities, descriptors, key material and the provisioning
//! state machine.

use crate::registry::ConnectionHandle;
use serde::{Deserialize, Serialize};
use shared_crypto::{blake3_derive_key, Ed25519KeyPair, Ed25519PublicKey, KeyVersion};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Derivation context for node identities. Changing it changes every id.
const NODE_ID_CONTEXT: &str = "gateway-admin 2024 node id from ed25519 public key";

/// Opaque 256-bit node identity, derived from a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId([u8; 32]);

impl NodeId {
    /// Wrap raw identity bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the identity a gateway signing with `public_key` is known by.
    pub fn from_public_key(public_key: &Ed25519PublicKey) -> Self {
        Self(blake3_derive_key(NODE_ID_CONTEXT, public_key.as_bytes()))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, used as the canonical string identity.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl FromStr for NodeId {
    type Err = String;

    /// Parses 64 hex characters, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s.trim()).map_err(|e| format!("invalid node id: {}", e))?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| format!("invalid node id: expected 32 bytes, got {}", raw.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}..)", self.short())
    }
}

/// What the external registry knows about a gateway.
///
/// Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayDescriptor {
    node_id: NodeId,
    admin_address: String,
    public_key: Ed25519PublicKey,
}

impl GatewayDescriptor {
    /// Descriptor whose node id is derived from `public_key`.
    pub fn new(public_key: Ed25519PublicKey, admin_address: impl Into<String>) -> Self {
        Self {
            node_id: NodeId::from_public_key(&public_key),
            admin_address: admin_address.into(),
            public_key,
        }
    }

    /// Gateway identity.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// `host:port` of the gateway's admin listener.
    pub fn admin_address(&self) -> &str {
        &self.admin_address
    }

    /// Key the gateway signs its responses with.
    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public_key
    }
}

/// A key pair and its generation counter. Owned by the caller.
#[derive(Clone)]
pub struct KeyMaterial {
    key_pair: Ed25519KeyPair,
    key_version: KeyVersion,
}

impl KeyMaterial {
    /// Bundle a key pair with its version.
    pub fn new(key_pair: Ed25519KeyPair, key_version: KeyVersion) -> Self {
        Self {
            key_pair,
            key_version,
        }
    }

    /// Fresh random key pair at the initial version.
    pub fn generate() -> Self {
        Self::new(Ed25519KeyPair::generate(), KeyVersion::initial())
    }

    /// The key pair.
    pub fn key_pair(&self) -> &Ed25519KeyPair {
        &self.key_pair
    }

    /// The key generation.
    pub fn key_version(&self) -> KeyVersion {
        self.key_version
    }

    /// Public half of the key pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.key_pair.public_key()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.key_pair.public_key().to_hex())
            .field("key_version", &self.key_version)
            .finish()
    }
}

/// Provisioning attempt state machine.
///
/// `Idle → RequestBuilt → Signed → Sent → AwaitingResponse → {Verified, Failed}`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisioningState {
    /// Nothing done yet.
    Idle,
    /// Request body encoded.
    RequestBuilt,
    /// Request signed by the admin key.
    Signed,
    /// Request written to the connection.
    Sent,
    /// Waiting for the gateway's answer.
    AwaitingResponse,
    /// Response typed, verified and accepted.
    Verified,
    /// Attempt ended with an error.
    Failed,
}

impl ProvisioningState {
    /// Whether the attempt has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisioningState::Verified | ProvisioningState::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: ProvisioningState) -> bool {
        use ProvisioningState::*;
        match (self, next) {
            (Verified, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Idle, RequestBuilt)
            | (RequestBuilt, Signed)
            | (Signed, Sent)
            | (Sent, AwaitingResponse)
            | (AwaitingResponse, Verified) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisioningState::Idle => "idle",
            ProvisioningState::RequestBuilt => "request_built",
            ProvisioningState::Signed => "signed",
            ProvisioningState::Sent => "sent",
            ProvisioningState::AwaitingResponse => "awaiting_response",
            ProvisioningState::Verified => "verified",
            ProvisioningState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A gateway that accepted its key over a verified response.
#[derive(Clone, Debug)]
pub struct ActiveGateway {
    /// Gateway identity.
    pub node_id: NodeId,
    /// Admin address the key was installed over.
    pub address: String,
    /// Pooled connection the handshake ran on.
    pub connection: ConnectionHandle,
    /// Always `Verified` for a value produced by the protocol.
    pub state: ProvisioningState,
    /// Version of the key the gateway now operates with.
    pub key_version: KeyVersion,
    /// When the gateway accepted the key.
    pub activated_at: SystemTime,
}
