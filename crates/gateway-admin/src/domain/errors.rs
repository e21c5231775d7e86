//! # Domain Errors
//!
//! Error taxonomy for provisioning attempts and the connection registry.
//!
//! Every variant tells the caller whether a fresh attempt may help
//! (transport failures) or whether operator action is needed first
//! (configuration, rejection, signature failure).

use super::entities::NodeId;
use std::time::Duration;
use thiserror::Error;

/// Gateway admin error types.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required key material or settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No address was ever registered for this node.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The node or its host is on the deny-list.
    #[error("Blocked: {0}")]
    Blocked(String),

    /// Transport handshake with the gateway failed.
    #[error("Failed to connect to {address}: {reason}")]
    Connect {
        /// Address we dialled.
        address: String,
        /// Underlying failure.
        reason: String,
    },

    /// A bounded network operation did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which operation timed out (connect, write, response).
        operation: &'static str,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// I/O failure on an established connection.
    #[error("Network error: {0}")]
    Network(String),

    /// The peer answered with a message of the wrong type.
    #[error("Unexpected message type 0x{got:02x} (expected 0x{expected:02x})")]
    UnexpectedMessage {
        /// Type tag we were waiting for.
        expected: u8,
        /// Type tag we received.
        got: u8,
    },

    /// Response signature did not verify against the gateway's key.
    #[error("Signature verification failed: {0}")]
    Signature(String),

    /// The gateway verified our request and declined the key.
    #[error("Key rejected by gateway {0}")]
    KeyRejected(NodeId),

    /// The registry has been shut down.
    #[error("Connection registry is closed")]
    RegistryClosed,

    /// Envelope or body could not be encoded/decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// The admin signer could not produce a signature.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The registry persistence collaborator failed.
    #[error("Gateway registration failed: {0}")]
    Registration(String),
}

impl AdminError {
    /// True when a fresh attempt from `Idle` may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdminError::Connect { .. } | AdminError::Timeout { .. } | AdminError::Network(_)
        )
    }

    /// Stable label for logs and exit messages.
    pub fn category(&self) -> &'static str {
        match self {
            AdminError::Configuration(_) => "configuration",
            AdminError::UnknownNode(_) => "unknown_node",
            AdminError::Blocked(_) => "blocked",
            AdminError::Connect { .. } => "connect",
            AdminError::Timeout { .. } => "timeout",
            AdminError::Network(_) => "network",
            AdminError::UnexpectedMessage { .. } => "unexpected_message",
            AdminError::Signature(_) => "signature",
            AdminError::KeyRejected(_) => "key_rejected",
            AdminError::RegistryClosed => "registry_closed",
            AdminError::Codec(_) => "codec",
            AdminError::Signing(_) => "signing",
            AdminError::Registration(_) => "registration",
        }
    }
}

impl From<bincode::Error> for AdminError {
    fn from(err: bincode::Error) -> Self {
        AdminError::Codec(err.to_string())
    }
}
