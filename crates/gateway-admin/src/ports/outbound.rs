//! # Outbound Ports
//!
//! Traits for the collaborators the core depends on: transport,
//! signing/verification and registry persistence.

use crate::domain::{AdminError, GatewayDescriptor, KeyMaterial};
use async_trait::async_trait;
use bytes::Bytes;
use shared_crypto::{CryptoError, Ed25519PublicKey, KeyVersion};
use std::time::Duration;

/// A framed byte-stream connection to one gateway.
///
/// `recv_frame` must be cancel-safe: dropping its future before it
/// completes must not lose bytes that were already read.
#[async_trait]
pub trait Connection: Send {
    /// Write one complete frame.
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), AdminError>;

    /// Read the next complete frame.
    async fn recv_frame(&mut self) -> Result<Bytes, AdminError>;

    /// False once the peer closed or an I/O error was observed.
    fn is_open(&self) -> bool;

    /// Close the underlying transport.
    async fn close(&mut self);

    /// Remote address, for logging.
    fn remote_addr(&self) -> &str;
}

/// Opens connections to gateway admin addresses.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial `address`, failing with `Connect` or `Timeout`.
    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, AdminError>;
}

/// Signing capability: `Sign(keyPair, keyVersion, message)`.
pub trait MessageSigner: Send + Sync {
    /// Sign `message` with `key`.
    fn sign(&self, key: &KeyMaterial, message: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Verification capability: `Verify(publicKey, signature, message)`.
///
/// `Ok(false)` means a well-formed signature that does not match;
/// `Err` means the inputs could not be checked at all.
pub trait MessageVerifier: Send + Sync {
    /// Check `signature` over `message` against `public_key`.
    fn verify(
        &self,
        public_key: &Ed25519PublicKey,
        signature: &[u8],
        message: &[u8],
    ) -> Result<bool, CryptoError>;
}

/// Persists a gateway's registration once it holds a verified key.
#[async_trait]
pub trait GatewayRegistrar: Send + Sync {
    /// Record `gateway` as operating with `key_version`.
    async fn register_gateway(
        &self,
        gateway: &GatewayDescriptor,
        key_version: KeyVersion,
    ) -> Result<(), AdminError>;
}
