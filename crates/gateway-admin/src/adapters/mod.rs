//! # Adapters
//!
//! Concrete implementations of the outbound ports.
//!
//! - `codec` - bincode envelope/body encoding
//! - `crypto` - Ed25519 signer and verifier
//! - `tcp` - length-delimited TCP transport
//! - `registrar` - gateway registration persistence

pub mod codec;
pub mod crypto;
pub mod registrar;
pub mod tcp;

pub use crypto::{Ed25519Signer, Ed25519Verifier};
pub use registrar::{HttpGatewayRegistrar, NoOpGatewayRegistrar};
pub use tcp::{TcpConnection, TcpConnector};
