//! # Shared Crypto - Gateway Key Primitives
//!
//! The signing collaborator used by the gateway admin client.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Admin and gateway message signing |
//! | `key_version` | - | Key generation counter |
//! | `hashing` | BLAKE3 | Node identity derivation |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency when signing
//! - Secret seeds are zeroized when a key pair is dropped
//! - **BLAKE3**: domain-separated derivation of node identities

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod key_version;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::blake3_derive_key;
pub use key_version::KeyVersion;
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
