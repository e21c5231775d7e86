//! # Gateway Admin - Key Provisioning Client
//!
//! Installs operating keys on gateways over a signed challenge/response
//! handshake and keeps one pooled connection per gateway identity.
//!
//! ## Architecture
//!
//! ```text
//! AdminClient::provision(descriptor, key)
//!   -> KeyProvisioningProtocol   build, sign, send, await, verify, decode
//!      -> ConnectionRegistry     node id -> pooled connection, deny-list
//!         -> Connector           TCP, length-delimited frames
//!   -> GatewayRegistrar          persist the activated gateway
//! ```
//!
//! ## Module Structure
//!
//! - `domain/` - node ids, descriptors, key material, wire messages, errors
//! - `ports/` - inbound API and outbound collaborator traits
//! - `registry/` - connection pool and deny-list
//! - `protocol/` - the provisioning handshake
//! - `adapters/` - TCP, bincode codec, Ed25519, HTTP registrar
//! - `config` - settings builder and TOML file
//! - `client` - the `AdminClient` facade
//!
//! ## Security
//!
//! - A response is type-checked, then verified against the gateway's own
//!   public key, and only then decoded.
//! - Requests are signed with the operator's admin key.
//! - Private keys are never logged. Key pairs, decoded challenges and
//!   request bodies are zeroized on drop; the encoded request frame handed
//!   to the transport is not.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod client;
pub mod config;
pub mod domain;
pub mod ports;
pub mod protocol;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use client::AdminClient;
pub use config::{AdminConfigFile, AdminSettings, SettingsBuilder, TransportSettings};
pub use domain::{
    ActiveGateway, AdminError, GatewayDescriptor, KeyMaterial, NodeId, ProvisioningState,
};
pub use ports::GatewayAdminApi;
pub use protocol::{AdminSigner, KeyProvisioningProtocol, ProtocolConfig};
pub use registry::{BlockTarget, ConnectionRegistry, RegistryConfig, RegistryStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
