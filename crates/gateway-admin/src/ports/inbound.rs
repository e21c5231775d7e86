//! # Inbound Ports
//!
//! What the admin client offers to the surrounding application.

use crate::domain::{ActiveGateway, AdminError, GatewayDescriptor, KeyMaterial, NodeId};
use async_trait::async_trait;

/// Gateway admin API - inbound port.
#[async_trait]
pub trait GatewayAdminApi: Send + Sync {
    /// Install `key` on the gateway described by `descriptor`.
    async fn provision(
        &self,
        descriptor: &GatewayDescriptor,
        key: &KeyMaterial,
    ) -> Result<ActiveGateway, AdminError>;

    /// Deny connections to a node id or host.
    async fn block_gateway(&self, target: &str) -> Result<(), AdminError>;

    /// Lift a deny-list entry.
    fn unblock_gateway(&self, target: &str) -> Result<(), AdminError>;

    /// Gateways currently considered usable.
    fn active_gateways(&self) -> Vec<ActiveGateway>;

    /// Whether `node_id` is in the active set.
    fn is_active(&self, node_id: &NodeId) -> bool;

    /// Close every connection and release the registry.
    async fn shutdown(&self);
}
