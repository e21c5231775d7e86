//! # Admin Client
//!
//! Explicitly constructed facade over the registry and the provisioning
//! protocol. Owns the set of gateways that accepted a key in this session.

use crate::adapters::{
    Ed25519Signer, Ed25519Verifier, HttpGatewayRegistrar, NoOpGatewayRegistrar, TcpConnector,
};
use crate::config::AdminSettings;
use crate::domain::{ActiveGateway, AdminError, GatewayDescriptor, KeyMaterial, NodeId};
use crate::ports::{Connector, GatewayAdminApi, GatewayRegistrar, MessageSigner, MessageVerifier};
use crate::protocol::{AdminSigner, KeyProvisioningProtocol};
use crate::registry::{BlockTarget, ConnectionRegistry, RegistryStats};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Gateway admin client.
pub struct AdminClient {
    protocol: KeyProvisioningProtocol,
    admin: AdminSigner,
    registrar: Arc<dyn GatewayRegistrar>,
    active: RwLock<HashMap<NodeId, ActiveGateway>>,
}

impl AdminClient {
    /// Wire a client from its collaborators.
    pub fn new(
        settings: &AdminSettings,
        connector: Arc<dyn Connector>,
        signer: Arc<dyn MessageSigner>,
        verifier: Arc<dyn MessageVerifier>,
        registrar: Arc<dyn GatewayRegistrar>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(
            connector,
            settings.registry_config(),
        ));
        let admin = AdminSigner::new(signer, settings.admin_key().clone());
        info!(
            admin_key = %admin.public_key().to_hex(),
            key_version = %admin.key_version(),
            "admin client initialised"
        );
        Self {
            protocol: KeyProvisioningProtocol::new(registry, verifier, settings.protocol_config()),
            admin,
            registrar,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Client using TCP, Ed25519 and the HTTP registrar (or none when no
    /// register URL is configured).
    ///
    /// # Errors
    ///
    /// `Configuration` if the HTTP client cannot be built.
    pub fn tcp(settings: &AdminSettings) -> Result<Self, AdminError> {
        let registrar: Arc<dyn GatewayRegistrar> = match settings.register_url() {
            Some(url) => Arc::new(HttpGatewayRegistrar::new(
                url,
                settings.transport().connect_timeout,
            )?),
            None => Arc::new(NoOpGatewayRegistrar),
        };
        Ok(Self::new(
            settings,
            Arc::new(TcpConnector::new(settings.transport().max_frame_len)),
            Arc::new(Ed25519Signer),
            Arc::new(Ed25519Verifier),
            registrar,
        ))
    }

    /// Generate a fresh gateway key at the initial version.
    pub fn create_key() -> KeyMaterial {
        KeyMaterial::generate()
    }

    /// Connection registry shared with the protocol.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.protocol.registry()
    }

    /// Registry counters.
    pub fn stats(&self) -> RegistryStats {
        self.registry().stats()
    }
}

#[async_trait]
impl GatewayAdminApi for AdminClient {
    async fn provision(
        &self,
        descriptor: &GatewayDescriptor,
        key: &KeyMaterial,
    ) -> Result<ActiveGateway, AdminError> {
        let gateway = self.protocol.provision(descriptor, key, &self.admin).await?;
        self.active.write().insert(gateway.node_id, gateway.clone());

        // The key is installed either way; a failed registration is reported
        // but the gateway stays active.
        if let Err(e) = self
            .registrar
            .register_gateway(descriptor, key.key_version())
            .await
        {
            error!(node = %gateway.node_id.short(), error = %e, "gateway registration failed");
            return Err(match e {
                AdminError::Registration(_) => e,
                other => AdminError::Registration(other.to_string()),
            });
        }
        Ok(gateway)
    }

    async fn block_gateway(&self, target: &str) -> Result<(), AdminError> {
        let target = BlockTarget::parse(target)?;
        let evicted = self.registry().block(target.clone()).await?;

        let mut active = self.active.write();
        active.retain(|node_id, gateway| {
            !evicted.contains(node_id) && !target.matches(node_id, &gateway.address)
        });
        Ok(())
    }

    fn unblock_gateway(&self, target: &str) -> Result<(), AdminError> {
        let target = BlockTarget::parse(target)?;
        self.registry().unblock(&target)?;
        Ok(())
    }

    fn active_gateways(&self) -> Vec<ActiveGateway> {
        self.active.read().values().cloned().collect()
    }

    fn is_active(&self, node_id: &NodeId) -> bool {
        self.active.read().contains_key(node_id)
    }

    async fn shutdown(&self) {
        self.registry().shutdown().await;
        self.active.write().clear();
    }
}
