//! Gateway registration persistence.
//!
//! After a gateway accepts its key the admin client records it with the
//! external register service so other participants can find it.

use crate::domain::{AdminError, GatewayDescriptor};
use crate::ports::GatewayRegistrar;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_crypto::KeyVersion;
use std::time::Duration;
use tracing::{debug, info};

/// Path appended to the register service base URL.
pub const REGISTER_GATEWAY_PATH: &str = "/registers/gateway";

/// JSON body posted to the register service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRegistration {
    /// Hex node id.
    pub node_id: String,
    /// Admin network address of the gateway.
    pub network_info_admin: String,
    /// Hex public key the gateway signs with.
    pub signing_key: String,
    /// Version of the installed key.
    pub key_version: u32,
}

impl GatewayRegistration {
    /// Registration record for `gateway` running `key_version`.
    pub fn new(gateway: &GatewayDescriptor, key_version: KeyVersion) -> Self {
        Self {
            node_id: gateway.node_id().to_hex(),
            network_info_admin: gateway.admin_address().to_string(),
            signing_key: gateway.public_key().to_hex(),
            key_version: key_version.encode(),
        }
    }
}

/// Posts registrations to `{register_url}/registers/gateway`.
#[derive(Clone, Debug)]
pub struct HttpGatewayRegistrar {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGatewayRegistrar {
    /// Registrar for the register service at `register_url`.
    pub fn new(register_url: &str, timeout: Duration) -> Result<Self, AdminError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdminError::Configuration(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint_for(register_url),
        })
    }

    /// Full URL registrations are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint_for(register_url: &str) -> String {
    format!(
        "{}{}",
        register_url.trim_end_matches('/'),
        REGISTER_GATEWAY_PATH
    )
}

#[async_trait]
impl GatewayRegistrar for HttpGatewayRegistrar {
    async fn register_gateway(
        &self,
        gateway: &GatewayDescriptor,
        key_version: KeyVersion,
    ) -> Result<(), AdminError> {
        let registration = GatewayRegistration::new(gateway, key_version);
        self.client
            .post(&self.endpoint)
            .json(&registration)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AdminError::Registration(e.to_string()))?;
        info!(
            node = %gateway.node_id().short(),
            endpoint = %self.endpoint,
            "gateway registered"
        );
        Ok(())
    }
}

/// Registrar that records nothing. Used when no register URL is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpGatewayRegistrar;

#[async_trait]
impl GatewayRegistrar for NoOpGatewayRegistrar {
    async fn register_gateway(
        &self,
        gateway: &GatewayDescriptor,
        _key_version: KeyVersion,
    ) -> Result<(), AdminError> {
        debug!(node = %gateway.node_id().short(), "registration skipped");
        Ok(())
    }
}
