//! # Key Provisioning Protocol
//!
//! Runs one key-installation handshake against a single gateway.
//!
//! ## State machine
//!
//! ```text
//! Idle -> RequestBuilt -> Signed -> Sent -> AwaitingResponse -> Verified
//!   \__________\___________\________\___________\_____________-> Failed
//! ```
//!
//! Every step returns on the first error. There is no retry inside an
//! attempt; the caller starts a fresh one from `Idle`.
//!
//! ## Response checks
//!
//! Strictly ordered:
//! 1. Message type must be `AdminAcceptKeyResponse`, else `UnexpectedMessage`
//!    and the verifier is never called.
//! 2. Signature must verify against the gateway's public key, else
//!    `Signature` and the body is never decoded.
//! 3. Only then is `key_accepted` decoded; `false` is `KeyRejected`.

use crate::adapters::codec;
use crate::domain::{
    AcceptKeyChallenge, AcceptKeyResponse, ActiveGateway, AdminError, Envelope,
    GatewayDescriptor, KeyMaterial, MessageType, NodeId, ProvisioningRequest,
    ProvisioningResponse, ProvisioningState, PROTOCOL_VERSION,
};
use crate::ports::{MessageSigner, MessageVerifier};
use crate::registry::ConnectionRegistry;
use bytes::Bytes;
use shared_crypto::{Ed25519PublicKey, KeyVersion};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

/// Deadlines applied to one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Bound on writing the request frame.
    pub write_timeout: Duration,
    /// Bound on waiting for the gateway's response.
    pub response_timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(1),
        }
    }
}

/// The operator's own key bound to a signing capability.
///
/// Requests signed with it prove to the gateway that they come from an
/// administrator.
#[derive(Clone)]
pub struct AdminSigner {
    signer: Arc<dyn MessageSigner>,
    key: KeyMaterial,
}

impl AdminSigner {
    /// Bind `key` to `signer`.
    pub fn new(signer: Arc<dyn MessageSigner>, key: KeyMaterial) -> Self {
        Self { signer, key }
    }

    /// Admin public key gateways verify requests with.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.key.public_key()
    }

    /// Version of the admin key.
    pub fn key_version(&self) -> KeyVersion {
        self.key.key_version()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, AdminError> {
        self.signer
            .sign(&self.key, message)
            .map_err(|e| AdminError::Signing(e.to_string()))
    }
}

impl fmt::Debug for AdminSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSigner")
            .field("public_key", &self.key.public_key().to_hex())
            .field("key_version", &self.key.key_version())
            .finish_non_exhaustive()
    }
}

/// Tracks the state of one attempt for logging.
struct Attempt {
    node_id: NodeId,
    state: ProvisioningState,
}

impl Attempt {
    fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            state: ProvisioningState::Idle,
        }
    }

    fn advance(&mut self, next: ProvisioningState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(node = %self.node_id.short(), from = %self.state, to = %next, "provisioning state");
        self.state = next;
    }
}

/// Orchestrates provisioning attempts over pooled connections.
pub struct KeyProvisioningProtocol {
    registry: Arc<ConnectionRegistry>,
    verifier: Arc<dyn MessageVerifier>,
    config: ProtocolConfig,
}

impl KeyProvisioningProtocol {
    /// Create a protocol runner.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        verifier: Arc<dyn MessageVerifier>,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            registry,
            verifier,
            config,
        }
    }

    /// Registry the protocol acquires connections from.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Install `key_material` on the gateway described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Any [`AdminError`]; the attempt ends in `Failed` and must be
    /// restarted by the caller.
    pub async fn provision(
        &self,
        descriptor: &GatewayDescriptor,
        key_material: &KeyMaterial,
        admin: &AdminSigner,
    ) -> Result<ActiveGateway, AdminError> {
        let mut attempt = Attempt::new(descriptor.node_id());
        let result = self
            .run(&mut attempt, descriptor, key_material, admin)
            .await;
        match &result {
            Ok(gateway) => info!(
                node = %gateway.node_id.short(),
                address = %gateway.address,
                key_version = %gateway.key_version,
                "gateway accepted key"
            ),
            Err(e) => {
                warn!(
                    node = %attempt.node_id.short(),
                    address = descriptor.admin_address(),
                    from = %attempt.state,
                    category = e.category(),
                    error = %e,
                    "provisioning failed"
                );
                attempt.advance(ProvisioningState::Failed);
            }
        }
        result
    }

    async fn run(
        &self,
        attempt: &mut Attempt,
        descriptor: &GatewayDescriptor,
        key_material: &KeyMaterial,
        admin: &AdminSigner,
    ) -> Result<ActiveGateway, AdminError> {
        let node_id = descriptor.node_id();

        let mut request = build_request(node_id, key_material)?;
        attempt.advance(ProvisioningState::RequestBuilt);

        let frame = seal_request(&mut request, admin)?;
        attempt.advance(ProvisioningState::Signed);

        let address = descriptor.admin_address();
        if !address.is_empty()
            && self.registry.registered_address(&node_id).as_deref() != Some(address)
        {
            self.registry.register(node_id, address)?;
        }
        let handle = self.registry.get_or_create(&node_id).await?;

        let reply = {
            let mut conn = handle.acquire().await?;
            conn.send(frame, self.config.write_timeout).await?;
            attempt.advance(ProvisioningState::Sent);
            debug!(
                node = %node_id.short(),
                conn_id = handle.id(),
                key_version = request.key_version,
                "sent accept-key challenge"
            );
            attempt.advance(ProvisioningState::AwaitingResponse);
            conn.recv(self.config.response_timeout).await?
        };

        let response = self.check_response(descriptor, &reply)?;
        if !response.key_accepted {
            return Err(AdminError::KeyRejected(node_id));
        }
        attempt.advance(ProvisioningState::Verified);

        Ok(ActiveGateway {
            node_id,
            address: handle.address().to_string(),
            connection: handle,
            state: ProvisioningState::Verified,
            key_version: key_material.key_version(),
            activated_at: SystemTime::now(),
        })
    }

    /// Type check, verify, then decode a response frame.
    fn check_response(
        &self,
        descriptor: &GatewayDescriptor,
        frame: &[u8],
    ) -> Result<ProvisioningResponse, AdminError> {
        let envelope = codec::decode_envelope(frame)?;

        let expected = MessageType::AdminAcceptKeyResponse;
        if envelope.message_type != expected.as_u8() {
            return Err(AdminError::UnexpectedMessage {
                expected: expected.as_u8(),
                got: envelope.message_type,
            });
        }
        if envelope.protocol_version != PROTOCOL_VERSION {
            return Err(AdminError::Codec(format!(
                "unsupported protocol version {}",
                envelope.protocol_version
            )));
        }

        match self.verifier.verify(
            descriptor.public_key(),
            &envelope.signature,
            &envelope.signing_payload(),
        ) {
            Ok(true) => {}
            Ok(false) => {
                return Err(AdminError::Signature(
                    "response not signed by the gateway key".to_string(),
                ))
            }
            Err(e) => return Err(AdminError::Signature(e.to_string())),
        }

        let body: AcceptKeyResponse = codec::decode_body(&envelope.body)?;
        Ok(ProvisioningResponse {
            message_type: expected,
            key_accepted: body.key_accepted,
            signature: envelope.signature,
        })
    }
}

fn build_request(
    node_id: NodeId,
    key_material: &KeyMaterial,
) -> Result<ProvisioningRequest, AdminError> {
    let key_version = key_material.key_version().encode();
    let encoded = key_material.key_pair().encode_private_key();
    // Both copies of the key are wiped on drop.
    let challenge = AcceptKeyChallenge {
        node_id,
        private_key: encoded.as_str().to_owned(),
        key_version,
    };
    let body = codec::encode_body(&challenge)?;
    Ok(ProvisioningRequest {
        target_node_id: node_id,
        key_version,
        envelope: Envelope::unsigned(MessageType::AdminAcceptKeyChallenge, body),
    })
}

/// Sign the request and encode its frame, then wipe the plaintext body.
///
/// The returned frame still holds the key and is handed to the transport.
fn seal_request(
    request: &mut ProvisioningRequest,
    admin: &AdminSigner,
) -> Result<Bytes, AdminError> {
    request.envelope.signature = admin.sign(&request.envelope.signing_payload())?;
    let frame = codec::encode_envelope(&request.envelope)?;
    request.envelope.body.zeroize();
    Ok(frame)
}

#[cfg(test)]
mod tests;
