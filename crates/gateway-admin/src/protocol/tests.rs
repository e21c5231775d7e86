use super::*;
use crate::adapters::Ed25519Signer;
use crate::registry::{BlockTarget, RegistryConfig};
use crate::testing::{CountingVerifier, Responder, ScriptedConnector};
use bytes::Bytes;
use shared_crypto::Ed25519KeyPair;
use std::sync::atomic::{AtomicUsize, Ordering};

const ADDRESS: &str = "10.1.0.7:7000";

struct Fixture {
    gateway_key: Ed25519KeyPair,
    descriptor: GatewayDescriptor,
    admin_key: KeyMaterial,
    connector: Arc<ScriptedConnector>,
    verifier: Arc<CountingVerifier>,
    protocol: KeyProvisioningProtocol,
}

impl Fixture {
    fn new(gateway_key: Ed25519KeyPair, connector: ScriptedConnector) -> Self {
        Self::with_verifier(gateway_key, connector, CountingVerifier::default())
    }

    fn with_verifier(
        gateway_key: Ed25519KeyPair,
        connector: ScriptedConnector,
        verifier: CountingVerifier,
    ) -> Self {
        let connector = Arc::new(connector);
        let verifier = Arc::new(verifier);
        let registry = Arc::new(ConnectionRegistry::new(
            connector.clone(),
            RegistryConfig::default(),
        ));
        let protocol = KeyProvisioningProtocol::new(
            registry,
            verifier.clone(),
            ProtocolConfig {
                write_timeout: Duration::from_secs(1),
                response_timeout: Duration::from_secs(1),
            },
        );
        Self {
            descriptor: GatewayDescriptor::new(gateway_key.public_key(), ADDRESS),
            gateway_key,
            admin_key: KeyMaterial::generate(),
            connector,
            verifier,
            protocol,
        }
    }

    fn admin(&self) -> AdminSigner {
        AdminSigner::new(Arc::new(Ed25519Signer), self.admin_key.clone())
    }

    async fn provision(&self, key: &KeyMaterial) -> Result<ActiveGateway, AdminError> {
        self.protocol
            .provision(&self.descriptor, key, &self.admin())
            .await
    }
}

fn signed_response(gateway_key: &Ed25519KeyPair, accepted: bool) -> Envelope {
    let body = codec::encode_body(&AcceptKeyResponse {
        key_accepted: accepted,
    })
    .unwrap();
    let mut envelope = Envelope::unsigned(MessageType::AdminAcceptKeyResponse, body);
    envelope.signature = gateway_key.sign(&envelope.signing_payload()).to_vec();
    envelope
}

fn replying(envelope: Envelope, delay: Duration) -> Responder {
    let frame = codec::encode_envelope(&envelope).unwrap();
    Arc::new(move |_| Some((delay, frame.clone())))
}

#[tokio::test]
async fn test_valid_handshake_activates_gateway() {
    let gateway_key = Ed25519KeyPair::generate();
    let connector = ScriptedConnector::new(replying(
        signed_response(&gateway_key, true),
        Duration::ZERO,
    ));
    let fx = Fixture::new(gateway_key, connector);
    let key = KeyMaterial::generate();

    let active = fx.provision(&key).await.unwrap();

    assert_eq!(active.node_id, fx.descriptor.node_id());
    assert_eq!(active.address, ADDRESS);
    assert_eq!(active.state, ProvisioningState::Verified);
    assert_eq!(active.key_version, KeyVersion::initial());
    assert_eq!(fx.verifier.calls(), 1);
    assert_eq!(fx.connector.dialled(), vec![ADDRESS.to_string()]);
}

#[tokio::test]
async fn test_request_is_signed_by_admin_and_carries_key() {
    let gateway_key = Ed25519KeyPair::generate();
    let connector = ScriptedConnector::new(replying(
        signed_response(&gateway_key, true),
        Duration::ZERO,
    ));
    let fx = Fixture::new(gateway_key, connector);
    let key = KeyMaterial::generate();

    fx.provision(&key).await.unwrap();

    let sent = fx.connector.sent_frames();
    assert_eq!(sent.len(), 1);
    let envelope = codec::decode_envelope(&sent[0]).unwrap();
    assert_eq!(
        envelope.message_type,
        MessageType::AdminAcceptKeyChallenge.as_u8()
    );

    let signature = shared_crypto::Ed25519Signature::from_slice(&envelope.signature).unwrap();
    fx.admin_key
        .public_key()
        .verify(&envelope.signing_payload(), &signature)
        .expect("challenge must verify under the admin key");
    assert!(fx
        .descriptor
        .public_key()
        .verify(&envelope.signing_payload(), &signature)
        .is_err());

    let challenge: AcceptKeyChallenge = codec::decode_body(&envelope.body).unwrap();
    assert_eq!(challenge.node_id, fx.descriptor.node_id());
    assert_eq!(challenge.key_version, 1);
    let installed = Ed25519KeyPair::decode_private_key(&challenge.private_key).unwrap();
    assert_eq!(installed.public_key(), key.public_key());
}

#[test]
fn test_sealed_request_wipes_plaintext_body() {
    let admin_key = KeyMaterial::generate();
    let admin = AdminSigner::new(Arc::new(Ed25519Signer), admin_key);
    let key = KeyMaterial::generate();
    let node_id = NodeId::new([3; 32]);

    let mut request = build_request(node_id, &key).unwrap();
    let body = request.envelope.body.clone();
    assert!(!format!("{:?}", request).contains(&format!("{:?}", body)));

    let frame = seal_request(&mut request, &admin).unwrap();

    assert!(request.envelope.body.is_empty());
    let sent = codec::decode_envelope(&frame).unwrap();
    assert_eq!(sent.body, body);
    let challenge: AcceptKeyChallenge = codec::decode_body(&sent.body).unwrap();
    let installed = Ed25519KeyPair::decode_private_key(&challenge.private_key).unwrap();
    assert_eq!(installed.public_key(), key.public_key());
}

#[tokio::test]
async fn test_slow_gateway_times_out_and_retry_redials() {
    let gateway_key = Ed25519KeyPair::generate();
    let frame = codec::encode_envelope(&signed_response(&gateway_key, true)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let responder: Responder = {
        let calls = calls.clone();
        Arc::new(move |_| {
            let delay = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Duration::from_millis(1500)
            } else {
                Duration::ZERO
            };
            Some((delay, frame.clone()))
        })
    };
    let fx = Fixture::new(gateway_key, ScriptedConnector::new(responder));
    let key = KeyMaterial::generate();

    let started = tokio::time::Instant::now();
    let first = fx.provision(&key).await;
    assert!(matches!(
        first,
        Err(AdminError::Timeout {
            operation: "response",
            ..
        })
    ));
    assert!(started.elapsed() < Duration::from_millis(1400));
    assert_eq!(fx.verifier.calls(), 0);

    // The timed-out connection may still deliver the late reply, so the retry
    // runs on a new one.
    let second = fx.provision(&key).await.unwrap();
    assert_eq!(second.state, ProvisioningState::Verified);
    assert_eq!(fx.connector.connect_count(), 2);
}

#[tokio::test]
async fn test_dropped_request_does_not_poison_later_attempts() {
    let gateway_key = Ed25519KeyPair::generate();
    let frame = codec::encode_envelope(&signed_response(&gateway_key, true)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let responder: Responder = {
        let calls = calls.clone();
        Arc::new(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                None
            } else {
                Some((Duration::ZERO, frame.clone()))
            }
        })
    };
    let fx = Fixture::new(gateway_key, ScriptedConnector::new(responder));
    let key = KeyMaterial::generate();

    assert!(matches!(
        fx.provision(&key).await,
        Err(AdminError::Timeout { .. })
    ));
    for _ in 0..3 {
        let active = fx.provision(&key).await.unwrap();
        assert_eq!(active.state, ProvisioningState::Verified);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(fx.connector.connect_count(), 2);
}

#[tokio::test]
async fn test_silent_gateway_times_out() {
    let fx = Fixture::new(Ed25519KeyPair::generate(), ScriptedConnector::silent());

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(result, Err(AdminError::Timeout { .. })));
    assert!(result.unwrap_err().is_retryable());
}

#[tokio::test]
async fn test_tampered_response_fails_signature() {
    let gateway_key = Ed25519KeyPair::generate();
    let mut envelope = signed_response(&gateway_key, false);
    envelope.body = codec::encode_body(&AcceptKeyResponse { key_accepted: true }).unwrap();
    let fx = Fixture::new(
        gateway_key,
        ScriptedConnector::new(replying(envelope, Duration::ZERO)),
    );

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(result, Err(AdminError::Signature(_))));
    assert_eq!(fx.verifier.calls(), 1);
}

#[tokio::test]
async fn test_response_signed_by_other_key_fails_signature() {
    let impostor = Ed25519KeyPair::generate();
    let fx = Fixture::new(
        Ed25519KeyPair::generate(),
        ScriptedConnector::new(replying(signed_response(&impostor, true), Duration::ZERO)),
    );

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(result, Err(AdminError::Signature(_))));
}

#[tokio::test]
async fn test_rejection_is_key_rejected() {
    let gateway_key = Ed25519KeyPair::generate();
    let connector = ScriptedConnector::new(replying(
        signed_response(&gateway_key, false),
        Duration::ZERO,
    ));
    let fx = Fixture::new(gateway_key, connector);

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(result, Err(AdminError::KeyRejected(id)) if id == fx.descriptor.node_id()));
}

#[tokio::test]
async fn test_wrong_type_never_reaches_verifier() {
    let gateway_key = Ed25519KeyPair::generate();
    let mut envelope = signed_response(&gateway_key, true);
    envelope.message_type = MessageType::AdminAcceptKeyChallenge.as_u8();
    let fx = Fixture::new(
        gateway_key,
        ScriptedConnector::new(replying(envelope, Duration::ZERO)),
    );

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(
        result,
        Err(AdminError::UnexpectedMessage {
            expected: 0x31,
            got: 0x30
        })
    ));
    assert_eq!(fx.verifier.calls(), 0);
}

#[tokio::test]
async fn test_unverified_body_is_never_decoded() {
    let gateway_key = Ed25519KeyPair::generate();
    let mut envelope = Envelope::unsigned(MessageType::AdminAcceptKeyResponse, vec![0xff; 9]);
    envelope.signature = vec![0; 64];
    let fx = Fixture::with_verifier(
        gateway_key,
        ScriptedConnector::new(replying(envelope, Duration::ZERO)),
        CountingVerifier::always(false),
    );

    let result = fx.provision(&KeyMaterial::generate()).await;

    // A garbage body would be a codec error if it were decoded.
    assert!(matches!(result, Err(AdminError::Signature(_))));
    assert_eq!(fx.verifier.calls(), 1);
}

#[tokio::test]
async fn test_malformed_signature_is_signature_error() {
    let gateway_key = Ed25519KeyPair::generate();
    let mut envelope = signed_response(&gateway_key, true);
    envelope.signature.truncate(10);
    let fx = Fixture::new(
        gateway_key,
        ScriptedConnector::new(replying(envelope, Duration::ZERO)),
    );

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(result, Err(AdminError::Signature(_))));
}

#[tokio::test]
async fn test_unknown_node_fails_before_io() {
    let gateway_key = Ed25519KeyPair::generate();
    let mut fx = Fixture::new(gateway_key, ScriptedConnector::silent());
    fx.descriptor = GatewayDescriptor::new(fx.gateway_key.public_key(), "");

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(result, Err(AdminError::UnknownNode(_))));
    assert_eq!(fx.connector.connect_count(), 0);
}

#[tokio::test]
async fn test_blocked_host_fails_without_connecting() {
    let fx = Fixture::new(Ed25519KeyPair::generate(), ScriptedConnector::silent());
    fx.protocol
        .registry()
        .block(BlockTarget::parse("10.1.0.7").unwrap())
        .await
        .unwrap();

    let result = fx.provision(&KeyMaterial::generate()).await;

    assert!(matches!(result, Err(AdminError::Blocked(_))));
    assert_eq!(fx.connector.connect_count(), 0);
    assert!(fx.connector.sent_frames().is_empty());
}

#[tokio::test]
async fn test_shutdown_during_wait_is_network_error() {
    let fx = Arc::new(Fixture::new(
        Ed25519KeyPair::generate(),
        ScriptedConnector::new(Arc::new(|_| {
            Some((Duration::from_secs(30), Bytes::from_static(b"late")))
        })),
    ));

    let pending = {
        let fx = fx.clone();
        tokio::spawn(async move { fx.provision(&KeyMaterial::generate()).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    fx.protocol.registry().shutdown().await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(AdminError::Network(_))));
}
