//! Scripted in-memory transport and recording fakes for unit tests.

use crate::domain::{AdminError, GatewayDescriptor};
use crate::ports::{Connection, Connector, GatewayRegistrar, MessageVerifier};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use shared_crypto::{CryptoError, Ed25519PublicKey, KeyVersion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Maps a request frame to an optional delayed reply.
pub(crate) type Responder = Arc<dyn Fn(&[u8]) -> Option<(Duration, Bytes)> + Send + Sync>;

/// Connector whose connections answer through a [`Responder`].
pub(crate) struct ScriptedConnector {
    responder: Responder,
    connect_delay: Duration,
    refuse: bool,
    connects: AtomicUsize,
    dialled: Mutex<Vec<String>>,
    sent: Arc<Mutex<Vec<Bytes>>>,
}

impl ScriptedConnector {
    pub(crate) fn new(responder: Responder) -> Self {
        Self {
            responder,
            connect_delay: Duration::ZERO,
            refuse: false,
            connects: AtomicUsize::new(0),
            dialled: Mutex::new(Vec::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connections that never answer.
    pub(crate) fn silent() -> Self {
        Self::new(Arc::new(|_| None))
    }

    pub(crate) fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub(crate) fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn dialled(&self) -> Vec<String> {
        self.dialled.lock().clone()
    }

    pub(crate) fn sent_frames(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        address: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>, AdminError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.dialled.lock().push(address.to_string());
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.refuse {
            return Err(AdminError::Connect {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }
        // Replies are produced one at a time, in request order.
        let (work_tx, mut work_rx) = mpsc::unbounded_channel::<(Duration, Bytes)>();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some((delay, reply)) = work_rx.recv().await {
                tokio::time::sleep(delay).await;
                if tx.send(reply).is_err() {
                    break;
                }
            }
        });
        Ok(Box::new(ScriptedConnection {
            address: address.to_string(),
            responder: self.responder.clone(),
            sent: self.sent.clone(),
            work_tx,
            rx,
            open: true,
        }))
    }
}

struct ScriptedConnection {
    address: String,
    responder: Responder,
    sent: Arc<Mutex<Vec<Bytes>>>,
    work_tx: mpsc::UnboundedSender<(Duration, Bytes)>,
    rx: mpsc::UnboundedReceiver<Bytes>,
    open: bool,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), AdminError> {
        if !self.open {
            return Err(AdminError::Network("connection closed".into()));
        }
        self.sent.lock().push(frame.clone());
        if let Some(reply) = (self.responder)(&frame) {
            let _ = self.work_tx.send(reply);
        }
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Bytes, AdminError> {
        if !self.open {
            return Err(AdminError::Network("connection closed".into()));
        }
        self.rx
            .recv()
            .await
            .ok_or_else(|| AdminError::Network("connection closed".into()))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) {
        self.open = false;
    }

    fn remote_addr(&self) -> &str {
        &self.address
    }
}

/// Verifier that delegates to Ed25519 and counts calls.
#[derive(Default)]
pub(crate) struct CountingVerifier {
    calls: AtomicUsize,
    force: Option<bool>,
}

impl CountingVerifier {
    /// Always answers `result` without checking anything.
    pub(crate) fn always(result: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            force: Some(result),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MessageVerifier for CountingVerifier {
    fn verify(
        &self,
        public_key: &Ed25519PublicKey,
        signature: &[u8],
        message: &[u8],
    ) -> Result<bool, CryptoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.force {
            Some(result) => Ok(result),
            None => crate::adapters::Ed25519Verifier.verify(public_key, signature, message),
        }
    }
}

/// Registrar that records calls and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingRegistrar {
    registered: Mutex<Vec<(GatewayDescriptor, KeyVersion)>>,
    fail: bool,
}

impl RecordingRegistrar {
    pub(crate) fn failing() -> Self {
        Self {
            registered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn registered(&self) -> Vec<(GatewayDescriptor, KeyVersion)> {
        self.registered.lock().clone()
    }
}

#[async_trait]
impl GatewayRegistrar for RecordingRegistrar {
    async fn register_gateway(
        &self,
        descriptor: &GatewayDescriptor,
        key_version: KeyVersion,
    ) -> Result<(), AdminError> {
        self.registered
            .lock()
            .push((descriptor.clone(), key_version));
        if self.fail {
            return Err(AdminError::Registration("registry unavailable".into()));
        }
        Ok(())
    }
}
