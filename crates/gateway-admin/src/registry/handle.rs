//! Shared handle to one pooled connection.
//!
//! The connection sits behind an async mutex so exactly one request/response
//! exchange runs on it at a time. A cancellation token lets the registry
//! close the connection out from under a blocked reader.

use crate::domain::{AdminError, NodeId};
use crate::ports::Connection;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Slot {
    conn: Box<dyn Connection>,
    /// Set after a failed or timed-out write or read. Never reused once set.
    broken: bool,
}

/// Cloneable reference to a pooled connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: u64,
    node_id: NodeId,
    address: Arc<str>,
    slot: Arc<Mutex<Slot>>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Wrap a freshly opened connection.
    pub fn new(id: u64, node_id: NodeId, address: &str, conn: Box<dyn Connection>) -> Self {
        Self {
            id,
            node_id,
            address: Arc::from(address),
            slot: Arc::new(Mutex::new(Slot {
                conn,
                broken: false,
            })),
            closed: CancellationToken::new(),
        }
    }

    /// Registry-assigned connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Node this connection belongs to.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Address the connection was opened to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether both handles refer to the same underlying connection.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Whether the connection has been closed by the registry.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Open and not broken. A connection busy with an exchange counts as healthy.
    pub fn is_healthy(&self) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        match self.slot.try_lock() {
            Ok(slot) => !slot.broken && slot.conn.is_open(),
            Err(_) => true,
        }
    }

    /// Take exclusive use of the connection for one exchange.
    pub async fn acquire(&self) -> Result<ExclusiveConnection<'_>, AdminError> {
        if self.closed.is_cancelled() {
            return Err(self.closed_error());
        }
        let slot = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(self.closed_error()),
            slot = self.slot.lock() => slot,
        };
        Ok(ExclusiveConnection { slot, handle: self })
    }

    /// Close the connection. Any exchange blocked on it fails with `Network`.
    pub async fn close(&self) {
        self.closed.cancel();
        let mut slot = self.slot.lock().await;
        slot.broken = true;
        slot.conn.close().await;
        debug!(conn_id = self.id, node = %self.node_id.short(), "connection closed");
    }

    fn closed_error(&self) -> AdminError {
        AdminError::Network(format!(
            "connection {} to {} was closed",
            self.id, self.address
        ))
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("node_id", &self.node_id)
            .field("address", &&*self.address)
            .finish()
    }
}

/// Exclusive access to a connection for the duration of one exchange.
pub struct ExclusiveConnection<'a> {
    slot: MutexGuard<'a, Slot>,
    handle: &'a ConnectionHandle,
}

impl ExclusiveConnection<'_> {
    /// Write one frame within `timeout`. Any failure breaks the connection.
    pub async fn send(&mut self, frame: Bytes, timeout: Duration) -> Result<(), AdminError> {
        let handle = self.handle;
        if self.slot.broken {
            return Err(handle.closed_error());
        }

        let conn = &mut self.slot.conn;
        let result = tokio::select! {
            biased;
            _ = handle.closed.cancelled() => Err(handle.closed_error()),
            r = tokio::time::timeout(timeout, conn.send_frame(frame)) => {
                r.unwrap_or_else(|_| Err(AdminError::Timeout {
                    operation: "write",
                    after: timeout,
                }))
            }
        };
        if result.is_err() {
            self.slot.broken = true;
        }
        result
    }

    /// Read the response to the request just sent, within `timeout`.
    ///
    /// Any failure, a timeout included, breaks the connection: a reply that
    /// arrives late can no longer be matched to its request, so the registry
    /// dials a fresh connection for the next attempt.
    pub async fn recv(&mut self, timeout: Duration) -> Result<Bytes, AdminError> {
        let handle = self.handle;
        if self.slot.broken {
            return Err(handle.closed_error());
        }

        let conn = &mut self.slot.conn;
        let result = tokio::select! {
            biased;
            _ = handle.closed.cancelled() => Err(handle.closed_error()),
            r = tokio::time::timeout(timeout, conn.recv_frame()) => {
                r.unwrap_or_else(|_| Err(AdminError::Timeout {
                    operation: "response",
                    after: timeout,
                }))
            }
        };
        if result.is_err() {
            self.slot.broken = true;
            debug!(
                conn_id = handle.id,
                node = %handle.node_id.short(),
                "connection marked broken"
            );
        }
        result
    }
}
