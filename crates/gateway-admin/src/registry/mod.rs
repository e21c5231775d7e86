//! # Connection Registry
//!
//! Node-keyed pool of outbound gateway connections.
//!
//! ## Locking
//!
//! - The node → slot map, registered addresses and deny-list live behind one
//!   `parking_lot::RwLock`. Lookups take the read lock; registration, removal
//!   and slot creation take the write lock. The lock is never held across an
//!   `.await`.
//! - Each node has its own async mutex slot. Creating a connection holds the
//!   slot, so two callers for the same node never dial twice, while callers
//!   for different nodes connect in parallel.

mod blocklist;
mod handle;

pub use blocklist::{BlockList, BlockTarget};
pub use handle::{ConnectionHandle, ExclusiveConnection};

use crate::domain::{AdminError, NodeId};
use crate::ports::Connector;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Registry tuning.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Bound on establishing a new connection.
    pub connect_timeout: Duration,
    /// Pooled connections unused for longer are replaced on next use.
    pub idle_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// One pooled connection.
struct PoolEntry {
    handle: ConnectionHandle,
    address: String,
    last_activity: Instant,
}

type NodeSlot = Arc<Mutex<Option<PoolEntry>>>;

#[derive(Default)]
struct RegistryState {
    closed: bool,
    addresses: HashMap<NodeId, String>,
    slots: HashMap<NodeId, NodeSlot>,
    blocked: BlockList,
}

/// Snapshot of registry counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Nodes with a registered address.
    pub registered: usize,
    /// Nodes with a pool slot (connected or being connected).
    pub slots: usize,
    /// Deny-list entries.
    pub blocked: usize,
    /// Connections opened over the registry's lifetime.
    pub connections_opened: u64,
}

/// Supplies and reuses gateway connections keyed by node identity.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    next_conn_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Create an empty registry dialling through `connector`.
    pub fn new(connector: Arc<dyn Connector>, config: RegistryConfig) -> Self {
        Self {
            connector,
            config,
            state: RwLock::new(RegistryState::default()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Record or update the address of `node_id`. Open connections are untouched.
    pub fn register(&self, node_id: NodeId, address: &str) -> Result<(), AdminError> {
        let mut state = self.state.write();
        if state.closed {
            return Err(AdminError::RegistryClosed);
        }
        let previous = state.addresses.insert(node_id, address.to_string());
        if previous.as_deref() != Some(address) {
            debug!(node = %node_id.short(), address, "registered gateway address");
        }
        Ok(())
    }

    /// Address registered for `node_id`.
    pub fn registered_address(&self, node_id: &NodeId) -> Option<String> {
        self.state.read().addresses.get(node_id).cloned()
    }

    /// Return the pooled connection for `node_id`, opening one if needed.
    ///
    /// # Errors
    ///
    /// - `RegistryClosed` after [`ConnectionRegistry::shutdown`]
    /// - `UnknownNode` if no address was registered
    /// - `Blocked` if the node or its address is denied
    /// - `Connect` / `Timeout` if dialling fails
    pub async fn get_or_create(&self, node_id: &NodeId) -> Result<ConnectionHandle, AdminError> {
        loop {
            let slot = match self.lookup(node_id)? {
                (_, Some(slot)) => slot,
                (_, None) => self.insert_slot(node_id)?,
            };

            let mut pooled = slot.lock().await;

            // The world may have moved on while we waited for the slot.
            let (address, current) = self.lookup(node_id)?;
            if !current.is_some_and(|current| Arc::ptr_eq(&current, &slot)) {
                continue;
            }

            if let Some(entry) = pooled.as_mut() {
                let idle = self
                    .config
                    .idle_timeout
                    .is_some_and(|limit| entry.last_activity.elapsed() > limit);
                if entry.handle.is_healthy() && !idle && entry.address == address {
                    entry.last_activity = Instant::now();
                    return Ok(entry.handle.clone());
                }
                debug!(
                    node = %node_id.short(),
                    conn_id = entry.handle.id(),
                    idle,
                    "replacing stale pooled connection"
                );
                if let Some(stale) = pooled.take() {
                    stale.handle.close().await;
                }
            }

            let conn = match self
                .connector
                .connect(&address, self.config.connect_timeout)
                .await
            {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(node = %node_id.short(), %address, error = %e, "connect failed");
                    return Err(e);
                }
            };

            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let handle = ConnectionHandle::new(conn_id, *node_id, &address, conn);

            if self.state.read().closed {
                handle.close().await;
                return Err(AdminError::RegistryClosed);
            }

            info!(node = %node_id.short(), %address, conn_id, "connection established");
            *pooled = Some(PoolEntry {
                handle: handle.clone(),
                address,
                last_activity: Instant::now(),
            });
            return Ok(handle);
        }
    }

    /// Close and discard the pooled connection for `node_id`, if any.
    pub async fn remove(&self, node_id: &NodeId) {
        let slot = self.state.write().slots.remove(node_id);
        if let Some(slot) = slot {
            close_slot(&slot).await;
        }
    }

    /// Deny connections to a node id or host, closing matching pooled connections.
    ///
    /// Returns the nodes whose connections were torn down.
    pub async fn block(&self, target: BlockTarget) -> Result<Vec<NodeId>, AdminError> {
        let evicted: Vec<(NodeId, NodeSlot)> = {
            let mut state = self.state.write();
            if state.closed {
                return Err(AdminError::RegistryClosed);
            }
            let affected: Vec<NodeId> = match &target {
                BlockTarget::Node(id) => vec![*id],
                BlockTarget::Host(_) => state
                    .addresses
                    .iter()
                    .filter(|(id, addr)| target.matches(id, addr))
                    .map(|(id, _)| *id)
                    .collect(),
            };
            info!(%target, matched = affected.len(), "blocking");
            state.blocked.block(target);
            affected
                .into_iter()
                .filter_map(|id| state.slots.remove(&id).map(|slot| (id, slot)))
                .collect()
        };

        let mut nodes = Vec::with_capacity(evicted.len());
        for (node_id, slot) in evicted {
            close_slot(&slot).await;
            nodes.push(node_id);
        }
        Ok(nodes)
    }

    /// Lift a deny-list entry. Returns whether it was present.
    pub fn unblock(&self, target: &BlockTarget) -> Result<bool, AdminError> {
        let mut state = self.state.write();
        if state.closed {
            return Err(AdminError::RegistryClosed);
        }
        let removed = state.blocked.unblock(target);
        info!(%target, removed, "unblocking");
        Ok(removed)
    }

    /// Whether `node_id` (at its registered address, if any) is blocked.
    pub fn is_blocked(&self, node_id: &NodeId) -> bool {
        let state = self.state.read();
        let address = state.addresses.get(node_id).map(String::as_str).unwrap_or("");
        state.blocked.is_blocked(node_id, address)
    }

    /// Close every pooled connection and refuse further use. Idempotent.
    pub async fn shutdown(&self) {
        let slots: Vec<NodeSlot> = {
            let mut state = self.state.write();
            if state.closed {
                return;
            }
            state.closed = true;
            state.addresses.clear();
            state.slots.drain().map(|(_, slot)| slot).collect()
        };
        info!(connections = slots.len(), "shutting down connection registry");
        for slot in slots {
            close_slot(&slot).await;
        }
    }

    /// Whether [`ConnectionRegistry::shutdown`] has run.
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Nodes with a pool slot.
    pub fn pooled_count(&self) -> usize {
        self.state.read().slots.len()
    }

    /// Counters for diagnostics.
    pub fn stats(&self) -> RegistryStats {
        let state = self.state.read();
        RegistryStats {
            registered: state.addresses.len(),
            slots: state.slots.len(),
            blocked: state.blocked.len(),
            connections_opened: self.next_conn_id.load(Ordering::Relaxed) - 1,
        }
    }

    /// Registered address and existing slot for `node_id`, after policy checks.
    fn lookup(&self, node_id: &NodeId) -> Result<(String, Option<NodeSlot>), AdminError> {
        let state = self.state.read();
        if state.closed {
            return Err(AdminError::RegistryClosed);
        }
        let address = state
            .addresses
            .get(node_id)
            .ok_or(AdminError::UnknownNode(*node_id))?;
        if let Some(target) = state.blocked.blocking(node_id, address) {
            return Err(AdminError::Blocked(target.to_string()));
        }
        Ok((address.clone(), state.slots.get(node_id).cloned()))
    }

    fn insert_slot(&self, node_id: &NodeId) -> Result<NodeSlot, AdminError> {
        let mut state = self.state.write();
        if state.closed {
            return Err(AdminError::RegistryClosed);
        }
        Ok(state.slots.entry(*node_id).or_default().clone())
    }
}

async fn close_slot(slot: &NodeSlot) {
    let entry = slot.lock().await.take();
    if let Some(entry) = entry {
        entry.handle.close().await;
    }
}
