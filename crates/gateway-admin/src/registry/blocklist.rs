//! Deny-list of node identities and hosts.

use crate::domain::{AdminError, NodeId};
use std::collections::HashSet;
use std::fmt;

/// Something that can be blocked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockTarget {
    /// A node identity.
    Node(NodeId),
    /// A host name, IP, or `host:port`, stored lowercase.
    Host(String),
}

impl BlockTarget {
    /// 64 hex characters parse as a node id; anything else is a host.
    pub fn parse(raw: &str) -> Result<Self, AdminError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AdminError::Configuration(
                "block target must not be empty".to_string(),
            ));
        }
        if trimmed.len() == 64 {
            if let Ok(node_id) = trimmed.parse::<NodeId>() {
                return Ok(BlockTarget::Node(node_id));
            }
        }
        Ok(BlockTarget::Host(trimmed.to_ascii_lowercase()))
    }

    /// Whether this target covers `node_id` reachable at `address`.
    pub fn matches(&self, node_id: &NodeId, address: &str) -> bool {
        match self {
            BlockTarget::Node(id) => id == node_id,
            BlockTarget::Host(host) => {
                let address = address.to_ascii_lowercase();
                *host == address || *host == host_part(&address)
            }
        }
    }
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTarget::Node(id) => write!(f, "node {}", id),
            BlockTarget::Host(host) => write!(f, "host {}", host),
        }
    }
}

/// Host portion of a `host:port` string. `[v6]:port` and bare v6 are handled.
pub(crate) fn host_part(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match address.rsplit_once(':') {
        Some((host, _port)) if !host.contains(':') => host,
        _ => address,
    }
}

/// Set of blocked node ids and hosts.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    entries: HashSet<BlockTarget>,
}

impl BlockList {
    /// Create an empty deny-list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns false if it was already present.
    pub fn block(&mut self, target: BlockTarget) -> bool {
        self.entries.insert(target)
    }

    /// Remove an entry. Returns false if it was not present.
    pub fn unblock(&mut self, target: &BlockTarget) -> bool {
        self.entries.remove(target)
    }

    /// The entry that blocks `node_id` at `address`, if any.
    pub fn blocking(&self, node_id: &NodeId, address: &str) -> Option<&BlockTarget> {
        self.entries.iter().find(|t| t.matches(node_id, address))
    }

    /// Whether `node_id` at `address` is blocked.
    pub fn is_blocked(&self, node_id: &NodeId, address: &str) -> bool {
        self.blocking(node_id, address).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_id_target() {
        let id = NodeId::new([0x5a; 32]);
        assert_eq!(BlockTarget::parse(&id.to_hex()).unwrap(), BlockTarget::Node(id));
    }

    #[test]
    fn test_parse_host_target_lowercases() {
        assert_eq!(
            BlockTarget::parse(" Gateway-1.Local ").unwrap(),
            BlockTarget::Host("gateway-1.local".to_string())
        );
    }

    #[test]
    fn test_parse_empty_is_configuration_error() {
        assert!(matches!(
            BlockTarget::parse("   "),
            Err(AdminError::Configuration(_))
        ));
    }

    #[test]
    fn test_host_part() {
        assert_eq!(host_part("gateway:9013"), "gateway");
        assert_eq!(host_part("10.0.0.1:9013"), "10.0.0.1");
        assert_eq!(host_part("[::1]:9013"), "::1");
        assert_eq!(host_part("::1"), "::1");
        assert_eq!(host_part("gateway"), "gateway");
    }

    #[test]
    fn test_host_blocks_any_port() {
        let mut list = BlockList::new();
        list.block(BlockTarget::Host("10.0.0.1".to_string()));
        let node = NodeId::new([1u8; 32]);
        assert!(list.is_blocked(&node, "10.0.0.1:9013"));
        assert!(list.is_blocked(&node, "10.0.0.1:9999"));
        assert!(!list.is_blocked(&node, "10.0.0.2:9013"));
    }

    #[test]
    fn test_host_port_blocks_exact_address() {
        let mut list = BlockList::new();
        list.block(BlockTarget::Host("gateway:9013".to_string()));
        let node = NodeId::new([1u8; 32]);
        assert!(list.is_blocked(&node, "GATEWAY:9013"));
        assert!(!list.is_blocked(&node, "gateway:9014"));
    }

    #[test]
    fn test_unblock() {
        let mut list = BlockList::new();
        let node = NodeId::new([2u8; 32]);
        let target = BlockTarget::Node(node);
        assert!(list.block(target.clone()));
        assert!(!list.block(target.clone()));
        assert!(list.is_blocked(&node, "anywhere:1"));
        assert!(list.unblock(&target));
        assert!(!list.is_blocked(&node, "anywhere:1"));
        assert!(list.is_empty());
    }
}
