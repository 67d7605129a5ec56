//! Membership oracle: who owns which shard.
//!
//! The oracle is the registry's black-box view of cluster membership. It
//! answers one question, `owner_of(shard)`, and signals topology changes by
//! bumping an epoch broadcast through a `watch` channel. How the answer is
//! produced (gossip, consensus, a static file) is not the registry's
//! concern.

use std::sync::RwLock;

use tokio::sync::watch;

use crate::error::RegistryError;
use crate::registry::ShardId;

/// Identifier of one process in the cluster.
pub type NodeId = String;

/// Cluster-membership view consulted by the shard registry.
pub trait MembershipOracle: Send + Sync + 'static {
    /// The node this process runs as.
    fn local_node(&self) -> NodeId;

    /// Names the node currently owning `shard`.
    ///
    /// Fails with [`RegistryError::Unavailable`] when ownership cannot be
    /// decided (for example an empty membership view mid-rebalance).
    fn owner_of(&self, shard: ShardId) -> Result<NodeId, RegistryError>;

    /// Subscribes to rebalance notifications.
    ///
    /// The value is an epoch counter; any observed change means shard
    /// ownership may have moved and live placements must be revalidated.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Oracle over an explicitly managed node set.
///
/// Shards are assigned to nodes by modulo over the sorted node list, which
/// keeps the assignment deterministic on every node holding the same view.
/// Each membership change bumps the epoch.
pub struct StaticMembership {
    local: NodeId,
    nodes: RwLock<Vec<NodeId>>,
    epoch: watch::Sender<u64>,
}

impl StaticMembership {
    /// Creates a view where `local` is the only member and owns everything.
    pub fn single_node(local: impl Into<NodeId>) -> Self {
        let local = local.into();
        Self::new(local.clone(), vec![local])
    }

    /// Creates a view over an explicit node set.
    pub fn new(local: impl Into<NodeId>, nodes: Vec<NodeId>) -> Self {
        let mut nodes = nodes;
        nodes.sort();
        nodes.dedup();
        let (epoch, _) = watch::channel(0);
        Self {
            local: local.into(),
            nodes: RwLock::new(nodes),
            epoch,
        }
    }

    /// Adds a node and bumps the epoch.
    pub fn add_node(&self, node: impl Into<NodeId>) {
        let node = node.into();
        {
            let mut nodes = self.nodes.write().expect("membership lock");
            if nodes.contains(&node) {
                return;
            }
            nodes.push(node);
            nodes.sort();
        }
        self.bump_epoch();
    }

    /// Removes a node and bumps the epoch. Returns true if it was present.
    pub fn remove_node(&self, node: &str) -> bool {
        let removed = {
            let mut nodes = self.nodes.write().expect("membership lock");
            let before = nodes.len();
            nodes.retain(|n| n != node);
            nodes.len() != before
        };
        if removed {
            self.bump_epoch();
        }
        removed
    }

    /// Sorted list of current members.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes.read().expect("membership lock").clone()
    }

    fn bump_epoch(&self) {
        self.epoch.send_modify(|e| *e += 1);
    }
}

impl MembershipOracle for StaticMembership {
    fn local_node(&self) -> NodeId {
        self.local.clone()
    }

    fn owner_of(&self, shard: ShardId) -> Result<NodeId, RegistryError> {
        let nodes = self.nodes.read().expect("membership lock");
        if nodes.is_empty() {
            return Err(RegistryError::Unavailable {
                reason: "membership is empty".to_string(),
            });
        }
        Ok(nodes[shard as usize % nodes.len()].clone())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.epoch.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_node_owns_every_shard() {
        let oracle = StaticMembership::single_node("a");
        for shard in 0..64 {
            assert_eq!(oracle.owner_of(shard).unwrap(), "a");
        }
    }

    #[test]
    fn test_assignment_is_deterministic_across_views() {
        let left = StaticMembership::new("a", vec!["a".into(), "b".into()]);
        let right = StaticMembership::new("b", vec!["b".into(), "a".into()]);
        for shard in 0..64 {
            assert_eq!(
                left.owner_of(shard).unwrap(),
                right.owner_of(shard).unwrap()
            );
        }
    }

    #[test]
    fn test_membership_change_bumps_epoch() {
        let oracle = StaticMembership::single_node("a");
        let rx = oracle.subscribe();
        assert_eq!(*rx.borrow(), 0);

        oracle.add_node("b");
        assert_eq!(*rx.borrow(), 1);

        // Adding an existing node is a no-op.
        oracle.add_node("b");
        assert_eq!(*rx.borrow(), 1);

        assert!(oracle.remove_node("b"));
        assert_eq!(*rx.borrow(), 2);
        assert!(!oracle.remove_node("b"));
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn test_empty_membership_is_unavailable() {
        let oracle = StaticMembership::new("a", vec![]);
        assert!(matches!(
            oracle.owner_of(3),
            Err(RegistryError::Unavailable { .. })
        ));
    }
}
