//! Per service kind bookkeeping: live nodes, master and hash buckets

use indexmap::IndexMap;
use serde::Serialize;
use switchyard_connection::Token;
use switchyard_node_id::{NodeId, ServiceId};

/// One connected instance of a service kind
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ServiceNode {
    /// Composite node id
    pub id: NodeId,
    /// Connection handle, never 0 while registered
    pub token: Token,
    /// Instance index from the id
    pub index: u16,
    /// Group from the id
    pub group: u8,
    /// 0 is healthy, anything else is degraded or unavailable
    pub status: u8,
}

impl ServiceNode {
    pub(crate) const fn new(id: NodeId, token: Token) -> Self {
        Self {
            id,
            token,
            index: id.index(),
            group: id.group(),
            status: 0,
        }
    }

    /// Whether this node may be elected master or serve a dynamic bucket
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.status == 0
    }
}

/// Everything known about one service kind
#[derive(Debug, Default)]
pub struct ServiceGroup {
    /// Nodes keyed by id, in registration order
    nodes: IndexMap<NodeId, ServiceNode>,
    /// Current master; always a healthy member of `nodes`
    master: Option<NodeId>,
    /// Fixed bucket count, 0 for dynamic mode
    hash: u16,
    /// Current bucket table
    hash_ids: Vec<NodeId>,
    flow_in: u64,
    flow_out: u64,
}

impl ServiceGroup {
    /// Looks up a registered node
    #[must_use]
    pub fn get_target(&self, id: NodeId) -> Option<&ServiceNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_target_mut(&mut self, id: NodeId) -> Option<&mut ServiceNode> {
        self.nodes.get_mut(&id)
    }

    /// Registered nodes in registration order
    pub fn nodes(&self) -> impl Iterator<Item = &ServiceNode> {
        self.nodes.values()
    }

    /// Number of registered nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current master node
    #[must_use]
    pub fn master(&self) -> Option<&ServiceNode> {
        self.master.and_then(|id| self.nodes.get(&id))
    }

    /// Configured bucket count, 0 in dynamic mode
    #[must_use]
    pub const fn hash(&self) -> u16 {
        self.hash
    }

    /// Current bucket table
    #[must_use]
    pub fn hash_ids(&self) -> &[NodeId] {
        &self.hash_ids
    }

    /// Raises the bucket count. Never lowers it.
    pub(crate) fn upgrade_hash(&mut self, hash: u16) -> bool {
        if hash > self.hash {
            self.hash = hash;
            true
        } else {
            false
        }
    }

    /// Inserts or replaces a node. A replaced node keeps its position.
    pub(crate) fn insert(&mut self, node: ServiceNode) {
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<ServiceNode> {
        self.nodes.shift_remove(&id)
    }

    /// Elects the first healthy node in registration order
    pub(crate) fn choose_master(&mut self) -> NodeId {
        self.master = self
            .nodes
            .values()
            .find(|node| node.is_healthy())
            .map(|node| node.id);
        self.master.unwrap_or(NodeId::NONE)
    }

    /// Rebuilds the bucket table.
    ///
    /// Fixed mode yields `hash` virtual ids `(group, service_id, 1..=hash)`.
    /// Dynamic mode yields the healthy node ids in ascending order.
    pub(crate) fn flush_hash(&mut self, group: u8, service_id: ServiceId) {
        self.hash_ids.clear();
        if self.hash > 0 {
            self.hash_ids
                .extend((1..=self.hash).map(|index| NodeId::build(group, service_id, index)));
        } else {
            self.hash_ids.extend(
                self.nodes
                    .values()
                    .filter(|node| node.is_healthy())
                    .map(|node| node.id),
            );
            self.hash_ids.sort_unstable();
        }
    }

    /// Resolves a hash selector to a live node
    #[must_use]
    pub fn hash_target(&self, hash: u32) -> Option<&ServiceNode> {
        if self.hash_ids.is_empty() {
            return None;
        }
        let bucket = hash as usize % self.hash_ids.len();
        self.nodes
            .get(&self.hash_ids[bucket])
            .filter(|node| node.token != 0)
    }

    /// Accumulated outbound and inbound bytes
    #[must_use]
    pub const fn flow(&self) -> (u64, u64) {
        (self.flow_out, self.flow_in)
    }

    pub(crate) fn flow_inc(&mut self, out_bytes: u64, in_bytes: u64) {
        self.flow_out += out_bytes;
        self.flow_in += in_bytes;
    }

    pub(crate) fn flow_clear(&mut self) {
        self.flow_out = 0;
        self.flow_in = 0;
    }
}
