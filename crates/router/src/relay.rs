//! Relay-capable router nodes and round-robin selection among them

use std::collections::HashSet;

use switchyard_node_id::{NodeId, ServiceId};
use tracing::debug;

/// A relay node and what it can reach
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RouterNode {
    /// Router node id
    pub id: NodeId,
    /// Node ids reachable through this router
    pub targets: HashSet<NodeId>,
    /// Service kinds reachable through this router, derived from `targets`
    pub groups: HashSet<ServiceId>,
}

impl RouterNode {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    fn flush_group(&mut self) {
        self.groups = self.targets.iter().map(|t| t.service_id()).collect();
    }

    fn serves(&self, target_id: NodeId, service_id: ServiceId) -> bool {
        if target_id.is_none() {
            self.groups.contains(&service_id)
        } else {
            self.targets.contains(&target_id)
        }
    }
}

/// Known routers ordered by id, with a round-robin cursor.
///
/// `cursor` is an index into `routers`; `routers.len()` means "at the end".
/// Inserting a router resets the cursor to the start, removing one moves it
/// to the entry that followed the removed router.
#[derive(Debug, Default)]
pub struct RouterTable {
    routers: Vec<RouterNode>,
    cursor: usize,
}

impl RouterTable {
    fn position(&self, router_id: NodeId) -> Result<usize, usize> {
        self.routers.binary_search_by_key(&router_id, |r| r.id)
    }

    /// Forgets a router entirely
    pub fn clear(&mut self, router_id: NodeId) -> bool {
        match self.position(router_id) {
            Ok(pos) => {
                self.routers.remove(pos);
                self.cursor = pos;
                debug!("router {} cleared", router_id);
                true
            }
            Err(_) => false,
        }
    }

    /// Marks `target_id` reachable or unreachable through `router_id`.
    ///
    /// An unknown router is only created by a reachable update.
    pub fn set_target(&mut self, router_id: NodeId, target_id: NodeId, reachable: bool) {
        match self.position(router_id) {
            Ok(pos) => {
                let router = &mut self.routers[pos];
                if reachable {
                    router.targets.insert(target_id);
                } else {
                    router.targets.remove(&target_id);
                }
                router.flush_group();
            }
            Err(pos) if reachable => {
                let mut router = RouterNode::new(router_id);
                router.targets.insert(target_id);
                router.flush_group();
                self.routers.insert(pos, router);
                self.cursor = 0;
                debug!("router {} added, {} known", router_id, self.routers.len());
            }
            Err(_) => {}
        }
    }

    /// Picks the next router able to reach `target_id`, or `service_id` when
    /// no target is given. Returns [`NodeId::NONE`] when none qualifies.
    ///
    /// The scan starts one past the previous pick and wraps once, so callers
    /// asking for the same key rotate through every qualifying router.
    pub fn find_transfer_router(&mut self, target_id: NodeId, service_id: ServiceId) -> NodeId {
        let len = self.routers.len();
        self.cursor = if self.cursor < len { self.cursor + 1 } else { 0 };

        if target_id.is_none() && service_id == 0 {
            return NodeId::NONE;
        }

        let start = self.cursor;
        let found = (start..len)
            .chain(0..start.min(len))
            .find(|&i| self.routers[i].serves(target_id, service_id));

        match found {
            Some(i) => {
                self.cursor = i;
                self.routers[i].id
            }
            None => NodeId::NONE,
        }
    }

    /// Looks up a router entry
    #[must_use]
    pub fn get(&self, router_id: NodeId) -> Option<&RouterNode> {
        self.position(router_id).ok().map(|pos| &self.routers[pos])
    }

    /// Router ids in table order
    #[must_use]
    pub fn router_ids(&self) -> Vec<NodeId> {
        self.routers.iter().map(|r| r.id).collect()
    }

    /// Number of known routers
    #[must_use]
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    /// Whether no router is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}
