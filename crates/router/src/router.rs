//! Service registry, player directory and relay table of one router instance

use std::collections::HashMap;

use switchyard_connection::{ConnectionSink, Token};
use switchyard_node_id::{NodeId, ServiceId};
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::flow::FlowInfo;
use crate::header::RouterHeader;
use crate::player::PlayerDirectory;
use crate::relay::RouterTable;
use crate::service::{ServiceGroup, ServiceNode};

/// Routing core of one cluster router.
///
/// All state is owned here and mutated through `&mut self`; callers that
/// share a router between tasks must serialize access themselves (see
/// [`FlowReporter`](crate::FlowReporter) for the locking the crate uses).
pub struct SocketRouter<C>
where
    C: ConnectionSink,
{
    pub(crate) sink: C,
    pub(crate) services: Vec<ServiceGroup>,
    players: Vec<PlayerDirectory>,
    pub(crate) routers: RouterTable,
    service_names: HashMap<ServiceId, String>,
    /// Our own node id
    node_id: NodeId,
    /// Service kind whose nodes act as relays
    pub(crate) router_kind: Option<ServiceId>,
    last_flow_time: u64,
}

impl<C> SocketRouter<C>
where
    C: ConnectionSink,
{
    /// Create a router sized by `config` that sends through `sink`
    #[must_use]
    pub fn new(config: &RouterConfig, sink: C) -> Self {
        let capacity = config.service_capacity();
        debug!("creating socket router with {} service slots", capacity);

        Self {
            sink,
            services: (0..capacity).map(|_| ServiceGroup::default()).collect(),
            players: (0..capacity).map(|_| PlayerDirectory::default()).collect(),
            routers: RouterTable::default(),
            service_names: HashMap::new(),
            node_id: NodeId::NONE,
            router_kind: None,
            last_flow_time: 0,
        }
    }

    /// The connection sink frames are sent through
    #[must_use]
    pub const fn sink(&self) -> &C {
        &self.sink
    }

    /// Declares our own id; its service kind becomes the relay kind
    pub fn set_router_id(&mut self, node_id: NodeId) {
        self.node_id = node_id;
        self.router_kind = Some(node_id.service_id());
    }

    /// Our own node id
    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Service kind whose nodes act as relays
    #[must_use]
    pub const fn router_kind(&self) -> Option<ServiceId> {
        self.router_kind
    }

    /// Names a service kind for diagnostics
    pub fn set_service_name(&mut self, service_id: ServiceId, name: impl Into<String>) {
        self.service_names.insert(service_id, name.into());
    }

    /// Name of a service kind, or its number when unnamed
    #[must_use]
    pub fn service_name(&self, service_id: ServiceId) -> String {
        self.service_names
            .get(&service_id)
            .cloned()
            .unwrap_or_else(|| service_id.to_string())
    }

    /// `name_group_index` rendering of a node id
    #[must_use]
    pub fn service_nick(&self, node_id: NodeId) -> String {
        format!(
            "{}_{}_{}",
            self.service_name(node_id.service_id()),
            node_id.group(),
            node_id.index()
        )
    }

    /// Bookkeeping for one service kind
    #[must_use]
    pub fn service(&self, service_id: ServiceId) -> Option<&ServiceGroup> {
        self.services.get(usize::from(service_id))
    }

    fn service_mut(&mut self, service_id: ServiceId) -> Option<&mut ServiceGroup> {
        self.services.get_mut(usize::from(service_id))
    }

    /// A registered node
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&ServiceNode> {
        self.service(node_id.service_id())
            .and_then(|group| group.get_target(node_id))
    }

    /// Current master of a service kind
    #[must_use]
    pub fn master(&self, service_id: ServiceId) -> NodeId {
        self.service(service_id)
            .and_then(ServiceGroup::master)
            .map_or(NodeId::NONE, |node| node.id)
    }

    /// Current bucket table of a service kind
    #[must_use]
    pub fn hash_ids(&self, service_id: ServiceId) -> &[NodeId] {
        self.service(service_id)
            .map(ServiceGroup::hash_ids)
            .unwrap_or_default()
    }

    /// Configured bucket count of a service kind, 0 when dynamic or unknown
    #[must_use]
    pub fn hash_value(&self, service_id: ServiceId) -> u16 {
        self.service(service_id).map_or(0, ServiceGroup::hash)
    }

    /// Reports liveness of a node. `token == 0` takes it offline.
    ///
    /// A larger `hash` switches the service kind to fixed bucket mode; it is
    /// never lowered. Returns the master after re-election.
    pub fn map_token(&mut self, node_id: NodeId, token: Token, hash: u16) -> NodeId {
        let service_id = node_id.service_id();
        let group = node_id.group();
        let Some(services) = self.service_mut(service_id) else {
            return NodeId::NONE;
        };

        if services.upgrade_hash(hash) {
            debug!("service {} switched to {} hash buckets", service_id, hash);
        }

        if token == 0 {
            if services.remove(node_id).is_some() {
                debug!("node {} went offline", node_id);
            }
        } else {
            services.insert(ServiceNode::new(node_id, token));
            debug!("node {} online with token {}", node_id, token);
        }

        self.flush_hash_node(group, service_id);

        if token == 0 && self.router_kind == Some(service_id) {
            self.map_router_node(node_id, NodeId::NONE, 0);
        }

        self.choose_master(service_id)
    }

    /// Updates a node's status. Returns the re-elected master when the
    /// status changed, [`NodeId::NONE`] otherwise.
    pub fn set_node_status(&mut self, node_id: NodeId, status: u8) -> NodeId {
        let service_id = node_id.service_id();
        let Some(node) = self
            .service_mut(service_id)
            .and_then(|services| services.get_target_mut(node_id))
        else {
            return NodeId::NONE;
        };

        if node.status == status {
            return NodeId::NONE;
        }
        node.status = status;
        debug!("node {} status changed to {}", node_id, status);

        self.flush_hash_node(node_id.group(), service_id);
        self.choose_master(service_id)
    }

    /// Elects the first healthy node in registration order as master
    pub fn choose_master(&mut self, service_id: ServiceId) -> NodeId {
        let Some(services) = self.service_mut(service_id) else {
            return NodeId::NONE;
        };

        let previous = services.master().map_or(NodeId::NONE, |node| node.id);
        let master = services.choose_master();
        if previous != master {
            debug!("service {} master is now {}", service_id, master);
        }
        master
    }

    /// Rebuilds the bucket table of a service kind
    pub fn flush_hash_node(&mut self, group: u8, service_id: ServiceId) {
        if let Some(services) = self.service_mut(service_id) {
            services.flush_hash(group, service_id);
        }
    }

    /// Records what a router can reach.
    ///
    /// `target_id == NONE` forgets the router, `status == 0` removes the
    /// target, anything else adds it. Updates about ourselves are ignored.
    pub fn map_router_node(&mut self, router_id: NodeId, target_id: NodeId, status: u8) {
        if router_id == self.node_id {
            return;
        }
        if self.router_kind != Some(router_id.service_id()) {
            warn!("error router_id: {} is not a router", router_id);
            return;
        }

        if target_id.is_none() {
            self.routers.clear(router_id);
        } else {
            self.routers.set_target(router_id, target_id, status != 0);
        }
    }

    /// Round-robin choice of a router reaching `target_id`, or `service_id`
    /// when no target is given
    pub fn find_transfer_router(&mut self, target_id: NodeId, service_id: ServiceId) -> NodeId {
        self.routers.find_transfer_router(target_id, service_id)
    }

    /// Known router ids in table order
    #[must_use]
    pub fn router_ids(&self) -> Vec<NodeId> {
        self.routers.router_ids()
    }

    /// Login (`login == true`) or logout of a player on `node_id`
    pub fn set_player_service(&mut self, player_id: u32, node_id: NodeId, login: bool) {
        let Some(players) = self.players.get_mut(usize::from(node_id.service_id())) else {
            return;
        };

        if login {
            players.set_player_service(player_id, node_id);
        } else {
            players.set_player_service(player_id, NodeId::NONE);
        }
    }

    /// Node owning a player for a service kind, [`NodeId::NONE`] when unknown
    #[must_use]
    pub fn find_player_sid(&self, player_id: u32, service_id: ServiceId) -> NodeId {
        self.players
            .get(usize::from(service_id))
            .map_or(NodeId::NONE, |players| players.find_player_sid(player_id))
    }

    /// Forgets every player owned by a node that disconnected
    pub fn clean_player_sid(&mut self, node_id: NodeId) {
        if let Some(players) = self.players.get_mut(usize::from(node_id.service_id())) {
            let removed = players.clean_sid(node_id);
            if removed > 0 {
                debug!("cleaned {} players from node {}", removed, node_id);
            }
        }
    }

    /// Counts inbound bytes against the sender's service kind
    pub fn inc_flow_in(&mut self, header: &RouterHeader, bytes: u64) {
        let service_id = NodeId::from(header.source_id).service_id();
        if let Some(services) = self.service_mut(service_id) {
            services.flow_inc(0, bytes);
        }
    }

    /// Turns the counters accumulated since the previous call into KB/s.
    ///
    /// Only kinds with a nonzero rate are reported. Counters reset after every
    /// sample, except when no whole second has elapsed: then nothing is
    /// reported and the counters keep accumulating.
    pub fn clac_flow_info(&mut self, now_s: u64) -> Vec<FlowInfo> {
        let elapsed = now_s.saturating_sub(self.last_flow_time);
        if elapsed == 0 {
            self.last_flow_time = now_s;
            return Vec::new();
        }
        self.last_flow_time = now_s;

        let mut flows = Vec::new();
        for (service_id, services) in (0..=ServiceId::MAX).zip(self.services.iter_mut()) {
            let (flow_out, flow_in) = services.flow();
            if flow_in > 0 || flow_out > 0 {
                let flow_in = flow_in / elapsed / 1024;
                let flow_out = flow_out / elapsed / 1024;
                if flow_in > 0 || flow_out > 0 {
                    flows.push(FlowInfo {
                        service_id,
                        flow_in,
                        flow_out,
                    });
                }
            }
            services.flow_clear();
        }
        flows
    }
}

impl<C> std::fmt::Debug for SocketRouter<C>
where
    C: ConnectionSink,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketRouter")
            .field("node_id", &self.node_id)
            .field("router_kind", &self.router_kind)
            .field("routers", &self.routers.len())
            .finish_non_exhaustive()
    }
}
