//! Forwarding strategies and relay fallback
//!
//! Each strategy resolves the header's target to a registered node and sends
//! `header + body` to it with `msg_id` rewritten to [`RpcType::RemoteCall`].
//! Strategies that can fall back to a relay come in two flavours: the plain
//! entry point relays when local resolution fails, the `_direct` one (used
//! for messages that already arrived through a router) never does.

use std::collections::BTreeSet;

use switchyard_connection::{ConnectionSink, Token};
use switchyard_node_id::{NodeId, ServiceId};
use tracing::{debug, trace};

use crate::error::{RelayFailure, RouteError, RouteResult};
use crate::header::{Hop, ROUTER_HEAD_SIZE, RouterHeader, RpcType, decode_player_ids};
use crate::router::SocketRouter;

impl<C> SocketRouter<C>
where
    C: ConnectionSink,
{
    /// Routes by the kind in `header.msg_id`, returning how many frames
    /// were sent. Relayed kinds never relay again; group player and
    /// broadcast messages have no relayed form.
    pub fn dispatch(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
        source_token: Token,
    ) -> RouteResult<usize> {
        let msg_id = header.msg_id;
        let Some((kind, hop)) = RpcType::from_msg_id(msg_id) else {
            return Err(RouteError::UnsupportedMessage { msg_id });
        };

        match kind {
            RpcType::ForwardTarget => self.forward_target_hop(header, body, hop).map(|()| 1),
            RpcType::ForwardPlayer => self.forward_player_hop(header, body, hop).map(|()| 1),
            RpcType::ForwardMaster => self.forward_master_hop(header, body, hop).map(|()| 1),
            RpcType::ForwardHash => self.forward_hash_hop(header, body, hop).map(|()| 1),
            RpcType::ForwardGroupPlayer if hop == Hop::Origin => {
                self.forward_group_player(header, body)
            }
            RpcType::ForwardBroadcast if hop == Hop::Origin => {
                self.forward_broadcast(header, source_token, body)
            }
            RpcType::ForwardGroupPlayer | RpcType::ForwardBroadcast | RpcType::RemoteCall => {
                Err(RouteError::UnsupportedMessage { msg_id })
            }
        }
    }

    /// Decodes the header at the front of `frame` and dispatches the rest
    pub fn dispatch_frame(&mut self, frame: &[u8], source_token: Token) -> RouteResult<usize> {
        let mut header = RouterHeader::decode(frame)?;
        self.dispatch(&mut header, &frame[ROUTER_HEAD_SIZE..], source_token)
    }

    /// Sends to the node whose id is `header.target_sid`
    pub fn forward_target(&mut self, header: &mut RouterHeader, body: &[u8]) -> RouteResult<()> {
        self.forward_target_hop(header, body, Hop::Origin)
    }

    /// [`forward_target`](Self::forward_target) without relay fallback
    pub fn forward_target_direct(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
    ) -> RouteResult<()> {
        self.forward_target_hop(header, body, Hop::Relayed)
    }

    /// Sends to the node owning player `target_pid` in kind `target_sid`
    pub fn forward_player(&mut self, header: &mut RouterHeader, body: &[u8]) -> RouteResult<()> {
        self.forward_player_hop(header, body, Hop::Origin)
    }

    /// [`forward_player`](Self::forward_player) without relay fallback
    pub fn forward_player_direct(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
    ) -> RouteResult<()> {
        self.forward_player_hop(header, body, Hop::Relayed)
    }

    /// Sends to the master of kind `target_sid`
    pub fn forward_master(&mut self, header: &mut RouterHeader, body: &[u8]) -> RouteResult<()> {
        self.forward_master_hop(header, body, Hop::Origin)
    }

    /// [`forward_master`](Self::forward_master) without relay fallback
    pub fn forward_master_direct(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
    ) -> RouteResult<()> {
        self.forward_master_hop(header, body, Hop::Relayed)
    }

    /// Sends to the bucket selected by the low 16 bits of `target_pid` in
    /// kind `target_sid`
    pub fn forward_hash(&mut self, header: &mut RouterHeader, body: &[u8]) -> RouteResult<()> {
        self.forward_hash_hop(header, body, Hop::Origin)
    }

    /// [`forward_hash`](Self::forward_hash) without relay fallback
    pub fn forward_hash_direct(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
    ) -> RouteResult<()> {
        self.forward_hash_hop(header, body, Hop::Relayed)
    }

    /// Sends the payload following a player id list once to every distinct
    /// node owning one of the players. Unmapped or offline players are
    /// skipped. Returns the number of nodes reached.
    pub fn forward_group_player(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
    ) -> RouteResult<usize> {
        let service_id = self.service_slot(header.target_sid)?;
        let (player_ids, payload) = decode_player_ids(body)?;

        let target_ids: BTreeSet<NodeId> = player_ids
            .iter()
            .map(|player_id| self.find_player_sid(*player_id, service_id))
            .filter(|target_id| !target_id.is_none())
            .collect();

        let tokens: Vec<Token> = target_ids
            .iter()
            .filter_map(|target_id| self.node(*target_id).map(|node| node.token))
            .collect();

        header.msg_id = RpcType::RemoteCall.into();
        header.len = frame_len(payload);
        for token in &tokens {
            self.send(service_id, *token, header, payload);
        }
        Ok(tokens.len())
    }

    /// Sends to every connected node of kind `target_sid` except the one the
    /// message came from. Returns the number of nodes reached.
    pub fn forward_broadcast(
        &mut self,
        header: &mut RouterHeader,
        source_token: Token,
        body: &[u8],
    ) -> RouteResult<usize> {
        let service_id = self.service_slot(header.target_sid)?;
        let tokens: Vec<Token> = self
            .service(service_id)
            .map(|services| {
                services
                    .nodes()
                    .map(|node| node.token)
                    .filter(|token| *token != 0 && *token != source_token)
                    .collect()
            })
            .unwrap_or_default();

        header.msg_id = RpcType::RemoteCall.into();
        for token in &tokens {
            self.send(service_id, *token, header, body);
        }
        Ok(tokens.len())
    }

    fn forward_target_hop(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
        hop: Hop,
    ) -> RouteResult<()> {
        let target_id = NodeId::from(header.target_sid);
        let service_id = target_id.service_id();
        if self.service(service_id).is_none() {
            return Err(RouteError::ServiceOutOfRange {
                service: header.target_sid,
            });
        }

        match self.node(target_id).map(|node| node.token) {
            Some(token) => {
                self.deliver(service_id, token, header, body);
                Ok(())
            }
            None => {
                let cause = RouteError::TargetNotFound {
                    target: self.service_nick(target_id),
                };
                self.fallback(hop, cause, header, body, RpcType::ForwardTarget, target_id, 0)
            }
        }
    }

    fn forward_player_hop(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
        hop: Hop,
    ) -> RouteResult<()> {
        let service_id = self.service_slot(header.target_sid)?;
        let player_id = header.target_pid;

        let target_id = self.find_player_sid(player_id, service_id);
        if target_id.is_none() {
            return Err(RouteError::PlayerNotFound {
                player: player_id,
                service: self.service_name(service_id),
            });
        }

        let token = self
            .service(service_id)
            .and_then(|services| services.get_target(target_id))
            .map(|node| node.token);
        match token {
            Some(token) => {
                self.deliver(service_id, token, header, body);
                Ok(())
            }
            None => {
                let cause = RouteError::PlayerTargetNotFound {
                    target: self.service_nick(target_id),
                };
                self.fallback(hop, cause, header, body, RpcType::ForwardPlayer, target_id, 0)
            }
        }
    }

    fn forward_master_hop(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
        hop: Hop,
    ) -> RouteResult<()> {
        let service_id = self.service_slot(header.target_sid)?;

        let token = self
            .service(service_id)
            .and_then(|services| services.master())
            .map(|master| master.token);
        match token {
            Some(token) => {
                self.deliver(service_id, token, header, body);
                Ok(())
            }
            None => {
                let cause = RouteError::MasterNotFound {
                    service: self.service_name(service_id),
                };
                self.fallback(
                    hop,
                    cause,
                    header,
                    body,
                    RpcType::ForwardMaster,
                    NodeId::NONE,
                    service_id,
                )
            }
        }
    }

    fn forward_hash_hop(
        &mut self,
        header: &mut RouterHeader,
        body: &[u8],
        hop: Hop,
    ) -> RouteResult<()> {
        let service_id = self.service_slot(header.target_sid)?;
        // selectors are 16 bits wide on the wire
        #[allow(clippy::cast_possible_truncation)]
        let hash = header.target_pid as u16;

        let token = self
            .service(service_id)
            .and_then(|services| services.hash_target(u32::from(hash)))
            .map(|node| node.token);
        match token {
            Some(token) => {
                self.deliver(service_id, token, header, body);
                Ok(())
            }
            None => {
                let cause = RouteError::HashNotFound {
                    service: self.service_name(service_id),
                    hash,
                };
                self.fallback(
                    hop,
                    cause,
                    header,
                    body,
                    RpcType::ForwardHash,
                    NodeId::NONE,
                    service_id,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fallback(
        &mut self,
        hop: Hop,
        cause: RouteError,
        header: &mut RouterHeader,
        body: &[u8],
        kind: RpcType,
        target_id: NodeId,
        service_id: ServiceId,
    ) -> RouteResult<()> {
        match hop {
            Hop::Origin => {
                debug!("{}, trying relay", cause);
                self.forward_router(cause, header, body, kind, target_id, service_id)
            }
            Hop::Relayed => Err(cause),
        }
    }

    /// Hands the message to a router able to reach `target_id` (or
    /// `service_id` when no target is known), tagged with the relayed kind
    fn forward_router(
        &mut self,
        cause: RouteError,
        header: &mut RouterHeader,
        body: &[u8],
        kind: RpcType,
        target_id: NodeId,
        service_id: ServiceId,
    ) -> RouteResult<()> {
        let router_id = self.routers.find_transfer_router(target_id, service_id);
        if router_id.is_none() {
            let failure = RelayFailure::NoRouter {
                target: self.service_nick(target_id),
                service: self.service_name(service_id),
            };
            return Err(relay_error(cause, failure));
        }

        let router_kind = self.router_kind.unwrap_or(router_id.service_id());
        let Some(router) = self
            .service(router_kind)
            .and_then(|services| services.get_target(router_id))
            .copied()
        else {
            let failure = RelayFailure::UnknownRouter {
                router: self.service_nick(router_id),
                target: self.service_nick(target_id),
                service: self.service_name(service_id),
            };
            return Err(relay_error(cause, failure));
        };

        if router.token == 0 {
            return Err(relay_error(cause, RelayFailure::RouterDisconnected));
        }

        header.msg_id = kind.relayed();
        self.send(router_kind, router.token, header, body);
        debug!("relayed {:?} through router {}", kind, router_id);
        Ok(())
    }

    fn service_slot(&self, target_sid: u32) -> RouteResult<ServiceId> {
        ServiceId::try_from(target_sid)
            .ok()
            .filter(|service_id| self.service(*service_id).is_some())
            .ok_or(RouteError::ServiceOutOfRange {
                service: target_sid,
            })
    }

    fn deliver(
        &mut self,
        service_id: ServiceId,
        token: Token,
        header: &mut RouterHeader,
        body: &[u8],
    ) {
        header.msg_id = RpcType::RemoteCall.into();
        self.send(service_id, token, header, body);
    }

    fn send(&mut self, service_id: ServiceId, token: Token, header: &RouterHeader, body: &[u8]) {
        let head = header.encode();
        self.sink.sendv(token, &[&head, body]);
        trace!("sent {} bytes to token {}", ROUTER_HEAD_SIZE + body.len(), token);

        if let Some(services) = self.services.get_mut(usize::from(service_id)) {
            services.flow_inc((ROUTER_HEAD_SIZE + body.len()) as u64, 0);
        }
    }
}

fn relay_error(cause: RouteError, failure: RelayFailure) -> RouteError {
    RouteError::Relay {
        cause: Box::new(cause),
        failure,
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn frame_len(payload: &[u8]) -> u32 {
    (ROUTER_HEAD_SIZE + payload.len()) as u32
}
