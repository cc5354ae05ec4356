//! Shared fixtures for router integration tests

#![allow(dead_code)]

use switchyard_connection_memory::{MemoryConnections, SentFrame};
use switchyard_router::{
    NodeId, ROUTER_HEAD_SIZE, RouterConfig, RouterHeader, RpcType, ServiceId, SocketRouter,
};

pub const ROUTER: ServiceId = 1;
pub const GATE: ServiceId = 2;
pub const LOBBY: ServiceId = 3;
pub const GAME: ServiceId = 4;

/// Our own router node
pub fn me() -> NodeId {
    NodeId::build(0, ROUTER, 1)
}

pub fn node(service_id: ServiceId, index: u16) -> NodeId {
    NodeId::build(0, service_id, index)
}

/// A router named like production, with its own id set
pub fn test_router() -> (SocketRouter<MemoryConnections>, MemoryConnections) {
    let sink = MemoryConnections::new();
    let mut router = SocketRouter::new(&RouterConfig::default(), sink.clone());
    router.set_router_id(me());
    router.set_service_name(ROUTER, "router");
    router.set_service_name(GATE, "gate");
    router.set_service_name(LOBBY, "lobby");
    router.set_service_name(GAME, "game");
    (router, sink)
}

pub fn header(kind: RpcType, target_sid: u32, target_pid: u32) -> RouterHeader {
    RouterHeader {
        len: 0,
        msg_id: kind.into(),
        source_id: node(GATE, 1).raw(),
        target_sid,
        target_pid,
    }
}

/// Splits a recorded frame back into header and body
pub fn split(frame: &SentFrame) -> (RouterHeader, Vec<u8>) {
    let header = RouterHeader::decode(&frame.data).expect("frame carries a header");
    (header, frame.data[ROUTER_HEAD_SIZE..].to_vec())
}
