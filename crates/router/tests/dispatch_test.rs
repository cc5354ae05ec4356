mod common;

use assert_matches::assert_matches;
use switchyard_router::{
    FORWARD_ROUTER, FlowInfo, HeaderError, ROUTER_HEAD_SIZE, RouteError, RouterHeader, RpcType,
    encode_player_ids,
};

use common::{GATE, LOBBY, ROUTER, header, node, split, test_router};

#[test]
fn test_dispatch_routes_by_kind() {
    let (mut router, sink) = test_router();
    router.map_token(node(LOBBY, 1), 11, 0);
    router.map_token(node(LOBBY, 2), 12, 0);
    router.set_player_service(9, node(LOBBY, 2), true);

    let mut head = header(RpcType::ForwardMaster, u32::from(LOBBY), 0);
    assert_eq!(router.dispatch(&mut head, b"a", 0).unwrap(), 1);

    let mut head = header(RpcType::ForwardPlayer, u32::from(LOBBY), 9);
    assert_eq!(router.dispatch(&mut head, b"b", 0).unwrap(), 1);

    let mut head = header(RpcType::ForwardBroadcast, u32::from(LOBBY), 0);
    assert_eq!(router.dispatch(&mut head, b"c", 11).unwrap(), 1);

    let mut body = encode_player_ids(&[9]).unwrap().to_vec();
    body.extend_from_slice(b"d");
    let mut head = header(RpcType::ForwardGroupPlayer, u32::from(LOBBY), 0);
    assert_eq!(router.dispatch(&mut head, &body, 0).unwrap(), 1);

    let tokens: Vec<u32> = sink.frames().iter().map(|frame| frame.token).collect();
    assert_eq!(tokens, vec![11, 12, 12, 12]);
    assert!(
        sink.frames()
            .iter()
            .all(|frame| split(frame).0.msg_id == u8::from(RpcType::RemoteCall))
    );
}

#[test]
fn test_relayed_kinds_are_not_relayed_again() {
    let (mut router, sink) = test_router();
    let relay = node(ROUTER, 2);
    let target = node(LOBBY, 4);
    router.map_token(relay, 30, 0);
    router.map_router_node(relay, target, 1);

    let mut head = RouterHeader {
        msg_id: RpcType::ForwardTarget.relayed(),
        target_sid: target.raw(),
        ..RouterHeader::default()
    };
    assert_matches!(
        router.dispatch(&mut head, b"x", 30),
        Err(RouteError::TargetNotFound { .. })
    );

    let mut head = RouterHeader {
        msg_id: RpcType::ForwardMaster.relayed(),
        target_sid: u32::from(LOBBY),
        ..RouterHeader::default()
    };
    assert_matches!(
        router.dispatch(&mut head, b"x", 30),
        Err(RouteError::MasterNotFound { .. })
    );
    assert!(sink.is_empty());

    // a relayed message reaching its target is delivered normally
    router.map_token(target, 44, 0);
    let mut head = RouterHeader {
        msg_id: RpcType::ForwardTarget.relayed(),
        target_sid: target.raw(),
        ..RouterHeader::default()
    };
    assert_eq!(router.dispatch(&mut head, b"x", 30).unwrap(), 1);
    assert_eq!(split(&sink.take_frames()[0]).0.msg_id, 0);
}

#[test]
fn test_dispatch_rejects_unroutable_ids() {
    let (mut router, _sink) = test_router();

    for msg_id in [
        0,
        7,
        FORWARD_ROUTER,
        RpcType::ForwardBroadcast.relayed(),
        RpcType::ForwardGroupPlayer.relayed(),
        FORWARD_ROUTER + 7,
        200,
    ] {
        let mut head = RouterHeader {
            msg_id,
            ..RouterHeader::default()
        };
        assert_eq!(
            router.dispatch(&mut head, b"", 0).unwrap_err(),
            RouteError::UnsupportedMessage { msg_id }
        );
    }
}

#[test]
fn test_dispatch_frame() {
    let (mut router, sink) = test_router();
    router.map_token(node(LOBBY, 1), 11, 0);

    let head = header(RpcType::ForwardTarget, node(LOBBY, 1).raw(), 0);
    let mut frame = head.encode().to_vec();
    frame.extend_from_slice(b"payload");

    assert_eq!(router.dispatch_frame(&frame, 0).unwrap(), 1);

    let frames = sink.take_frames();
    let (sent, body) = split(&frames[0]);
    assert_eq!(sent.source_id, head.source_id);
    assert_eq!(body, b"payload");

    assert_eq!(
        router.dispatch_frame(&frame[..10], 0).unwrap_err(),
        RouteError::Malformed(HeaderError::Truncated {
            what: "router header",
            needed: 17,
            available: 10,
        })
    );
}

#[test]
fn test_small_flow_reports_nothing_and_resets() {
    let (mut router, _sink) = test_router();
    router.map_token(node(LOBBY, 1), 11, 0);

    // 100 and 150 byte frames, header included
    for body_len in [100, 150] {
        let mut head = header(RpcType::ForwardMaster, u32::from(LOBBY), 0);
        let body = vec![0u8; body_len - ROUTER_HEAD_SIZE];
        router.forward_master(&mut head, &body).unwrap();
    }
    assert_eq!(router.service(LOBBY).unwrap().flow(), (250, 0));

    assert!(router.clac_flow_info(1).is_empty());
    assert_eq!(router.service(LOBBY).unwrap().flow(), (0, 0));
}

#[test]
fn test_inbound_flow_counts_against_source() {
    let (mut router, _sink) = test_router();
    let source = RouterHeader {
        source_id: node(GATE, 1).raw(),
        target_sid: u32::from(LOBBY),
        ..RouterHeader::default()
    };

    router.inc_flow_in(&source, 3 * 1024);

    assert_eq!(router.service(GATE).unwrap().flow(), (0, 3 * 1024));
    assert_eq!(router.service(LOBBY).unwrap().flow(), (0, 0));
    assert_eq!(
        router.clac_flow_info(3),
        vec![FlowInfo {
            service_id: GATE,
            flow_in: 1,
            flow_out: 0,
        }]
    );
}
