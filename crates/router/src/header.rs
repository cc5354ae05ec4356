//! Fixed routing header and the wire helpers around it
//!
//! Every routed payload is preceded by a 17 byte little-endian header:
//!
//! ```text
//! len:u32 | msg_id:u8 | source_id:u32 | target_sid:u32 | target_pid:u32
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::HeaderError;

/// Encoded size of [`RouterHeader`]
pub const ROUTER_HEAD_SIZE: usize = 17;

/// Offset added to a forwarding kind when the message travels via a router
pub const FORWARD_ROUTER: u8 = 16;

/// Header preceding every routed payload
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RouterHeader {
    /// Total frame length including the header
    pub len: u32,
    /// Message kind, rewritten before each send
    pub msg_id: u8,
    /// Sender node id
    pub source_id: u32,
    /// Target service kind, or target node id for direct forwarding
    pub target_sid: u32,
    /// Target player id, or hash selector
    pub target_pid: u32,
}

impl RouterHeader {
    /// Encodes the header into its fixed wire form
    #[must_use]
    pub fn encode(&self) -> [u8; ROUTER_HEAD_SIZE] {
        let mut out = [0u8; ROUTER_HEAD_SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.len);
        buf.put_u8(self.msg_id);
        buf.put_u32_le(self.source_id);
        buf.put_u32_le(self.target_sid);
        buf.put_u32_le(self.target_pid);
        out
    }

    /// Decodes a header from the front of `src`
    pub fn decode(mut src: &[u8]) -> Result<Self, HeaderError> {
        if src.remaining() < ROUTER_HEAD_SIZE {
            return Err(HeaderError::Truncated {
                what: "router header",
                needed: ROUTER_HEAD_SIZE,
                available: src.remaining(),
            });
        }

        Ok(Self {
            len: src.get_u32_le(),
            msg_id: src.get_u8(),
            source_id: src.get_u32_le(),
            target_sid: src.get_u32_le(),
            target_pid: src.get_u32_le(),
        })
    }
}

/// Message kinds relevant to routing
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RpcType {
    /// Terminal delivery to the owning node
    RemoteCall = 0,
    /// Forward to a specific node id
    ForwardTarget = 1,
    /// Forward to the master of a service kind
    ForwardMaster = 2,
    /// Forward to a hash bucket of a service kind
    ForwardHash = 3,
    /// Forward to every node of a service kind
    ForwardBroadcast = 4,
    /// Forward to the node owning a player
    ForwardPlayer = 5,
    /// Forward to the nodes owning a list of players
    ForwardGroupPlayer = 6,
}

/// Whether a message is on its first hop or was handed over by a router
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hop {
    /// First hop, relay fallback allowed
    Origin,
    /// Already relayed once, relay fallback forbidden
    Relayed,
}

impl RpcType {
    /// Maps a raw message kind, without the relay offset
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::RemoteCall),
            1 => Some(Self::ForwardTarget),
            2 => Some(Self::ForwardMaster),
            3 => Some(Self::ForwardHash),
            4 => Some(Self::ForwardBroadcast),
            5 => Some(Self::ForwardPlayer),
            6 => Some(Self::ForwardGroupPlayer),
            _ => None,
        }
    }

    /// Splits a header `msg_id` into the kind and the hop it arrived on
    #[must_use]
    pub const fn from_msg_id(msg_id: u8) -> Option<(Self, Hop)> {
        if msg_id >= FORWARD_ROUTER {
            match Self::from_u8(msg_id - FORWARD_ROUTER) {
                Some(kind) => Some((kind, Hop::Relayed)),
                None => None,
            }
        } else {
            match Self::from_u8(msg_id) {
                Some(kind) => Some((kind, Hop::Origin)),
                None => None,
            }
        }
    }

    /// The message id this kind carries on a relay hop
    #[must_use]
    pub const fn relayed(self) -> u8 {
        self as u8 + FORWARD_ROUTER
    }
}

impl From<RpcType> for u8 {
    fn from(kind: RpcType) -> Self {
        kind as Self
    }
}

/// Serializes a player id list: `u16` count then `u32` ids, little-endian
pub fn encode_player_ids(player_ids: &[u32]) -> Result<Bytes, HeaderError> {
    let count = u16::try_from(player_ids.len())
        .map_err(|_| HeaderError::TooManyPlayers(player_ids.len()))?;

    let mut buf = BytesMut::with_capacity(2 + player_ids.len() * 4);
    buf.put_u16_le(count);
    for id in player_ids {
        buf.put_u32_le(*id);
    }
    Ok(buf.freeze())
}

/// Decodes a player id list from the front of `data`, returning the ids and
/// the bytes that follow the list
pub fn decode_player_ids(data: &[u8]) -> Result<(Vec<u32>, &[u8]), HeaderError> {
    let mut buf = data;
    if buf.remaining() < 2 {
        return Err(HeaderError::Truncated {
            what: "player id count",
            needed: 2,
            available: buf.remaining(),
        });
    }

    let count = usize::from(buf.get_u16_le());
    let needed = count * 4;
    if buf.remaining() < needed {
        return Err(HeaderError::Truncated {
            what: "player id list",
            needed,
            available: buf.remaining(),
        });
    }

    let ids = (0..count).map(|_| buf.get_u32_le()).collect();
    Ok((ids, buf))
}
