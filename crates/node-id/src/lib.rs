//! Composite node identifiers for the switchyard cluster.
//!
//! A node identifier packs three fields into 32 bits:
//!
//! ```text
//!  31        24 23        16 15                     0
//! +------------+------------+------------------------+
//! |   group    |  service   |         index          |
//! +------------+------------+------------------------+
//! ```
//!
//! Ordering by the raw value therefore sorts by group, then service kind,
//! then index.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Small integer naming a category of service instances.
pub type ServiceId = u8;

/// Number of distinct service kinds the codec can address.
pub const MAX_SERVICE_KINDS: usize = 1 << 8;

const GROUP_SHIFT: u32 = 24;
const SERVICE_SHIFT: u32 = 16;
const INDEX_MASK: u32 = 0xFFFF;

/// Identifier of one running service instance.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The "no node" identifier.
    pub const NONE: Self = Self(0);

    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Composes an identifier from its parts.
    #[must_use]
    pub const fn build(group: u8, service_id: ServiceId, index: u16) -> Self {
        Self(
            ((group as u32) << GROUP_SHIFT)
                | ((service_id as u32) << SERVICE_SHIFT)
                | index as u32,
        )
    }

    /// Raw 32-bit value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Service kind encoded in this identifier.
    #[must_use]
    pub const fn service_id(self) -> ServiceId {
        (self.0 >> SERVICE_SHIFT) as u8
    }

    /// Group encoded in this identifier.
    #[must_use]
    pub const fn group(self) -> u8 {
        (self.0 >> GROUP_SHIFT) as u8
    }

    /// Instance index encoded in this identifier.
    #[must_use]
    pub const fn index(self) -> u16 {
        (self.0 & INDEX_MASK) as u16
    }

    /// Whether this is the "no node" identifier.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.group(), self.service_id(), self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_and_split() {
        let id = NodeId::build(2, 3, 17);

        assert_eq!(id.group(), 2);
        assert_eq!(id.service_id(), 3);
        assert_eq!(id.index(), 17);
        assert_eq!(id.raw(), 0x0203_0011);
        assert_eq!(id.to_string(), "2.3.17");
    }

    #[test]
    fn test_none() {
        assert!(NodeId::NONE.is_none());
        assert!(NodeId::default().is_none());
        assert!(!NodeId::build(0, 0, 1).is_none());
    }

    #[test]
    fn test_raw_ordering_follows_index_within_service() {
        let a = NodeId::build(1, 5, 1);
        let b = NodeId::build(1, 5, 2);
        let c = NodeId::build(1, 6, 0);

        assert!(a < b);
        assert!(b < c);
    }

    proptest! {
        #[test]
        fn round_trip_is_exact(group: u8, service: u8, index: u16) {
            let id = NodeId::build(group, service, index);
            prop_assert_eq!(id.group(), group);
            prop_assert_eq!(id.service_id(), service);
            prop_assert_eq!(id.index(), index);
            prop_assert_eq!(NodeId::build(id.group(), id.service_id(), id.index()), id);
        }

        #[test]
        fn raw_conversion_is_lossless(raw: u32) {
            let id = NodeId::from(raw);
            prop_assert_eq!(u32::from(id), raw);
        }
    }
}
