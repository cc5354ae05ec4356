//! Error types for routing operations

use std::fmt;

use thiserror::Error;

/// Result type for routing operations
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors from decoding the fixed routing header or its sub-formats
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum HeaderError {
    /// Buffer ended before the structure did
    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        /// What was being decoded
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// Player list longer than the count prefix can describe
    #[error("too many player ids: {0}")]
    TooManyPlayers(usize),
}

/// Reasons a relay hop could not be taken
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RelayFailure {
    /// No known router reaches the target or service kind
    #[error("not router can find:{target},{service}")]
    NoRouter {
        /// Unresolved target, rendered as a nick
        target: String,
        /// Unresolved service kind, rendered by name
        service: String,
    },

    /// The chosen router is not registered under the router service kind
    #[error("not this router:{router},{target},{service}")]
    UnknownRouter {
        /// Chosen router, rendered as a nick
        router: String,
        /// Unresolved target, rendered as a nick
        target: String,
        /// Unresolved service kind, rendered by name
        service: String,
    },

    /// The chosen router has no live connection
    #[error("all router is disconnect")]
    RouterDisconnected,
}

/// Dispatch failures. None are fatal; callers log and drop the message.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RouteError {
    /// Service kind outside the routing table
    #[error("service {service} out of range")]
    ServiceOutOfRange {
        /// Offending service kind or target field
        service: u32,
    },

    /// Direct target is not registered
    #[error("forward-target not find,target:{target}")]
    TargetNotFound {
        /// Target rendered as a nick
        target: String,
    },

    /// Player has no directory entry
    #[error("forward-player not find player:{player} service:{service}")]
    PlayerNotFound {
        /// Player id
        player: u32,
        /// Service kind rendered by name
        service: String,
    },

    /// Player maps to a node that is no longer registered
    #[error("forward-player not find,target:{target}")]
    PlayerTargetNotFound {
        /// Mapped node rendered as a nick
        target: String,
    },

    /// Service kind has no elected master
    #[error("forward-master:{service} token=0")]
    MasterNotFound {
        /// Service kind rendered by name
        service: String,
    },

    /// Hash bucket resolves to no live node
    #[error("forward-hash not nodes:{service},hash:{hash}")]
    HashNotFound {
        /// Service kind rendered by name
        service: String,
        /// Bucket selector after truncation to 16 bits
        hash: u16,
    },

    /// Payload could not be decoded
    #[error("malformed message: {0}")]
    Malformed(#[from] HeaderError),

    /// Message kind the dispatcher does not route
    #[error("unsupported message id {msg_id}")]
    UnsupportedMessage {
        /// The raw message id
        msg_id: u8,
    },

    /// Local resolution failed and so did the relay attempt
    #[error("{cause} | {failure}")]
    Relay {
        /// The local resolution failure
        cause: Box<RouteError>,
        /// Why the relay hop failed
        failure: RelayFailure,
    },
}

/// Broad classification of a [`RouteError`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteErrorKind {
    /// Target, player, master or bucket absent
    NotFound,
    /// Resolved but no live connection to use
    Unreachable,
    /// Unknown service kind index
    OutOfRange,
    /// Undecodable or unsupported input
    Malformed,
}

impl RouteError {
    /// Returns the kind of this error
    #[must_use]
    pub const fn kind(&self) -> RouteErrorKind {
        match self {
            Self::ServiceOutOfRange { .. } => RouteErrorKind::OutOfRange,
            Self::TargetNotFound { .. }
            | Self::PlayerNotFound { .. }
            | Self::PlayerTargetNotFound { .. }
            | Self::MasterNotFound { .. }
            | Self::HashNotFound { .. } => RouteErrorKind::NotFound,
            Self::Malformed(_) | Self::UnsupportedMessage { .. } => RouteErrorKind::Malformed,
            Self::Relay { failure, .. } => match failure {
                RelayFailure::NoRouter { .. } => RouteErrorKind::NotFound,
                RelayFailure::UnknownRouter { .. } | RelayFailure::RouterDisconnected => {
                    RouteErrorKind::Unreachable
                }
            },
        }
    }
}

impl fmt::Display for RouteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
