//! Abstract interface over the session layer that owns cluster sockets.
//!
//! The routing core never touches sockets itself. It hands fully formed
//! frames to a [`ConnectionSink`] keyed by the connection token that the
//! session layer reported for each node.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::sync::Arc;

/// Opaque handle of a live connection. `0` never names a live connection.
pub type Token = u32;

/// Sends framed data over connections identified by token.
pub trait ConnectionSink: Send + Sync + 'static {
    /// Transmits `items` back to back as one logical frame over `token`.
    ///
    /// Delivery is fire-and-forget: a closed or unknown token drops the
    /// frame silently.
    fn sendv(&self, token: Token, items: &[&[u8]]);
}

impl<T> ConnectionSink for Arc<T>
where
    T: ConnectionSink + ?Sized,
{
    fn sendv(&self, token: Token, items: &[&[u8]]) {
        (**self).sendv(token, items);
    }
}

impl<T> ConnectionSink for Box<T>
where
    T: ConnectionSink + ?Sized,
{
    fn sendv(&self, token: Token, items: &[&[u8]]) {
        (**self).sendv(token, items);
    }
}
